//! Personas (§9 design note): immutable records of mission, character,
//! autonomy level and allowed action vocabulary, loaded as flat data
//! rather than composed through an inheritance graph — the starting
//! codebase's `PromptContract` presets (`coder()`, `reviewer()`,
//! `manager()`, `reasoner()`) hinted at a richer behavior-contract model;
//! personas here stay data-only on purpose; see `DESIGN.md`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    /// May only propose edits; a human or higher-tier agent must apply them.
    Supervised,
    /// May act within the sandbox without per-action confirmation.
    Autonomous,
    /// May additionally push, approve/reject beads, and escalate.
    Trusted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub display_name: String,
    pub mission: String,
    pub character: String,
    pub autonomy: AutonomyLevel,
    pub action_vocabulary: Vec<String>,
    pub role_hints: Vec<String>,
}

impl Persona {
    pub fn allows_action(&self, action_type: &str) -> bool {
        self.action_vocabulary.iter().any(|a| a == action_type)
    }

    pub fn matches_hint(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.role_hints
            .iter()
            .any(|hint| lower.contains(&hint.to_lowercase()))
    }
}

#[derive(Debug, Default)]
pub struct PersonaRegistry {
    personas: HashMap<String, Persona>,
}

impl PersonaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, persona: Persona) {
        self.personas.insert(persona.id.clone(), persona);
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.get(id)
    }

    pub fn find_by_hint(&self, text: &str) -> Option<&Persona> {
        self.personas.values().find(|p| p.matches_hint(text))
    }
}

/// The baseline personas a fresh Loom deployment ships with, mirroring
/// the starting codebase's `coder`/`reviewer`/`manager`/`reasoner`
/// contract presets but expressed as data rather than code.
pub fn default_personas() -> Vec<Persona> {
    vec![
        Persona {
            id: "implementer".to_string(),
            display_name: "Implementer".to_string(),
            mission: "Resolve the assigned bead by editing code and running tests.".to_string(),
            character: "Pragmatic, makes the smallest correct change.".to_string(),
            autonomy: AutonomyLevel::Autonomous,
            action_vocabulary: vec![
                "read_tree", "read_file", "search_text", "glob", "edit_code", "write_file",
                "move_file", "delete_file", "run_command", "run_tests", "run_linter", "build",
                "git_status", "git_commit", "done",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            role_hints: vec!["implement".to_string(), "fix".to_string(), "bug".to_string()],
        },
        Persona {
            id: "reviewer".to_string(),
            display_name: "Reviewer".to_string(),
            mission: "Approve or reject a workflow node's output.".to_string(),
            character: "Skeptical, checks for regressions before approving.".to_string(),
            autonomy: AutonomyLevel::Trusted,
            action_vocabulary: vec![
                "read_tree", "read_file", "search_text", "glob", "run_command", "run_tests",
                "git_status", "approve_bead", "reject_bead", "escalate_ceo", "done",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            role_hints: vec!["review".to_string(), "approve".to_string()],
        },
        Persona {
            id: "triager".to_string(),
            display_name: "Triager".to_string(),
            mission: "Classify and file new beads for incoming work.".to_string(),
            character: "Terse, asks one clarifying question at most.".to_string(),
            autonomy: AutonomyLevel::Supervised,
            action_vocabulary: vec!["read_tree", "read_file", "search_text", "create_bead", "done"]
                .into_iter()
                .map(String::from)
                .collect(),
            role_hints: vec!["triage".to_string(), "classify".to_string()],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_personas_load_into_registry() {
        let mut registry = PersonaRegistry::new();
        for p in default_personas() {
            registry.load(p);
        }
        assert!(registry.get("implementer").is_some());
        assert!(registry.get("reviewer").is_some());
    }

    #[test]
    fn implementer_allows_edit_code_but_not_approve_bead() {
        let persona = default_personas().into_iter().find(|p| p.id == "implementer").unwrap();
        assert!(persona.allows_action("edit_code"));
        assert!(!persona.allows_action("approve_bead"));
    }

    #[test]
    fn find_by_hint_matches_case_insensitively() {
        let mut registry = PersonaRegistry::new();
        for p in default_personas() {
            registry.load(p);
        }
        let found = registry.find_by_hint("please REVIEW this change").unwrap();
        assert_eq!(found.id, "reviewer");
    }

    #[test]
    fn autonomy_level_orders_supervised_below_trusted() {
        assert!(AutonomyLevel::Supervised < AutonomyLevel::Autonomous);
        assert!(AutonomyLevel::Autonomous < AutonomyLevel::Trusted);
    }
}
