//! Loop Detector (§4.5): records agent actions, detects repeated-action
//! loops, tracks progress, and suggests next steps.
//!
//! Grounded on the starting codebase's `escalation/state.rs`
//! (`recent_error_categories` sliding window, `check_progress`,
//! `error_category_repeat_count`) and `escalation/friction.rs`
//! (`FrictionDetector::detect`) for the advisory layer.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

const LOOP_WINDOW: usize = 5;
const PROGRESS_FRESHNESS_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    FilesRead,
    FilesModified,
    TestsRun,
    CommandsExecuted,
    Other,
}

/// Classifies an action type into the progress-accounting bucket it
/// contributes to, and whether it counts as "mutating" for
/// `hasRecentProgress` (§4.5).
pub fn classify(action_type: &str) -> (ActionCategory, bool) {
    match action_type {
        "read_file" | "glob" | "grep" | "search_text" | "read_tree" => {
            (ActionCategory::FilesRead, false)
        }
        "edit_code" | "write_file" | "move_file" | "rename_file" | "delete_file" => {
            (ActionCategory::FilesModified, true)
        }
        "run_tests" | "test" => (ActionCategory::TestsRun, true),
        "run_command" | "bash" | "execute" => (ActionCategory::CommandsExecuted, true),
        _ => (ActionCategory::Other, false),
    }
}

/// `progress_key = hash(action_type, normalized(args))` (§4.5): for file
/// actions the normalized path, for commands the exact command string,
/// for search the query.
pub fn progress_key(action_type: &str, args: &serde_json::Value) -> String {
    let normalized = match action_type {
        "read_file" | "edit_code" | "write_file" | "move_file" | "rename_file" | "delete_file" => {
            args.get("path").and_then(|v| v.as_str()).unwrap_or("").to_string()
        }
        "run_command" | "bash" | "execute" => {
            args.get("command").and_then(|v| v.as_str()).unwrap_or("").to_string()
        }
        "search_text" | "grep" => args.get("query").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        "glob" => args.get("pattern").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        _ => args.to_string(),
    };
    let mut hasher = DefaultHasher::new();
    action_type.hash(&mut hasher);
    normalized.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub action_type: String,
    pub action_data: serde_json::Value,
    pub progress_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressMetrics {
    pub files_read: u64,
    pub files_modified: u64,
    pub tests_run: u64,
    pub commands_executed: u64,
    pub last_progress_at: Option<DateTime<Utc>>,
}

impl ProgressMetrics {
    pub fn has_recent_progress(&self) -> bool {
        match self.last_progress_at {
            Some(t) => Utc::now() - t < ChronoDuration::minutes(PROGRESS_FRESHNESS_MINUTES),
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoopDetector {
    pub history: Vec<ActionRecord>,
    pub metrics: ProgressMetrics,
}

impl LoopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the action, updates progress accounting, and returns
    /// `true` if a loop is declared (§4.5: same progress_key in the last
    /// K consecutive records AND no recent progress).
    pub fn record_action(
        &mut self,
        agent_id: &str,
        action_type: &str,
        action_data: serde_json::Value,
    ) -> bool {
        let key = progress_key(action_type, &action_data);
        let (category, mutating) = classify(action_type);

        self.history.push(ActionRecord {
            timestamp: Utc::now(),
            agent_id: agent_id.to_string(),
            action_type: action_type.to_string(),
            action_data,
            progress_key: key.clone(),
        });

        match category {
            ActionCategory::FilesRead => self.metrics.files_read += 1,
            ActionCategory::FilesModified => self.metrics.files_modified += 1,
            ActionCategory::TestsRun => self.metrics.tests_run += 1,
            ActionCategory::CommandsExecuted => self.metrics.commands_executed += 1,
            ActionCategory::Other => {}
        }
        if mutating {
            self.metrics.last_progress_at = Some(Utc::now());
        }

        self.is_loop(&key)
    }

    fn is_loop(&self, key: &str) -> bool {
        if self.history.len() < LOOP_WINDOW {
            return false;
        }
        let window = &self.history[self.history.len() - LOOP_WINDOW..];
        let all_same = window.iter().all(|r| r.progress_key == key);
        all_same && !self.metrics.has_recent_progress()
    }

    /// Advisory-only suggestion rules (§4.5), generalizing this
    /// codebase's `FrictionDetector` pattern of translating observed
    /// signals into hints rather than automatic action.
    pub fn suggest_next_steps(&self, symptom: &str) -> Vec<String> {
        let mut suggestions = Vec::new();
        if self.metrics.files_read > 3 && self.metrics.files_modified == 0 {
            suggestions.push("propose an edit".to_string());
        }
        if self.metrics.commands_executed == 0 && symptom.to_lowercase().contains("build") {
            suggestions.push("run the build command".to_string());
        }
        if let Some(last) = self.history.last() {
            let repeat = self
                .history
                .iter()
                .rev()
                .take_while(|r| r.progress_key == last.progress_key)
                .count();
            if repeat >= 3
                && matches!(last.action_type.as_str(), "search_text" | "grep")
            {
                suggestions.push("try a different query".to_string());
            }
        }
        suggestions
    }

    /// Defensive commit-range parsing (§4.5): missing or malformed
    /// values yield zero-values, never panic.
    pub fn agent_commit_range(
        first_sha: Option<&str>,
        last_sha: Option<&str>,
        count: Option<u64>,
    ) -> (String, String, u64) {
        (
            first_sha.unwrap_or_default().to_string(),
            last_sha.unwrap_or_default().to_string(),
            count.unwrap_or(0),
        )
    }
}
