//! Column family layout (§6), grounded on `state/schema.rs`'s
//! CF-name-constants-plus-key-builders pattern.

pub const CF_BEADS: &str = "beads";
pub const CF_AGENTS: &str = "agents";
pub const CF_PROVIDERS: &str = "providers";
pub const CF_CONVERSATIONS: &str = "conversation_contexts";
pub const CF_WORKFLOW_DEFINITIONS: &str = "workflow_definitions";
pub const CF_WORKFLOW_EXECUTIONS: &str = "workflow_executions";
pub const CF_WORKFLOW_HISTORY: &str = "workflow_history";

pub const ALL_CFS: &[&str] = &[
    CF_BEADS,
    CF_AGENTS,
    CF_PROVIDERS,
    CF_CONVERSATIONS,
    CF_WORKFLOW_DEFINITIONS,
    CF_WORKFLOW_EXECUTIONS,
    CF_WORKFLOW_HISTORY,
];

pub mod keys {
    pub fn bead(id: &str) -> String {
        format!("bead:{id}")
    }

    pub fn agent(id: &str) -> String {
        format!("agent:{id}")
    }

    pub fn provider(id: &str) -> String {
        format!("provider:{id}")
    }

    pub fn conversation(session_id: &str) -> String {
        format!("conv:{session_id}")
    }

    pub fn workflow_definition(id: &str) -> String {
        format!("wfdef:{id}")
    }

    pub fn workflow_execution(id: &str) -> String {
        format!("wfexec:{id}")
    }
}
