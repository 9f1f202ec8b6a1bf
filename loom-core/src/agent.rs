//! Agent: an instance of an LLM persona bound to a provider (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bead::BeadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Paused,
    Idle,
    Working,
    Blocked,
    Stuck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub display_name: String,
    pub role: String,
    pub persona_ref: String,
    pub project_id: String,
    pub provider_id: Option<String>,
    pub status: AgentStatus,
    pub current_bead_id: Option<BeadId>,
    pub last_heartbeat_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(
        display_name: impl Into<String>,
        role: impl Into<String>,
        persona_ref: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            id: AgentId::new(),
            display_name: display_name.into(),
            role: role.into(),
            persona_ref: persona_ref.into(),
            project_id: project_id.into(),
            provider_id: None,
            status: AgentStatus::Paused,
            current_bead_id: None,
            last_heartbeat_at: Utc::now(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle
    }

    /// Invariant: status=working implies current_bead_id is set.
    pub fn invariant_holds(&self) -> bool {
        !(self.status == AgentStatus::Working && self.current_bead_id.is_none())
    }

    pub fn start_work(&mut self, bead_id: BeadId) {
        self.status = AgentStatus::Working;
        self.current_bead_id = Some(bead_id);
        self.last_heartbeat_at = Utc::now();
    }

    pub fn return_to_idle(&mut self) {
        self.status = AgentStatus::Idle;
        self.current_bead_id = None;
    }

    pub fn mark_stuck(&mut self) {
        self.status = AgentStatus::Stuck;
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat_at = Utc::now();
    }

    /// Heuristic used for persona-hint matching (§4.1 step 3, "If no role
    /// is required..."): does this agent's name, a partial name, or its
    /// role match the extracted hint?
    pub fn matches_hint(&self, hint: &str) -> bool {
        let hint = hint.to_lowercase();
        self.display_name.to_lowercase().contains(&hint)
            || self.role.to_lowercase() == hint
            || hint.contains(&self.display_name.to_lowercase())
    }
}
