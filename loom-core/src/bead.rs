//! The Bead: a unit of work tracked through dispatch, execution and
//! workflow advancement (§3).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BeadId(pub Uuid);

impl BeadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BeadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BeadType {
    Task,
    Bug,
    Feature,
    Epic,
    Decision,
    PrReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
    P4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeadStatus {
    Open,
    InProgress,
    Blocked,
    Closed,
}

/// Side-band per-bead state. Pragmatic but invites lost-update bugs
/// (§9) — callers mutating `context` should go through a per-bead lock
/// or optimistic-concurrency check rather than read-modify-write freely.
pub type BeadContext = HashMap<String, Value>;

/// Typed accessors over the common `context` keys, preferred over raw
/// string-keyed access internally (§9).
pub mod context_keys {
    pub const DISPATCH_COUNT: &str = "dispatch_count";
    pub const LAST_RUN_AT: &str = "last_run_at";
    pub const REDISPATCH_REQUESTED: &str = "redispatch_requested";
    pub const REQUIRES_HUMAN_CONFIG: &str = "requires-human-config";
    pub const ACTION_HISTORY: &str = "action_history";
    pub const PROGRESS_METRICS: &str = "progress_metrics";
    pub const NEEDS_CEO_REVIEW: &str = "needs_ceo_review";
    pub const CONVERSATION_SESSION_ID: &str = "conversation_session_id";
    pub const WORKFLOW_EXECUTION_ID: &str = "workflow_execution_id";
    pub const DISPATCH_HISTORY: &str = "dispatch_history";
    pub const STUCK: &str = "stuck";
    pub const FIRST_COMMIT_SHA: &str = "first_commit_sha";
    pub const LAST_COMMIT_SHA: &str = "last_commit_sha";
    pub const COMMIT_COUNT: &str = "commit_count";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bead {
    pub id: BeadId,
    pub title: String,
    pub description: String,
    pub bead_type: BeadType,
    pub priority: Priority,
    pub status: BeadStatus,
    pub project_id: String,
    pub assigned_to: Option<String>,
    pub blocked_by: HashSet<BeadId>,
    pub blocks: HashSet<BeadId>,
    pub tags: HashSet<String>,
    pub context: BeadContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bead {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        bead_type: BeadType,
        priority: Priority,
        project_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BeadId::new(),
            title: title.into(),
            description: description.into(),
            bead_type,
            priority,
            status: BeadStatus::Open,
            project_id: project_id.into(),
            assigned_to: None,
            blocked_by: HashSet::new(),
            blocks: HashSet::new(),
            tags: HashSet::new(),
            context: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A bead is ready iff open and nothing it depends on is still open.
    pub fn is_ready(&self, blockers_closed: impl Fn(&BeadId) -> bool) -> bool {
        self.status == BeadStatus::Open && self.blocked_by.iter().all(|b| blockers_closed(b))
    }

    /// Dispatchable iff ready AND (no assigned agent, or the P0 gate
    /// and human-config gate are satisfied elsewhere by the Dispatcher's
    /// skip rules — this only encodes the data-level half of the
    /// invariant, the agent-idle check needs live agent state).
    pub fn context_flag(&self, key: &str) -> bool {
        self.context
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn context_string(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    pub fn dispatch_count(&self) -> u32 {
        self.context
            .get(context_keys::DISPATCH_COUNT)
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }

    pub fn set_context(&mut self, key: &str, value: impl Into<Value>) {
        self.context.insert(key.to_string(), value.into());
        self.updated_at = Utc::now();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bead_is_open_and_ready_with_no_blockers() {
        let b = Bead::new("title", "desc", BeadType::Bug, Priority::P1, "proj");
        assert_eq!(b.status, BeadStatus::Open);
        assert!(b.is_ready(|_| false));
    }

    #[test]
    fn ready_requires_all_blockers_closed() {
        let mut b = Bead::new("t", "d", BeadType::Task, Priority::P2, "proj");
        let blocker = BeadId::new();
        b.blocked_by.insert(blocker);
        assert!(!b.is_ready(|_| false));
        assert!(b.is_ready(|_| true));
    }

    #[test]
    fn dispatch_count_defaults_to_zero() {
        let b = Bead::new("t", "d", BeadType::Task, Priority::P2, "proj");
        assert_eq!(b.dispatch_count(), 0);
    }

    #[test]
    fn set_context_round_trips_through_flag_accessors() {
        let mut b = Bead::new("t", "d", BeadType::Task, Priority::P2, "proj");
        b.set_context(context_keys::REQUIRES_HUMAN_CONFIG, true);
        assert!(b.context_flag(context_keys::REQUIRES_HUMAN_CONFIG));
        b.set_context(context_keys::CONVERSATION_SESSION_ID, "abc");
        assert_eq!(
            b.context_string(context_keys::CONVERSATION_SESSION_ID),
            Some("abc")
        );
    }

    #[test]
    fn priority_ordering_is_p0_first() {
        let mut ps = vec![Priority::P3, Priority::P0, Priority::P2];
        ps.sort();
        assert_eq!(ps, vec![Priority::P0, Priority::P2, Priority::P3]);
    }
}
