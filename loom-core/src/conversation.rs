//! Conversation Store (§4.6): per-bead multi-turn memory with sliding-
//! window truncation and 24h expiry.
//!
//! Grounded on the starting codebase's `memory/store.rs` — an append-only
//! `Vec` with monotonic sequence numbers and a `compact_up_to` operation —
//! generalized from arbitrary `MemoryEntryKind`s to the fixed
//! system/user/assistant chat-role model this component needs.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bead::BeadId;

const DEFAULT_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub token_count: u32,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        let token_count = estimate_tokens(&content);
        Self {
            role,
            content,
            timestamp: Utc::now(),
            token_count,
        }
    }
}

/// `sum(len(content)/4)` across messages (§4.6).
pub fn estimate_tokens(content: &str) -> u32 {
    (content.len() as u32) / 4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: Uuid,
    pub bead_id: BeadId,
    pub project_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ConversationSession {
    /// Seeded with exactly one system message (§4.6 invariant: the first
    /// message is a system prompt derived from the agent's persona).
    pub fn new(bead_id: BeadId, project_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            bead_id,
            project_id: project_id.into(),
            messages: vec![Message::new(Role::System, system_prompt)],
            created_at: now,
            updated_at: now,
            expires_at: now + ChronoDuration::hours(DEFAULT_EXPIRY_HOURS),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
        self.updated_at = Utc::now();
    }

    pub fn total_tokens(&self) -> u64 {
        self.messages.iter().map(|m| m.token_count as u64).sum()
    }

    /// Sliding-window truncation (§4.6). Always keeps the initial system
    /// message; from the newest end, retains as many recent messages as
    /// fit under `token_limit`; inserts a synthetic notice in place of the
    /// dropped region. No-op if already under budget.
    pub fn truncate_to_budget(&mut self, model_token_limit: u64) {
        let budget = (model_token_limit as f64 * 0.8) as u64;
        if self.total_tokens() <= budget {
            return;
        }

        let system = self.messages[0].clone();
        let rest = &self.messages[1..];

        let mut kept: Vec<Message> = Vec::new();
        let mut running = system.token_count as u64;
        for msg in rest.iter().rev() {
            if running + msg.token_count as u64 > budget {
                break;
            }
            running += msg.token_count as u64;
            kept.push(msg.clone());
        }
        kept.reverse();

        let dropped = rest.len() - kept.len();
        let mut new_messages = vec![system];
        if dropped > 0 {
            new_messages.push(Message::new(
                Role::System,
                format!("{dropped} older messages truncated"),
            ));
        }
        new_messages.extend(kept);
        self.messages = new_messages;
        self.updated_at = Utc::now();
    }

    /// One-shot aggressive truncation on a context-length error (§4.2
    /// step 4a): drop oldest non-system messages to half the normal
    /// budget.
    pub fn aggressive_truncate(&mut self, model_token_limit: u64) {
        self.truncate_to_budget(model_token_limit / 2);
    }
}

/// Create-or-refresh semantics for session lookup (§4.6 lifecycle):
/// loading an expired session is equivalent to creating a new one.
pub fn load_or_recreate(
    existing: Option<ConversationSession>,
    bead_id: BeadId,
    project_id: &str,
    system_prompt: &str,
) -> ConversationSession {
    match existing {
        Some(session) if !session.is_expired() => session,
        _ => ConversationSession::new(bead_id, project_id, system_prompt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_seeds_with_system_message_first() {
        let session = ConversationSession::new(BeadId::new(), "proj", "you are an agent");
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::System);
    }

    #[test]
    fn append_is_ordered_and_updates_timestamp() {
        let mut session = ConversationSession::new(BeadId::new(), "proj", "sys");
        session.append(Role::User, "hello");
        session.append(Role::Assistant, "hi");
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[1].role, Role::User);
        assert_eq!(session.messages[2].role, Role::Assistant);
    }

    #[test]
    fn truncate_keeps_system_message_and_fits_budget() {
        let mut session = ConversationSession::new(BeadId::new(), "proj", "sys");
        for i in 0..200 {
            session.append(Role::User, format!("message number {i} with some padding text"));
        }
        session.truncate_to_budget(400);
        assert_eq!(session.messages[0].role, Role::System);
        assert!(session.total_tokens() <= (400.0 * 0.8) as u64 + 50);
    }

    #[test]
    fn truncate_inserts_notice_when_messages_dropped() {
        let mut session = ConversationSession::new(BeadId::new(), "proj", "sys");
        for i in 0..50 {
            session.append(Role::User, format!("padding padding padding {i}"));
        }
        session.truncate_to_budget(200);
        assert!(session.messages[1].content.contains("truncated"));
    }

    #[test]
    fn truncate_is_noop_under_budget() {
        let mut session = ConversationSession::new(BeadId::new(), "proj", "sys");
        session.append(Role::User, "short");
        let before = session.messages.len();
        session.truncate_to_budget(1_000_000);
        assert_eq!(session.messages.len(), before);
    }

    #[test]
    fn expired_session_is_replaced_by_load_or_recreate() {
        let mut session = ConversationSession::new(BeadId::new(), "proj", "sys");
        session.expires_at = Utc::now() - ChronoDuration::hours(1);
        let bead_id = session.bead_id;
        let fresh = load_or_recreate(Some(session.clone()), bead_id, "proj", "sys");
        assert_ne!(fresh.session_id, session.session_id);
    }

    #[test]
    fn non_expired_session_is_reused() {
        let session = ConversationSession::new(BeadId::new(), "proj", "sys");
        let bead_id = session.bead_id;
        let id = session.session_id;
        let reused = load_or_recreate(Some(session), bead_id, "proj", "sys");
        assert_eq!(reused.session_id, id);
    }
}
