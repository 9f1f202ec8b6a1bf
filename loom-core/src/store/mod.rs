//! Persistence (§6, SPEC_FULL.md §B): a column-family key/value store
//! behind the [`KvStore`] trait, with an always-available in-memory
//! backend and an optional RocksDB backend gated by the `persistent`
//! feature — grounded on `state/store.rs`'s `StateStore` (RocksDB +
//! bincode, one column family per entity kind) but split behind a trait
//! so tests and single-process deployments don't need RocksDB at all.

pub mod memory;
pub mod schema;

#[cfg(feature = "persistent")]
pub mod rocksdb_store;

use bincode::config::Configuration;
use serde::{de::DeserializeOwned, Serialize};

use crate::agent::{Agent, AgentId};
use crate::bead::{Bead, BeadId};
use crate::conversation::ConversationSession;
use crate::error::StoreError;
use crate::provider::ProviderConfig;
use crate::workflow::{WorkflowDefinition, WorkflowExecution};

fn bincode_config() -> Configuration {
    bincode::config::standard()
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serde::encode_to_vec(value, bincode_config())
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::serde::decode_from_slice(bytes, bincode_config())
        .map(|(value, _)| value)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Raw column-family key/value operations. Implemented by the in-memory
/// and RocksDB backends; all typed accessors below are built on top of
/// this so both backends get bincode encoding for free.
pub trait KvStore: Send + Sync {
    fn put_raw(&self, cf: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
    fn get_raw(&self, cf: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn delete_raw(&self, cf: &str, key: &str) -> Result<(), StoreError>;
    fn list_raw(&self, cf: &str) -> Result<Vec<Vec<u8>>, StoreError>;
}

/// Typed accessors over a [`KvStore`], one per entity kind in §3's data
/// model. A thin layer, deliberately not a repository-per-type trait
/// object hierarchy, since every entity is serialized the same way.
pub struct LoomStore<S: KvStore> {
    kv: S,
}

impl<S: KvStore> LoomStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn put_bead(&self, bead: &Bead) -> Result<(), StoreError> {
        self.kv
            .put_raw(schema::CF_BEADS, &schema::keys::bead(&bead.id.to_string()), encode(bead)?)
    }

    pub fn get_bead(&self, id: BeadId) -> Result<Option<Bead>, StoreError> {
        match self.kv.get_raw(schema::CF_BEADS, &schema::keys::bead(&id.to_string()))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete_bead(&self, id: BeadId) -> Result<(), StoreError> {
        self.kv.delete_raw(schema::CF_BEADS, &schema::keys::bead(&id.to_string()))
    }

    pub fn list_beads(&self) -> Result<Vec<Bead>, StoreError> {
        self.kv
            .list_raw(schema::CF_BEADS)?
            .iter()
            .map(|b| decode(b))
            .collect()
    }

    pub fn put_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        self.kv.put_raw(
            schema::CF_AGENTS,
            &schema::keys::agent(&agent.id.to_string()),
            encode(agent)?,
        )
    }

    pub fn get_agent(&self, id: AgentId) -> Result<Option<Agent>, StoreError> {
        match self.kv.get_raw(schema::CF_AGENTS, &schema::keys::agent(&id.to_string()))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        self.kv.list_raw(schema::CF_AGENTS)?.iter().map(|b| decode(b)).collect()
    }

    pub fn put_provider(&self, provider: &ProviderConfig) -> Result<(), StoreError> {
        self.kv.put_raw(
            schema::CF_PROVIDERS,
            &schema::keys::provider(&provider.id),
            encode(provider)?,
        )
    }

    pub fn list_providers(&self) -> Result<Vec<ProviderConfig>, StoreError> {
        self.kv.list_raw(schema::CF_PROVIDERS)?.iter().map(|b| decode(b)).collect()
    }

    pub fn put_conversation(&self, session: &ConversationSession) -> Result<(), StoreError> {
        self.kv.put_raw(
            schema::CF_CONVERSATIONS,
            &schema::keys::conversation(&session.session_id.to_string()),
            encode(session)?,
        )
    }

    pub fn get_conversation(&self, session_id: &str) -> Result<Option<ConversationSession>, StoreError> {
        match self
            .kv
            .get_raw(schema::CF_CONVERSATIONS, &schema::keys::conversation(session_id))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_workflow_definition(&self, def: &WorkflowDefinition) -> Result<(), StoreError> {
        self.kv.put_raw(
            schema::CF_WORKFLOW_DEFINITIONS,
            &schema::keys::workflow_definition(&def.id),
            encode(def)?,
        )
    }

    pub fn list_workflow_definitions(&self) -> Result<Vec<WorkflowDefinition>, StoreError> {
        self.kv
            .list_raw(schema::CF_WORKFLOW_DEFINITIONS)?
            .iter()
            .map(|b| decode(b))
            .collect()
    }

    pub fn put_workflow_execution(&self, exec: &WorkflowExecution) -> Result<(), StoreError> {
        self.kv.put_raw(
            schema::CF_WORKFLOW_EXECUTIONS,
            &schema::keys::workflow_execution(&exec.id.to_string()),
            encode(exec)?,
        )
    }

    pub fn list_workflow_executions(&self) -> Result<Vec<WorkflowExecution>, StoreError> {
        self.kv
            .list_raw(schema::CF_WORKFLOW_EXECUTIONS)?
            .iter()
            .map(|b| decode(b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bead::{BeadType, Priority};
    use memory::InMemoryKvStore;

    #[test]
    fn round_trips_a_bead_through_the_in_memory_store() {
        let store = LoomStore::new(InMemoryKvStore::new());
        let bead = Bead::new("t", "d", BeadType::Task, Priority::P2, "proj");
        let id = bead.id;
        store.put_bead(&bead).unwrap();
        let fetched = store.get_bead(id).unwrap().unwrap();
        assert_eq!(fetched.title, "t");
    }

    #[test]
    fn list_beads_returns_every_stored_bead() {
        let store = LoomStore::new(InMemoryKvStore::new());
        for i in 0..3 {
            store
                .put_bead(&Bead::new(format!("t{i}"), "d", BeadType::Task, Priority::P2, "proj"))
                .unwrap();
        }
        assert_eq!(store.list_beads().unwrap().len(), 3);
    }

    #[test]
    fn delete_bead_removes_it() {
        let store = LoomStore::new(InMemoryKvStore::new());
        let bead = Bead::new("t", "d", BeadType::Task, Priority::P2, "proj");
        let id = bead.id;
        store.put_bead(&bead).unwrap();
        store.delete_bead(id).unwrap();
        assert!(store.get_bead(id).unwrap().is_none());
    }
}
