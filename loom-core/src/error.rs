//! Structured error taxonomy.
//!
//! Each component gets its own `thiserror` enum so callers can branch on
//! kind. [`StructuredError`] is the one place errors cross a boundary that
//! needs a human- or LLM-readable diagnosis attached: action observations
//! and escalation artifacts.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A diagnosis attached to an error crossing the action-result or
/// escalation-artifact boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    pub context: HashMap<String, Value>,
}

impl StructuredError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: false,
            context: HashMap::new(),
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for StructuredError {}

/// Errors raised by the Action Router (§4.7, §7).
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("path `{0}` escapes the project workdir")]
    PathEscape(String),

    #[error("path `{0}` matches a blocked pattern")]
    BlockedPath(String),

    #[error("command `{command}` is not in the allowlist")]
    CommandNotAllowed { command: String },

    #[error("command timed out after {seconds}s")]
    SubprocessTimeout { seconds: u64 },

    #[error("command failed (exit {code}): {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error("invalid action arguments: {0}")]
    ValidationError(String),

    #[error("no edit_code strategy matched")]
    MatcherMiss,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the Provider Registry (§4.3, §7).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider `{0}` not found")]
    NotFound(String),

    #[error("provider `{0}` is disabled")]
    Disabled(String),

    #[error("context length exceeded: {message}")]
    ContextLengthError { message: String },

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("authentication failed for provider `{0}`")]
    Auth(String),

    #[error("unsupported provider type `{0}`")]
    UnsupportedType(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// Errors raised by the Workflow Engine (§4.4, §7).
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("no execution found for bead `{0}`")]
    NoExecution(String),

    #[error("execution `{0}` is already terminal")]
    AlreadyTerminal(String),

    #[error("no edge from node `{from}` with condition `{condition}`")]
    NoMatchingEdge { from: String, condition: String },

    #[error("workflow `{0}` has no node `{1}`")]
    UnknownNode(String, String),

    #[error("cycle limit exceeded for execution `{0}`")]
    CycleLimitExceeded(String),

    #[error("attempt limit exceeded for node `{0}`")]
    MaxAttemptsExceeded(String),
}

/// Errors raised by the Worker's action loop (§4.2, §7).
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("router error: {0}")]
    Router(#[from] RouterError),

    #[error("loop detected")]
    LoopDetected,

    #[error("deadline exceeded")]
    Deadline,

    #[error("max iterations reached")]
    MaxIterations,
}

/// Errors raised by the Dispatcher (§4.1, §7).
#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("bead `{0}` exceeded max hops")]
    MaxHopsExceeded(String),

    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("no idle agent available")]
    NoIdleAgent,
}

/// Errors raised by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[cfg(feature = "persistent")]
    #[error("rocksdb error: {0}")]
    RocksDb(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("lock poisoned")]
    LockPoisoned,
}
