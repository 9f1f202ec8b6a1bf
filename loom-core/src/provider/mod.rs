//! Provider Registry (§4.3): backend pool management, scoring, heartbeat,
//! retry-on-404/context-length, and the outbound wire protocol.

pub mod registry;
pub mod scoring;
pub mod wire;

pub use registry::{ProviderEntry, ProviderHealth, ProviderRegistry};
pub use scoring::ScoreWeights;
pub use wire::{ChatMessage, ChatRequest, ChatResponse, ProviderTransport};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Openai,
    Anthropic,
    Local,
    Vllm,
    Ollama,
    Mock,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Pending,
    Healthy,
    Active,
    Disabled,
    Error,
}

impl ProviderStatus {
    /// Only providers with status healthy|active participate in selection.
    pub fn participates(self) -> bool {
        matches!(self, ProviderStatus::Healthy | ProviderStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub provider_type: ProviderType,
    pub endpoint: String,
    pub model: String,
    /// Opaque reference into the credential vault (out of core scope, §1).
    pub credential_ref: Option<String>,
    pub model_param_count_b: f64,
    pub cost_per_1k_tokens: f64,
}
