//! Provider bootstrap from environment variables, in the same style as
//! the starting codebase's `SwarmConfig::default()` (one `LOOM_PROVIDER_*`
//! var per `Endpoint` field, falling back to a locally-reachable default).
//! The credential itself (`api_key`) is read here and handed to the
//! Worker directly — `ProviderConfig::credential_ref` only ever carries
//! an opaque reference, never the secret (§1 Non-goals: no vault).

use loom_core::provider::ProviderType;
use loom_core::ProviderConfig;

fn provider_type_from_str(s: &str) -> ProviderType {
    match s.to_lowercase().as_str() {
        "openai" => ProviderType::Openai,
        "anthropic" => ProviderType::Anthropic,
        "local" => ProviderType::Local,
        "vllm" => ProviderType::Vllm,
        "ollama" => ProviderType::Ollama,
        "custom" => ProviderType::Custom,
        _ => ProviderType::Mock,
    }
}

/// The provider config to register plus the API key to send with
/// requests (kept out of `ProviderConfig` itself).
pub struct ProviderBootstrap {
    pub config: ProviderConfig,
    pub api_key: String,
}

/// Reads `LOOM_PROVIDER_{ID,TYPE,ENDPOINT,MODEL,API_KEY}`, defaulting to
/// a `mock` provider so `serve` runs without network access configured.
pub fn from_env() -> ProviderBootstrap {
    let provider_type = std::env::var("LOOM_PROVIDER_TYPE")
        .map(|s| provider_type_from_str(&s))
        .unwrap_or(ProviderType::Mock);
    let id = std::env::var("LOOM_PROVIDER_ID").unwrap_or_else(|_| "default".to_string());
    let endpoint = std::env::var("LOOM_PROVIDER_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:8080/v1".to_string());
    let model = std::env::var("LOOM_PROVIDER_MODEL").unwrap_or_else(|_| "mock-model".to_string());
    let api_key = std::env::var("LOOM_PROVIDER_API_KEY").unwrap_or_else(|_| "not-needed".to_string());
    let model_param_count_b = std::env::var("LOOM_PROVIDER_PARAM_COUNT_B")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(7.0);
    let cost_per_1k_tokens = std::env::var("LOOM_PROVIDER_COST_PER_1K")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);

    ProviderBootstrap {
        config: ProviderConfig {
            id,
            provider_type,
            endpoint,
            model,
            credential_ref: Some("env:LOOM_PROVIDER_API_KEY".to_string()),
            model_param_count_b,
            cost_per_1k_tokens,
        },
        api_key,
    }
}
