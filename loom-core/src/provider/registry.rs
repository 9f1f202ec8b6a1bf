//! `ProviderRegistry`: registration, health tracking, ranking.
//!
//! Grounded on the starting codebase's `registry/mod.rs` — `ProviderHealth`
//! with a running-average latency and `success_rate`, `ProviderEntry::
//! is_usable`, and health-then-latency ranking — generalized from a fixed
//! enum of models to arbitrary registered [`ProviderConfig`]s.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

use super::scoring::{cost_score, latency_score, model_size_score, ScoreComponents, ScoreWeights};
use super::{ProviderConfig, ProviderStatus, ProviderType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub available: bool,
    pub avg_latency_ms: f64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_checked: DateTime<Utc>,
    pub status_message: Option<String>,
}

impl ProviderHealth {
    pub fn healthy() -> Self {
        Self {
            available: true,
            avg_latency_ms: 0.0,
            success_count: 0,
            error_count: 0,
            last_checked: Utc::now(),
            status_message: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            avg_latency_ms: 0.0,
            success_count: 0,
            error_count: 0,
            last_checked: Utc::now(),
            status_message: Some(reason.into()),
        }
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            return 1.0;
        }
        self.success_count as f64 / total as f64
    }

    pub fn record_success(&mut self, latency_ms: f64) {
        self.success_count += 1;
        let total = self.success_count as f64;
        self.avg_latency_ms = ((self.avg_latency_ms * (total - 1.0)) + latency_ms) / total;
        self.last_checked = Utc::now();
        self.available = true;
        self.status_message = None;
    }

    pub fn record_failure(&mut self) {
        self.error_count += 1;
        self.last_checked = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub config: ProviderConfig,
    pub status: ProviderStatus,
    pub health: ProviderHealth,
    pub request_latency_ms: f64,
}

impl ProviderEntry {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            status: ProviderStatus::Pending,
            health: ProviderHealth::healthy(),
            request_latency_ms: 0.0,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status.participates() && self.health.success_rate() >= 0.5
    }

    pub fn score(&self, weights: &ScoreWeights) -> f64 {
        let components = ScoreComponents {
            model_size: model_size_score(self.config.model_param_count_b),
            round_trip: latency_score(self.health.avg_latency_ms),
            request_latency: latency_score(self.request_latency_ms),
            cost: cost_score(self.config.cost_per_1k_tokens),
        };
        components.composite(weights)
    }
}

#[derive(Debug, Default)]
pub struct ProviderRegistry {
    entries: HashMap<String, ProviderEntry>,
    weights: ScoreWeights,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            weights: ScoreWeights::default(),
        }
    }

    pub fn with_weights(weights: ScoreWeights) -> Self {
        Self {
            entries: HashMap::new(),
            weights,
        }
    }

    pub fn register(&mut self, config: ProviderConfig) -> Result<(), ProviderError> {
        validate_type(config.provider_type)?;
        self.entries
            .insert(config.id.clone(), ProviderEntry::new(config));
        Ok(())
    }

    pub fn upsert(&mut self, config: ProviderConfig) -> Result<(), ProviderError> {
        validate_type(config.provider_type)?;
        match self.entries.get_mut(&config.id) {
            Some(entry) => entry.config = config,
            None => {
                self.entries
                    .insert(config.id.clone(), ProviderEntry::new(config));
            }
        }
        Ok(())
    }

    pub fn unregister(&mut self, id: &str) -> Option<ProviderEntry> {
        self.entries.remove(id)
    }

    pub fn list(&self) -> Vec<&ProviderEntry> {
        self.entries.values().collect()
    }

    pub fn get(&self, id: &str) -> Option<&ProviderEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ProviderEntry> {
        self.entries.get_mut(id)
    }

    /// Reject if status not in {healthy, active}. Returns the usable entry.
    pub fn require_usable(&self, id: &str) -> Result<&ProviderEntry, ProviderError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
        if entry.status == ProviderStatus::Disabled {
            return Err(ProviderError::Disabled(id.to_string()));
        }
        if !entry.status.participates() {
            return Err(ProviderError::Transient(format!(
                "provider `{id}` status is not healthy/active"
            )));
        }
        Ok(entry)
    }

    pub fn mark_available(&mut self, id: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.status = ProviderStatus::Healthy;
        }
    }

    pub fn mark_unavailable(&mut self, id: &str, reason: impl Into<String>) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.status = ProviderStatus::Error;
            entry.health = ProviderHealth::unavailable(reason);
        }
    }

    /// Returns ids sorted by composite score descending; ties break on
    /// the next lower-weight dimension (round_trip, then request_latency).
    pub fn rank_providers(&self, ids: &[String]) -> Vec<String> {
        let mut scored: Vec<(&ProviderEntry, f64)> = ids
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|e| e.is_usable())
            .map(|e| (e, e.score(&self.weights)))
            .collect();
        scored.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    latency_score(b.health.avg_latency_ms)
                        .partial_cmp(&latency_score(a.health.avg_latency_ms))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    latency_score(b.request_latency_ms)
                        .partial_cmp(&latency_score(a.request_latency_ms))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        scored.into_iter().map(|(e, _)| e.config.id.clone()).collect()
    }

    pub fn ranked_by_health(&self) -> Vec<String> {
        let ids: Vec<String> = self.entries.keys().cloned().collect();
        self.rank_providers(&ids)
    }
}

fn validate_type(provider_type: ProviderType) -> Result<(), ProviderError> {
    // All seven declared types are supported; this hook exists for
    // forward-compatible type validation as the set grows.
    match provider_type {
        ProviderType::Openai
        | ProviderType::Anthropic
        | ProviderType::Local
        | ProviderType::Vllm
        | ProviderType::Ollama
        | ProviderType::Mock
        | ProviderType::Custom => Ok(()),
    }
}
