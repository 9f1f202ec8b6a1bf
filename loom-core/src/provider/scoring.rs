//! Composite provider scoring (§4.3).
//!
//! Four components in [0,100], combined by configurable weights.
//! RoundTrip and RequestLatency share a decay curve (see [`latency_score`])
//! but are fed different samples — see `DESIGN.md`'s open-question ledger.

use serde::{Deserialize, Serialize};

/// Weighted sum of the four score components. Exposed as a typed config
/// record rather than globals (§9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub model_size: f64,
    pub round_trip: f64,
    pub request_latency: f64,
    pub cost: f64,
}

impl Default for ScoreWeights {
    /// Default weights prioritize ModelSize >> RoundTrip >> RequestLatency >> Cost.
    fn default() -> Self {
        Self {
            model_size: 0.5,
            round_trip: 0.25,
            request_latency: 0.15,
            cost: 0.10,
        }
    }
}

/// Monotonic in parameter count, saturating near 480B.
pub fn model_size_score(param_count_b: f64) -> f64 {
    let saturation = 480.0_f64;
    (100.0 * (param_count_b / saturation).min(1.0)).clamp(0.0, 100.0)
}

/// Shared decay curve for both RoundTrip and RequestLatency: 100 at 0ms,
/// linearly down to 30 at 5000ms, clamped outside that range.
pub fn latency_score(latency_ms: f64) -> f64 {
    if latency_ms <= 0.0 {
        return 100.0;
    }
    if latency_ms >= 5000.0 {
        return 30.0;
    }
    100.0 - (70.0 * latency_ms / 5000.0)
}

/// 100 at free, ~50 at mid price, <=15 at high price.
pub fn cost_score(cost_per_1k_tokens: f64) -> f64 {
    if cost_per_1k_tokens <= 0.0 {
        return 100.0;
    }
    // Mid price calibrated around $0.01/1k tokens; decays toward 15 by $0.05/1k.
    let mid = 0.01_f64;
    let score = 100.0 * (-cost_per_1k_tokens / mid).exp();
    score.max(15.0).min(100.0)
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreComponents {
    pub model_size: f64,
    pub round_trip: f64,
    pub request_latency: f64,
    pub cost: f64,
}

impl ScoreComponents {
    pub fn composite(&self, weights: &ScoreWeights) -> f64 {
        self.model_size * weights.model_size
            + self.round_trip * weights.round_trip
            + self.request_latency * weights.request_latency
            + self.cost * weights.cost
    }
}
