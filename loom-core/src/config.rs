//! Configuration (SPEC_FULL.md §B): a `LoomConfig` loaded from a TOML
//! file with environment-variable overrides, following the same
//! precedence and defaulting pattern as the starting codebase's
//! `HarnessConfig` (a flat `Default`-derived struct with `PathBuf`/`u32`
//! fields loaded once at startup).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_iterations() -> u32 {
    40
}

fn default_max_hops() -> u32 {
    5
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_context_window_tokens() -> u64 {
    128_000
}

fn default_max_concurrent_agents() -> usize {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoomConfig {
    pub working_directory: PathBuf,
    pub state_dir: PathBuf,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_max_hops")]
    pub max_dispatch_hops: u32,

    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_context_window_tokens")]
    pub context_window_tokens: u64,

    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,

    #[serde(default)]
    pub persistent: bool,
}

impl Default for LoomConfig {
    fn default() -> Self {
        Self {
            working_directory: PathBuf::from("."),
            state_dir: PathBuf::from(".loom"),
            max_iterations: default_max_iterations(),
            max_dispatch_hops: default_max_hops(),
            heartbeat_interval_secs: default_heartbeat_secs(),
            context_window_tokens: default_context_window_tokens(),
            max_concurrent_agents: default_max_concurrent_agents(),
            persistent: false,
        }
    }
}

impl LoomConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Loads from `path` if present, else starts from defaults, then
    /// applies `LOOM_*` environment overrides (env wins, matching the
    /// starting codebase's harness CLI-flag-over-file precedence).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p)?;
                toml::from_str(&text)?
            }
            _ => LoomConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("LOOM_WORKING_DIRECTORY") {
            self.working_directory = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("LOOM_STATE_DIR") {
            self.state_dir = PathBuf::from(dir);
        }
        if let Ok(v) = std::env::var("LOOM_MAX_ITERATIONS") {
            if let Ok(n) = v.parse() {
                self.max_iterations = n;
            }
        }
        if let Ok(v) = std::env::var("LOOM_MAX_DISPATCH_HOPS") {
            if let Ok(n) = v.parse() {
                self.max_dispatch_hops = n;
            }
        }
        if let Ok(v) = std::env::var("LOOM_PERSISTENT") {
            self.persistent = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }
}
