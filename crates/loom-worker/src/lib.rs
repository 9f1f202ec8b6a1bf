//! loom-worker
//!
//! Thin binary-support library: the supervisor loop that wires
//! loom-core's Dispatcher, Worker, Provider Registry, Workflow Engine,
//! persistence and Loop Detector together into a running process, plus
//! the small amount of env-driven bootstrap config that doesn't belong
//! in `loom_core::LoomConfig` (provider endpoint/credentials).

pub mod provider_env;
pub mod supervisor;
