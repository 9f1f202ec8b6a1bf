//! Process entrypoint: CLI surface (§6), config/persistence bootstrap,
//! tracing initialization, and the supervisor run loop. Exit codes
//! follow §6: 0 success, 1 fatal config/init error, 2 migration failure,
//! 130 on SIGINT.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use loom_core::store::memory::InMemoryKvStore;
use loom_core::store::rocksdb_store::RocksDbKvStore;
use loom_core::{LoomConfig, LoomStore};

use loom_worker::supervisor::Supervisor;

#[derive(Parser)]
#[command(name = "loom-worker", about = "Loom dispatch/execution supervisor")]
struct Cli {
    /// Path to a TOML config file; LOOM_* env vars override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the supervisor loop (default).
    Serve,
    /// Create/open the RocksDB data directory and its column families.
    Migrate,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match LoomConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::from(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Migrate => match run_migrate(&config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "migration failed");
                ExitCode::from(2)
            }
        },
        Commands::Serve => match run_serve(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "supervisor exited with an error");
                ExitCode::from(1)
            }
        },
    }
}

fn run_migrate(config: &LoomConfig) -> anyhow::Result<()> {
    info!(state_dir = %config.state_dir.display(), "creating column families");
    RocksDbKvStore::open(&config.state_dir)?;
    info!("migration complete");
    Ok(())
}

async fn run_serve(config: LoomConfig) -> anyhow::Result<()> {
    info!(
        working_directory = %config.working_directory.display(),
        persistent = config.persistent,
        "loom-worker starting"
    );

    if config.persistent {
        let kv = RocksDbKvStore::open(&config.state_dir)?;
        let store = LoomStore::new(kv);
        Supervisor::new(config, store)?.run().await
    } else {
        let store = LoomStore::new(InMemoryKvStore::new());
        Supervisor::new(config, store)?.run().await
    }
}
