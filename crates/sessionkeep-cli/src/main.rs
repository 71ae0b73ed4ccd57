//! sessionkeep - terminal front-end for the session manager.
//!
//! Restores the stored session on start, then runs one command:
//! `status`, `login`, `register`, `logout` or `get <path>`.

mod commands;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sessionkeep_core::{Config, KeyringStore, SessionController};

use commands::Command;

/// Set to `1` to also write logs to `<cache_dir>/sessionkeep/sessionkeep.log`
const ENV_LOG_FILE: &str = "SESSIONKEEP_LOG_FILE";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file_writer() {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn log_file_writer() -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if std::env::var(ENV_LOG_FILE).ok().as_deref() != Some("1") {
        return None;
    }
    let dir = Config::log_dir().ok()?;
    std::fs::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::never(dir, "sessionkeep.log");
    Some(tracing_appender::non_blocking(appender))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(usage) => {
            eprintln!("{}", usage);
            std::process::exit(2);
        }
    };

    let log_guard = init_tracing();
    info!(?command, "sessionkeep starting");

    let config = Config::load()?;
    let store = KeyringStore::new(config.keyring_service.clone());
    let controller = SessionController::start(&config, store).await?;

    let code = commands::run(&controller, command).await?;
    info!(code, "sessionkeep finished");

    // process::exit skips destructors; flush the log file first
    drop(log_guard);
    std::process::exit(code);
}
