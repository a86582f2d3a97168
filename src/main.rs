//! # Job Dispatcher - Entry Point
//! src/main.rs
//!
//! Orden de arranque:
//! 1. Configuración y logging
//! 2. Bloqueo de SIGINT/SIGTERM antes de lanzar threads
//! 3. Servidor, workers y listener de señales
//! 4. `run` hasta que el drenado termine

use job_dispatcher::config::Config;
use job_dispatcher::error::Result;
use job_dispatcher::logging::{self, LogLevel};
use job_dispatcher::server::Server;
use job_dispatcher::shutdown::{self, ShutdownOutcome};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let config = Config::new();
    let log_level = logging::init(&config.log_level);

    match run(config, log_level) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config, log_level: Arc<LogLevel>) -> Result<()> {
    config.validate()?;
    config.log_summary();

    let signals = shutdown::block_termination_signals()?;

    let server = Server::new(config)?.with_log_level(log_level);
    shutdown::spawn_signal_listener(signals, server.coordinator())?;

    match server.run()? {
        ShutdownOutcome::Drained { elapsed } => {
            tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "shutdown complete");
        }
        ShutdownOutcome::AlreadyStopped => tracing::info!("shutdown complete"),
    }

    Ok(())
}
