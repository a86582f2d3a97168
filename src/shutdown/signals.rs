//! # Señales de Terminación
//! src/shutdown/signals.rs
//!
//! SIGINT y SIGTERM se bloquean en el thread principal antes de lanzar
//! cualquier otro thread; todos heredan la máscara. Un thread dedicado las
//! recibe con `sigwait` y dispara el coordinador.

use crate::shutdown::ShutdownCoordinator;
use nix::sys::signal::{SigSet, Signal};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Bloquea SIGINT y SIGTERM en el thread actual
pub fn block_termination_signals() -> nix::Result<SigSet> {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set.add(Signal::SIGTERM);
    set.thread_block()?;
    Ok(set)
}

/// Lanza el thread `signal-listener`
///
/// La primera señal dispara el apagado; las siguientes se registran y se
/// ignoran.
pub fn spawn_signal_listener(
    set: SigSet,
    coordinator: Arc<ShutdownCoordinator>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("signal-listener".to_string())
        .spawn(move || loop {
            match set.wait() {
                Ok(signal) => {
                    if coordinator.trigger() {
                        tracing::info!(signal = %signal, "termination signal received");
                    } else {
                        tracing::warn!(
                            signal = %signal,
                            phase = coordinator.phase().as_str(),
                            "shutdown already in progress, ignoring signal"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "sigwait failed, signal listener exiting");
                    break;
                }
            }
        })
}
