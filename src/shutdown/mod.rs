//! # Apagado Ordenado
//! src/shutdown/mod.rs
//!
//! - [`coordinator`]: fases y drenado
//! - [`signals`]: SIGINT/SIGTERM como disparador

pub mod coordinator;
pub mod signals;

pub use coordinator::{ShutdownCoordinator, ShutdownOutcome, ShutdownPhase};
pub use signals::{block_termination_signals, spawn_signal_listener};
