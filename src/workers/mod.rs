//! # Workers
//! src/workers/mod.rs
//!
//! Pool fijo de threads que ejecutan los jobs de la cola.

pub mod pool;

pub use pool::{DrainStatus, WorkerPool};
