//! # Sistema de Jobs
//!
//! Modelo de datos de los trabajos y la cola acotada donde esperan su turno.
//!
//! - [`job`]: `Job`, `JobPayload`, `CompletionRecord`
//! - [`queue`]: cola FIFO de capacidad fija
//! - [`effect`]: trait del efecto ejecutado por los workers

pub mod effect;
pub mod job;
pub mod queue;

pub use effect::{BuiltinEffect, JobEffect};
pub use job::{CompletionRecord, Job, JobId, JobPayload, Outcome};
pub use queue::{JobQueue, Popped, PushError, QueueStats};
