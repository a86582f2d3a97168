//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! Observabilidad del dispatcher:
//! - [`sink`]: destinos de los registros de completado
//! - [`collector`]: contadores de admisión, jobs y requests con percentiles

pub mod collector;
pub mod sink;

pub use collector::{MetricsCollector, MetricsSnapshot};
pub use sink::{CollectingSink, CompletionSink, FanoutSink, LogSink};
