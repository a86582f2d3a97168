//! # Errores del Dispatcher
//! src/error.rs
//!
//! Taxonomía de errores del sistema:
//! - [`AdmissionError`]: rechazo en la puerta de entrada (no es un fallo de job)
//! - [`JobError`]: fallo del efecto de un job, aislado en su registro de completado
//! - [`ShutdownError`]: el drenado superó su techo duro
//! - [`ConfigError`]: configuración inválida al arrancar
//! - [`LogLevelError`]: nivel de log inválido en `/loglevel`
//! - [`ServerError`]: error de nivel binario que agrupa a los demás

use std::time::Duration;
use thiserror::Error;

/// Motivo por el que una sumisión no fue admitida
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    /// Capacidad agotada; el cliente puede reintentar
    #[error("server busy, try again later")]
    Busy,

    /// El proceso se está apagando; no reintentar contra esta instancia
    #[error("server is shutting down")]
    ShuttingDown,
}

/// Fallo al ejecutar el efecto de un job
#[derive(Error, Debug)]
pub enum JobError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote answered with HTTP {0}")]
    HttpStatus(u16),

    #[error("malformed HTTP response")]
    MalformedResponse,

    #[error("{0}")]
    Failed(String),
}

/// Error del coordinador de apagado
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("drain exceeded {timeout:?} with {outstanding} worker(s) still running")]
    DrainTimeout {
        timeout: Duration,
        outstanding: usize,
    },
}

/// Configuración inválida
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be >= 1")]
    MustBePositive(&'static str),

    #[error("submission deadline must be > 0 under block-with-deadline")]
    ZeroSubmissionDeadline,
}

/// Cambio de nivel de log rechazado
#[derive(Error, Debug)]
pub enum LogLevelError {
    #[error("invalid log level: {0}")]
    Invalid(String),

    #[error("failed to reload log filter: {0}")]
    Reload(#[from] tracing_subscriber::reload::Error),
}

/// Error de nivel binario
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signal setup failed: {0}")]
    Signal(#[from] nix::Error),

    #[error("shutdown error: {0}")]
    Shutdown(#[from] ShutdownError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
