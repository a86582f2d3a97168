//! # Configuración del Dispatcher
//! src/config.rs
//!
//! Configuración por argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./job-dispatcher --port 8080 \
//!   --capacity 100 \
//!   --workers 4 \
//!   --admission-policy block-with-deadline \
//!   --submission-deadline-ms 250
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! QUEUE_CAPACITY=10 WORKER_COUNT=2 DRAIN_TIMEOUT_MS=0 ./job-dispatcher
//! ```

use crate::dispatch::{AdmissionPolicy, DispatcherConfig};
use crate::error::ConfigError;
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "job-dispatcher")]
#[command(about = "Dispatcher de jobs acotado con backpressure y drenado ordenado")]
#[command(version)]
pub struct Config {
    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Puerto en el que escucha (0 = efímero)
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    // === Cola y workers ===

    /// Capacidad máxima de la cola (C)
    #[arg(long, default_value = "100", env = "QUEUE_CAPACITY")]
    pub capacity: usize,

    /// Número de workers (n)
    #[arg(long, default_value = "4", env = "WORKER_COUNT")]
    pub workers: usize,

    // === Admisión ===

    /// Política cuando la cola está llena
    #[arg(long = "admission-policy", value_enum, default_value = "reject-on-full", env = "ADMISSION_POLICY")]
    pub admission_policy: AdmissionPolicy,

    /// Plazo de sumisión (D) en milisegundos para block-with-deadline
    #[arg(long = "submission-deadline-ms", default_value = "100", env = "SUBMISSION_DEADLINE_MS")]
    pub submission_deadline_ms: u64,

    /// Valor del header Retry-After en respuestas 429
    #[arg(long = "retry-after-secs", default_value = "5", env = "RETRY_AFTER_SECS")]
    pub retry_after_secs: u64,

    // === Apagado ===

    /// Techo del drenado en milisegundos (0 = sin techo)
    #[arg(long = "drain-timeout-ms", default_value = "30000", env = "DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: u64,

    // === Jobs ===

    /// Timeout de conexión y lectura de los jobs fetch
    #[arg(long = "fetch-timeout-ms", default_value = "10000", env = "FETCH_TIMEOUT_MS")]
    pub fetch_timeout_ms: u64,

    /// Máximo aceptado para jobs sleep
    #[arg(long = "max-sleep-ms", default_value = "60000", env = "MAX_SLEEP_MS")]
    pub max_sleep_ms: u64,

    // === HTTP ===

    /// Timeout de lectura de cada conexión
    #[arg(long = "read-timeout-ms", default_value = "10000", env = "HTTP_READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,

    /// Nivel de log por defecto; RUST_LOG tiene precedencia
    #[arg(long = "log-level", default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    pub fn new() -> Self {
        Config::parse()
    }

    /// Dirección para bind (host:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración antes de lanzar cualquier thread
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::MustBePositive("queue capacity"));
        }
        if self.workers == 0 {
            return Err(ConfigError::MustBePositive("worker count"));
        }
        if self.admission_policy == AdmissionPolicy::BlockWithDeadline && self.submission_deadline_ms == 0 {
            return Err(ConfigError::ZeroSubmissionDeadline);
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::MustBePositive("fetch timeout"));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::MustBePositive("read timeout"));
        }
        Ok(())
    }

    pub fn submission_deadline(&self) -> Duration {
        Duration::from_millis(self.submission_deadline_ms)
    }

    /// `None` cuando el drenado no tiene techo
    pub fn drain_timeout(&self) -> Option<Duration> {
        match self.drain_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            policy: self.admission_policy,
            submission_deadline: self.submission_deadline(),
        }
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        tracing::info!(
            address = %self.address(),
            capacity = self.capacity,
            workers = self.workers,
            policy = self.admission_policy.as_str(),
            submission_deadline_ms = self.submission_deadline_ms,
            drain_timeout_ms = self.drain_timeout_ms,
            "configuration loaded"
        );
        tracing::debug!(
            fetch_timeout_ms = self.fetch_timeout_ms,
            max_sleep_ms = self.max_sleep_ms,
            retry_after_secs = self.retry_after_secs,
            read_timeout_ms = self.read_timeout_ms,
            "job and http limits"
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            capacity: 100,
            workers: 4,
            admission_policy: AdmissionPolicy::RejectOnFull,
            submission_deadline_ms: 100,
            retry_after_secs: 5,
            drain_timeout_ms: 30_000,
            fetch_timeout_ms: 10_000,
            max_sleep_ms: 60_000,
            read_timeout_ms: 10_000,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.capacity, 100);
        assert_eq!(config.workers, 4);
        assert_eq!(config.admission_policy, AdmissionPolicy::RejectOnFull);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_matches_default() {
        let parsed = Config::try_parse_from(["job-dispatcher"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.capacity, default.capacity);
        assert_eq!(parsed.drain_timeout_ms, default.drain_timeout_ms);
        assert_eq!(parsed.admission_policy, default.admission_policy);
    }

    #[test]
    fn test_parse_cli_flags() {
        let config = Config::try_parse_from([
            "job-dispatcher",
            "--capacity",
            "2",
            "--workers",
            "1",
            "--admission-policy",
            "block-with-deadline",
            "--submission-deadline-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(config.capacity, 2);
        assert_eq!(config.workers, 1);
        assert_eq!(config.admission_policy, AdmissionPolicy::BlockWithDeadline);
        assert_eq!(config.dispatcher_config().submission_deadline, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = Config::default();
        config.capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::MustBePositive("queue capacity")));
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = Config::default();
        config.workers = 0;
        assert_eq!(config.validate(), Err(ConfigError::MustBePositive("worker count")));
    }

    #[test]
    fn test_validate_zero_deadline_only_matters_when_blocking() {
        let mut config = Config::default();
        config.submission_deadline_ms = 0;
        assert!(config.validate().is_ok());

        config.admission_policy = AdmissionPolicy::BlockWithDeadline;
        assert_eq!(config.validate(), Err(ConfigError::ZeroSubmissionDeadline));
    }

    #[test]
    fn test_drain_timeout_zero_means_unbounded() {
        let mut config = Config::default();
        assert_eq!(config.drain_timeout(), Some(Duration::from_secs(30)));
        config.drain_timeout_ms = 0;
        assert_eq!(config.drain_timeout(), None);
    }
}
