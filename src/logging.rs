//! # Logging
//! src/logging.rs
//!
//! Subscriber de `tracing`. `RUST_LOG` tiene precedencia sobre el nivel
//! configurado al arrancar. El filtro va dentro de una capa `reload`, así que
//! el nivel se puede cambiar en caliente desde `/loglevel`.

use crate::error::LogLevelError;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Nivel de log vigente, modificable en tiempo de ejecución
pub struct LogLevel {
    current: Mutex<String>,
    /// `None` cuando no hay un subscriber global instalado por este módulo
    reload: Option<FilterHandle>,
}

impl LogLevel {
    /// Nivel sin subscriber asociado; `set` solo actualiza el valor reportado
    pub fn detached(level: &str) -> Self {
        Self {
            current: Mutex::new(level.to_string()),
            reload: None,
        }
    }

    pub fn get(&self) -> String {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Cambia el nivel global
    ///
    /// Acepta `trace`, `debug`, `info`, `warn`, `error` u `off`, sin
    /// distinguir mayúsculas. Retorna el nombre normalizado.
    pub fn set(&self, level: &str) -> Result<&'static str, LogLevelError> {
        let name = canonical_level(level).ok_or_else(|| LogLevelError::Invalid(level.to_string()))?;

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = &self.reload {
            handle.reload(EnvFilter::new(name))?;
        }
        *current = name.to_string();
        drop(current);

        tracing::info!(level = name, "log level changed");
        Ok(name)
    }
}

fn canonical_level(level: &str) -> Option<&'static str> {
    let level = level.trim();
    if level.is_empty() {
        return None;
    }
    let filter: LevelFilter = level.parse().ok()?;
    [
        (LevelFilter::OFF, "off"),
        (LevelFilter::ERROR, "error"),
        (LevelFilter::WARN, "warn"),
        (LevelFilter::INFO, "info"),
        (LevelFilter::DEBUG, "debug"),
        (LevelFilter::TRACE, "trace"),
    ]
    .into_iter()
    .find(|(f, _)| *f == filter)
    .map(|(_, name)| name)
}

/// Inicializa el subscriber global
///
/// Si ya había uno instalado, el nivel retornado queda desacoplado.
pub fn init(default_level: &str) -> Arc<LogLevel> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| default_level.to_string());

    let (filter, handle) = reload::Layer::new(EnvFilter::new(&directives));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_thread_names(true).with_target(false))
        .try_init();

    Arc::new(LogLevel {
        current: Mutex::new(directives),
        reload: installed.ok().map(|_| handle),
    })
}
