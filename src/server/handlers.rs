//! # Handlers HTTP
//! src/server/handlers.rs
//!
//! Traducen requests a sumisiones del Dispatcher y resultados de admisión a
//! códigos HTTP:
//!
//! | Resultado              | HTTP                        |
//! |------------------------|-----------------------------|
//! | `Accepted`             | `202` con `job_id`          |
//! | `RejectedBusy`         | `429` con `Retry-After`     |
//! | `RejectedShuttingDown` | `503`                       |
//! | payload inválido       | `400`                       |
//!
//! `/loglevel` consulta (`GET`) o cambia (`POST`) el nivel de log en caliente.

use crate::dispatch::{AdmissionResult, Dispatcher};
use crate::error::LogLevelError;
use crate::http::{Request, Response, StatusCode};
use crate::jobs::effect::parse_http_url;
use crate::jobs::{Job, JobPayload};
use crate::logging::LogLevel;
use crate::metrics::MetricsCollector;
use crate::shutdown::{ShutdownCoordinator, ShutdownPhase};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Tope de iteraciones para jobs hash
pub const MAX_HASH_ROUNDS: u32 = 1_000_000;

/// Límites de validación de payloads
#[derive(Debug, Clone, Copy)]
pub struct SubmitLimits {
    pub max_sleep_ms: u64,
    pub retry_after_secs: u64,
}

impl Default for SubmitLimits {
    fn default() -> Self {
        Self {
            max_sleep_ms: 60_000,
            retry_after_secs: 5,
        }
    }
}

/// Estado compartido por todos los handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ShutdownCoordinator>,
    pub metrics: Arc<MetricsCollector>,
    pub log_level: Arc<LogLevel>,
    pub limits: SubmitLimits,
}

impl AppState {
    fn dispatcher(&self) -> &Dispatcher {
        self.coordinator.dispatcher()
    }
}

/// `POST /jobs` con body JSON
pub fn submit_json(state: &AppState, request: &Request) -> Response {
    let payload = match serde_json::from_slice::<JobPayload>(request.body()) {
        Ok(payload) => payload,
        Err(e) => return Response::error(StatusCode::BadRequest, &format!("invalid job payload: {}", e)),
    };
    submit(state, payload)
}

/// `GET /jobs/submit?...`
pub fn submit_query(state: &AppState, request: &Request) -> Response {
    match payload_from_query(request) {
        Ok(payload) => submit(state, payload),
        Err(message) => Response::error(StatusCode::BadRequest, &message),
    }
}

fn submit(state: &AppState, payload: JobPayload) -> Response {
    if let Err(message) = validate(&payload, &state.limits) {
        return Response::error(StatusCode::BadRequest, &message);
    }

    let job = Job::new(payload);
    let job_id = job.id();
    let kind = job.payload().kind();

    match state.dispatcher().submit(job) {
        AdmissionResult::Accepted => Response::json(
            StatusCode::Accepted,
            &json!({ "job_id": job_id, "kind": kind, "status": "accepted" }),
        ),
        AdmissionResult::RejectedBusy => {
            Response::error(StatusCode::TooManyRequests, "server busy, try again later")
                .with_header("Retry-After", &state.limits.retry_after_secs.to_string())
        }
        AdmissionResult::RejectedShuttingDown => {
            Response::error(StatusCode::ServiceUnavailable, "server is shutting down")
        }
    }
}

fn payload_from_query(request: &Request) -> Result<JobPayload, String> {
    let number = |key: &str| -> Result<Option<u64>, String> {
        request
            .query(key)
            .map(|v| v.parse::<u64>().map_err(|_| format!("'{}' must be a non-negative integer", key)))
            .transpose()
    };

    match request.query("kind") {
        Some("sleep") => {
            let ms = number("ms")?
                .or(number("delay_ms")?)
                .ok_or("missing parameter 'ms'")?;
            Ok(JobPayload::Sleep { ms })
        }
        Some("fetch") => {
            let url = request.query("url").ok_or("missing parameter 'url'")?;
            Ok(JobPayload::Fetch { url: url.to_string() })
        }
        Some("hash") => {
            let text = request.query("text").ok_or("missing parameter 'text'")?;
            let rounds = match number("rounds")? {
                Some(r) => u32::try_from(r).map_err(|_| "'rounds' out of range".to_string())?,
                None => 1,
            };
            Ok(JobPayload::Hash {
                text: text.to_string(),
                rounds,
            })
        }
        Some(other) => Err(format!("unknown job kind: {}", other)),
        None => {
            if let Some(url) = request.query("url") {
                Ok(JobPayload::Fetch { url: url.to_string() })
            } else if let Some(ms) = number("delay_ms")? {
                Ok(JobPayload::Sleep { ms })
            } else {
                Err("missing parameter 'kind'".to_string())
            }
        }
    }
}

fn validate(payload: &JobPayload, limits: &SubmitLimits) -> Result<(), String> {
    match payload {
        JobPayload::Sleep { ms } if *ms > limits.max_sleep_ms => {
            Err(format!("'ms' must be <= {}", limits.max_sleep_ms))
        }
        JobPayload::Fetch { url } => parse_http_url(url).map(|_| ()).map_err(|e| e.to_string()),
        JobPayload::Hash { rounds, .. } if *rounds == 0 || *rounds > MAX_HASH_ROUNDS => {
            Err(format!("'rounds' must be between 1 and {}", MAX_HASH_ROUNDS))
        }
        _ => Ok(()),
    }
}

/// `GET /metrics`
pub fn metrics(state: &AppState, _request: &Request) -> Response {
    let body = json!({
        "phase": state.coordinator.phase(),
        "queue": state.dispatcher().queue().stats(),
        "workers": {
            "size": state.coordinator.pool().size(),
            "live": state.coordinator.pool().live(),
        },
        "in_flight_submissions": state.dispatcher().admission().in_flight(),
        "metrics": state.metrics.snapshot(),
    });
    Response::json(StatusCode::Ok, &body)
}

/// `GET /health`: 200 solo mientras se admiten jobs
pub fn health(state: &AppState, _request: &Request) -> Response {
    let phase = state.coordinator.phase();
    let status = match phase {
        ShutdownPhase::Running => StatusCode::Ok,
        ShutdownPhase::Draining | ShutdownPhase::Stopped => StatusCode::ServiceUnavailable,
    };

    Response::json(
        status,
        &json!({
            "phase": phase,
            "queue": state.dispatcher().queue().stats(),
        }),
    )
}

#[derive(Deserialize)]
struct LogLevelBody {
    log_level: Option<String>,
}

/// `GET /loglevel`
pub fn get_log_level(state: &AppState, _request: &Request) -> Response {
    Response::json(StatusCode::Ok, &json!({ "log_level": state.log_level.get() }))
}

/// `POST /loglevel` con `{"log_level": "<nivel>"}`
pub fn set_log_level(state: &AppState, request: &Request) -> Response {
    let body = match serde_json::from_slice::<LogLevelBody>(request.body()) {
        Ok(body) => body,
        Err(_) => return Response::error(StatusCode::BadRequest, "invalid JSON"),
    };
    let Some(level) = body.log_level else {
        return Response::error(StatusCode::BadRequest, "missing log_level field");
    };

    match state.log_level.set(&level) {
        Ok(level) => Response::json(StatusCode::Ok, &json!({ "status": "success", "log_level": level })),
        Err(LogLevelError::Invalid(_)) => Response::error(StatusCode::BadRequest, "invalid log level"),
        Err(e) => Response::error(StatusCode::InternalServerError, &e.to_string()),
    }
}
