//! # Jobs y Registros de Completado
//! src/jobs/job.rs
//!
//! Un [`Job`] es inmutable y no implementa `Clone`: en cada instante lo posee
//! un único componente (dispatcher, cola o un worker).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Identificador opaco de un job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn default_rounds() -> u32 {
    1
}

/// Descriptor del trabajo a realizar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobPayload {
    /// Trabajo simulado de duración fija
    Sleep { ms: u64 },

    /// GET HTTP/1.0 de un recurso
    Fetch { url: String },

    /// SHA256 iterado sobre un texto
    Hash {
        text: String,
        #[serde(default = "default_rounds")]
        rounds: u32,
    },
}

impl JobPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            JobPayload::Sleep { .. } => "sleep",
            JobPayload::Fetch { .. } => "fetch",
            JobPayload::Hash { .. } => "hash",
        }
    }
}

/// Unidad de trabajo aceptada por el dispatcher
#[derive(Debug)]
pub struct Job {
    id: JobId,
    payload: JobPayload,
    submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: JobId::new(),
            payload,
            submitted_at: Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// Resultado de ejecutar un job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Registro emitido exactamente una vez por cada job ejecutado
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRecord {
    pub job_id: JobId,
    pub kind: &'static str,
    /// Índice del worker que lo ejecutó
    pub worker: usize,
    pub started_at: DateTime<Utc>,
    /// Tiempo entre la sumisión y el inicio de la ejecución
    #[serde(rename = "queued_ms", serialize_with = "as_millis")]
    pub queued_for: Duration,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    pub outcome: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ids_are_unique() {
        let a = Job::new(JobPayload::Sleep { ms: 1 });
        let b = Job::new(JobPayload::Sleep { ms: 1 });
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_payload_from_json() {
        let payload: JobPayload = serde_json::from_str(r#"{"kind": "hash", "text": "abc"}"#).unwrap();
        assert_eq!(payload, JobPayload::Hash { text: "abc".to_string(), rounds: 1 });
        assert_eq!(payload.kind(), "hash");

        let payload: JobPayload =
            serde_json::from_str(r#"{"kind": "fetch", "url": "http://example.com/"}"#).unwrap();
        assert_eq!(payload.kind(), "fetch");
    }

    #[test]
    fn test_payload_unknown_kind() {
        let result: Result<JobPayload, _> = serde_json::from_str(r#"{"kind": "launch", "ms": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_record_serializes_millis() {
        let record = CompletionRecord {
            job_id: JobId::new(),
            kind: "sleep",
            worker: 0,
            started_at: Utc::now(),
            queued_for: Duration::from_millis(3),
            duration: Duration::from_millis(250),
            outcome: Outcome::Failure("boom".to_string()),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["duration_ms"], 250);
        assert_eq!(json["queued_ms"], 3);
        assert_eq!(json["outcome"]["status"], "failure");
        assert_eq!(json["outcome"]["reason"], "boom");
    }
}
