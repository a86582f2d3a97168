//! # Dispatcher
//! src/dispatch/dispatcher.rs
//!
//! Puerta de entrada con control de admisión. Para cada sumisión decide si
//! encolar, bloquear brevemente o rechazar, según la política configurada.
//! El apagado siempre tiene precedencia sobre la admisión.

use crate::dispatch::admission::{AdmissionControl, AdmissionPolicy, AdmissionState};
use crate::error::AdmissionError;
use crate::jobs::{Job, JobQueue, PushError};
use crate::metrics::MetricsCollector;
use std::sync::Arc;
use std::time::Duration;

/// Resultado de `submit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionResult {
    Accepted,
    RejectedBusy,
    RejectedShuttingDown,
}

impl AdmissionResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AdmissionResult::Accepted)
    }

    pub fn into_result(self) -> Result<(), AdmissionError> {
        match self {
            AdmissionResult::Accepted => Ok(()),
            AdmissionResult::RejectedBusy => Err(AdmissionError::Busy),
            AdmissionResult::RejectedShuttingDown => Err(AdmissionError::ShuttingDown),
        }
    }
}

/// Configuración del Dispatcher
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub policy: AdmissionPolicy,
    /// Plazo máximo de espera bajo `block-with-deadline`
    pub submission_deadline: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            policy: AdmissionPolicy::RejectOnFull,
            submission_deadline: Duration::from_millis(100),
        }
    }
}

/// Front door del sistema: admisión y encolado
pub struct Dispatcher {
    config: DispatcherConfig,
    queue: JobQueue,
    admission: AdmissionControl,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Dispatcher {
    pub fn new(queue: JobQueue, config: DispatcherConfig) -> Self {
        Self {
            config,
            queue,
            admission: AdmissionControl::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Intenta admitir un job
    ///
    /// Bajo `reject-on-full` nunca bloquea; bajo `block-with-deadline`
    /// bloquea como máximo `submission_deadline`.
    pub fn submit(&self, job: Job) -> AdmissionResult {
        let job_id = job.id();

        let result = match self.admission.enter() {
            None => AdmissionResult::RejectedShuttingDown,
            Some(_permit) => {
                let pushed = match self.config.policy {
                    AdmissionPolicy::RejectOnFull => self.queue.try_push(job),
                    AdmissionPolicy::BlockWithDeadline => {
                        self.queue.push_timeout(job, self.config.submission_deadline)
                    }
                };

                match pushed {
                    Ok(()) => AdmissionResult::Accepted,
                    Err(PushError::Full(_)) | Err(PushError::TimedOut(_)) => {
                        AdmissionResult::RejectedBusy
                    }
                    Err(PushError::Closed(_)) => AdmissionResult::RejectedShuttingDown,
                }
            }
        };

        match result {
            AdmissionResult::Accepted => tracing::debug!(job_id = %job_id, "job accepted"),
            AdmissionResult::RejectedBusy => {
                tracing::debug!(job_id = %job_id, policy = self.config.policy.as_str(), "rejected: busy")
            }
            AdmissionResult::RejectedShuttingDown => {
                tracing::debug!(job_id = %job_id, "rejected: shutting down")
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_admission(result);
        }

        result
    }

    pub fn state(&self) -> AdmissionState {
        self.admission.state()
    }

    pub fn admission(&self) -> &AdmissionControl {
        &self.admission
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }
}
