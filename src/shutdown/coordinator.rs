//! # Coordinador de Apagado
//! src/shutdown/coordinator.rs
//!
//! Máquina de estados `Running → Draining → Stopped` sobre el estado de
//! admisión del Dispatcher. El drenado sigue siempre este orden:
//!
//! 1. Esperar a que terminen las sumisiones en vuelo
//! 2. Cerrar la cola
//! 3. Esperar a los workers (con techo opcional)
//! 4. Marcar `Stopped`

use crate::dispatch::{AdmissionState, Dispatcher};
use crate::error::ShutdownError;
use crate::workers::{DrainStatus, WorkerPool};
use serde::Serialize;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Fase del proceso
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPhase {
    Running,
    Draining,
    Stopped,
}

impl From<AdmissionState> for ShutdownPhase {
    fn from(state: AdmissionState) -> Self {
        match state {
            AdmissionState::Open => ShutdownPhase::Running,
            AdmissionState::Draining => ShutdownPhase::Draining,
            AdmissionState::Closed => ShutdownPhase::Stopped,
        }
    }
}

impl ShutdownPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownPhase::Running => "running",
            ShutdownPhase::Draining => "draining",
            ShutdownPhase::Stopped => "stopped",
        }
    }
}

/// Resultado de un drenado exitoso
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Todos los jobs aceptados terminaron
    Drained { elapsed: Duration },
    /// Otro llamador ya había completado el drenado
    AlreadyStopped,
}

pub struct ShutdownCoordinator {
    dispatcher: Arc<Dispatcher>,
    pool: WorkerPool,
    drain_timeout: Option<Duration>,
    wake: Mutex<()>,
    triggered: Condvar,
    drain_lock: Mutex<()>,
}

impl ShutdownCoordinator {
    /// `drain_timeout = None` espera indefinidamente a los workers
    pub fn new(dispatcher: Arc<Dispatcher>, pool: WorkerPool, drain_timeout: Option<Duration>) -> Self {
        Self {
            dispatcher,
            pool,
            drain_timeout,
            wake: Mutex::new(()),
            triggered: Condvar::new(),
            drain_lock: Mutex::new(()),
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.dispatcher.state().into()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Inicia el apagado; solo la primera llamada retorna `true`
    ///
    /// Desde este punto toda sumisión nueva es `RejectedShuttingDown`.
    pub fn trigger(&self) -> bool {
        let first = self
            .dispatcher
            .admission()
            .transition(AdmissionState::Open, AdmissionState::Draining);

        if first {
            tracing::info!(
                queued = self.dispatcher.queue().len(),
                in_flight = self.dispatcher.admission().in_flight(),
                "shutdown triggered, admission closed"
            );
            let _wake = self.wake.lock().unwrap_or_else(PoisonError::into_inner);
            self.triggered.notify_all();
        }

        first
    }

    /// Bloquea hasta que la fase deje de ser `Running`
    pub fn wait_for_trigger(&self) {
        let wake = self.wake.lock().unwrap_or_else(PoisonError::into_inner);
        let _wake = self
            .triggered
            .wait_while(wake, |_| self.phase() == ShutdownPhase::Running)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Drena jobs encolados y en ejecución
    ///
    /// Si todavía no se disparó el apagado, lo dispara. Llamadas concurrentes
    /// se serializan; las posteriores al primer drenado retornan
    /// `AlreadyStopped`.
    pub fn drain(&self) -> Result<ShutdownOutcome, ShutdownError> {
        let _serial = self.drain_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.phase() == ShutdownPhase::Stopped {
            return Ok(ShutdownOutcome::AlreadyStopped);
        }
        self.trigger();

        let start = Instant::now();
        let admission = self.dispatcher.admission();
        let queue = self.dispatcher.queue();

        admission.wait_settled();

        let pending = queue.len();
        let closed_now = queue.close();
        debug_assert!(closed_now, "queue closed before drain");
        tracing::info!(pending, workers = self.pool.size(), "queue closed, draining");

        let status = match self.drain_timeout {
            Some(timeout) => self.pool.wait_timeout(timeout),
            None => {
                self.pool.wait();
                DrainStatus::Drained
            }
        };

        admission.transition(AdmissionState::Draining, AdmissionState::Closed);
        let elapsed = start.elapsed();

        match status {
            DrainStatus::Drained => {
                tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "drain complete");
                Ok(ShutdownOutcome::Drained { elapsed })
            }
            DrainStatus::TimedOut { outstanding } => {
                let timeout = self.drain_timeout.unwrap_or(elapsed);
                tracing::error!(
                    outstanding,
                    timeout_ms = timeout.as_millis() as u64,
                    "drain ceiling exceeded, abandoning running jobs"
                );
                Err(ShutdownError::DrainTimeout { timeout, outstanding })
            }
        }
    }

    /// Detención explícita: `trigger()` seguido de `drain()`
    pub fn shutdown(&self) -> Result<ShutdownOutcome, ShutdownError> {
        self.trigger();
        self.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{AdmissionResult, DispatcherConfig};
    use crate::error::JobError;
    use crate::jobs::{Job, JobEffect, JobPayload, JobQueue};
    use crate::metrics::CollectingSink;
    use std::thread;

    fn coordinator(
        effect: Arc<dyn JobEffect>,
        drain_timeout: Option<Duration>,
    ) -> (Arc<ShutdownCoordinator>, Arc<CollectingSink>) {
        let queue = JobQueue::new(8);
        let sink = Arc::new(CollectingSink::new());
        let dispatcher = Arc::new(Dispatcher::new(queue.clone(), DispatcherConfig::default()));
        let pool = WorkerPool::start(2, queue, effect, sink.clone()).unwrap();
        (
            Arc::new(ShutdownCoordinator::new(dispatcher, pool, drain_timeout)),
            sink,
        )
    }

    fn quick() -> Arc<dyn JobEffect> {
        Arc::new(|_: &JobPayload| -> Result<String, JobError> {
            thread::sleep(Duration::from_millis(10));
            Ok("done".to_string())
        })
    }

    #[test]
    fn test_phase_follows_admission_state() {
        let (c, _) = coordinator(quick(), None);
        assert_eq!(c.phase(), ShutdownPhase::Running);
        assert!(c.trigger());
        assert_eq!(c.phase(), ShutdownPhase::Draining);
        c.drain().unwrap();
        assert_eq!(c.phase(), ShutdownPhase::Stopped);
    }

    #[test]
    fn test_drain_finishes_accepted_jobs() {
        let (c, sink) = coordinator(quick(), Some(Duration::from_secs(5)));
        for _ in 0..6 {
            assert_eq!(
                c.dispatcher().submit(Job::new(JobPayload::Sleep { ms: 0 })),
                AdmissionResult::Accepted
            );
        }

        let outcome = c.shutdown().unwrap();
        assert!(matches!(outcome, ShutdownOutcome::Drained { .. }));
        assert_eq!(sink.len(), 6);
        assert_eq!(c.pool().live(), 0);
    }

    #[test]
    fn test_second_trigger_and_drain_are_noops() {
        let (c, _) = coordinator(quick(), None);
        assert!(c.trigger());
        assert!(!c.trigger());
        assert!(matches!(c.drain().unwrap(), ShutdownOutcome::Drained { .. }));
        assert_eq!(c.drain().unwrap(), ShutdownOutcome::AlreadyStopped);
        assert!(!c.trigger());
    }

    #[test]
    fn test_wait_for_trigger_wakes() {
        let (c, _) = coordinator(quick(), None);
        let waiter = {
            let c = Arc::clone(&c);
            thread::spawn(move || c.wait_for_trigger())
        };

        thread::sleep(Duration::from_millis(30));
        c.trigger();
        waiter.join().unwrap();
        c.drain().unwrap();
    }

    #[test]
    fn test_drain_ceiling_forces_stopped() {
        let hung: Arc<dyn JobEffect> = Arc::new(|_: &JobPayload| -> Result<String, JobError> {
            thread::sleep(Duration::from_millis(500));
            Ok("late".to_string())
        });
        let (c, _) = coordinator(hung, Some(Duration::from_millis(50)));
        c.dispatcher().submit(Job::new(JobPayload::Sleep { ms: 0 }));
        thread::sleep(Duration::from_millis(30));

        let err = c.shutdown().unwrap_err();
        assert_eq!(
            err,
            ShutdownError::DrainTimeout {
                timeout: Duration::from_millis(50),
                outstanding: 1
            }
        );
        assert_eq!(c.phase(), ShutdownPhase::Stopped);
        assert_eq!(c.drain().unwrap(), ShutdownOutcome::AlreadyStopped);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(ShutdownPhase::from(AdmissionState::Draining).as_str(), "draining");
        assert_eq!(serde_json::to_string(&ShutdownPhase::Stopped).unwrap(), "\"stopped\"");
    }
}
