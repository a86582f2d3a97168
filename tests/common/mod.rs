//! Utilidades compartidas por los tests de integración

#![allow(dead_code)]

use job_dispatcher::dispatch::{AdmissionPolicy, Dispatcher, DispatcherConfig};
use job_dispatcher::error::JobError;
use job_dispatcher::jobs::{JobEffect, JobPayload, JobQueue};
use job_dispatcher::metrics::CollectingSink;
use job_dispatcher::shutdown::ShutdownCoordinator;
use job_dispatcher::workers::WorkerPool;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Compuerta que retiene a los jobs hasta que el test la abre
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
    started: Mutex<usize>,
    started_cv: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }

    /// Espera hasta que `n` jobs hayan entrado al efecto
    pub fn wait_started(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut started = self.started.lock().unwrap();
        while *started < n {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            started = self.started_cv.wait_timeout(started, remaining).unwrap().0;
        }
        true
    }

    fn pass(&self) {
        *self.started.lock().unwrap() += 1;
        self.started_cv.notify_all();

        let open = self.open.lock().unwrap();
        let _open = self.opened.wait_while(open, |o| !*o).unwrap();
    }
}

/// Efecto que se bloquea en la compuerta
pub fn gated(gate: &Arc<Gate>) -> Arc<dyn JobEffect> {
    let gate = Arc::clone(gate);
    Arc::new(move |_: &JobPayload| -> Result<String, JobError> {
        gate.pass();
        Ok("released".to_string())
    })
}

/// Efecto inmediato
pub fn instant() -> Arc<dyn JobEffect> {
    Arc::new(|_: &JobPayload| -> Result<String, JobError> { Ok("done".to_string()) })
}

pub fn sleep_job() -> job_dispatcher::jobs::Job {
    job_dispatcher::jobs::Job::new(JobPayload::Sleep { ms: 1 })
}

/// Dispatcher sin workers todavía
pub struct Harness {
    pub queue: JobQueue,
    pub dispatcher: Arc<Dispatcher>,
    pub sink: Arc<CollectingSink>,
}

impl Harness {
    pub fn new(capacity: usize, policy: AdmissionPolicy, deadline: Duration) -> Self {
        let queue = JobQueue::new(capacity);
        let dispatcher = Arc::new(Dispatcher::new(
            queue.clone(),
            DispatcherConfig {
                policy,
                submission_deadline: deadline,
            },
        ));
        Self {
            queue,
            dispatcher,
            sink: Arc::new(CollectingSink::new()),
        }
    }

    pub fn reject_on_full(capacity: usize) -> Self {
        Self::new(capacity, AdmissionPolicy::RejectOnFull, Duration::from_millis(100))
    }

    /// Arranca los workers y construye el coordinador
    pub fn start(
        &self,
        workers: usize,
        effect: Arc<dyn JobEffect>,
        drain_timeout: Option<Duration>,
    ) -> Arc<ShutdownCoordinator> {
        let pool = WorkerPool::start(workers, self.queue.clone(), effect, self.sink.clone()).unwrap();
        Arc::new(ShutdownCoordinator::new(
            Arc::clone(&self.dispatcher),
            pool,
            drain_timeout,
        ))
    }
}
