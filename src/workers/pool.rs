//! # Pool de Workers
//! src/workers/pool.rs
//!
//! Número fijo de threads que consumen de la cola compartida. Cada worker:
//!
//! 1. Hace `pop()`; si la cola está cerrada y vacía, termina
//! 2. Ejecuta el efecto del job (errores y panics se capturan)
//! 3. Mide la duración y emite exactamente un registro de completado
//! 4. Vuelve al paso 1

use crate::jobs::{CompletionRecord, Job, JobEffect, JobQueue, Outcome, Popped};
use crate::metrics::CompletionSink;
use chrono::Utc;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Resultado de esperar el drenado del pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStatus {
    /// Todos los workers observaron `Closed` y terminaron
    Drained,
    /// Venció el plazo con workers todavía ejecutando
    TimedOut { outstanding: usize },
}

/// Contador de workers vivos
struct Liveness {
    live: Mutex<usize>,
    exited: Condvar,
}

/// Decrementa el contador al salir el worker, incluso por panic
struct ExitGuard {
    liveness: Arc<Liveness>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let mut live = self.liveness.live.lock().unwrap_or_else(PoisonError::into_inner);
        *live -= 1;
        if *live == 0 {
            self.liveness.exited.notify_all();
        }
    }
}

/// Pool de tamaño fijo
pub struct WorkerPool {
    size: usize,
    liveness: Arc<Liveness>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Lanza `n` workers sobre la cola
    pub fn start(
        n: usize,
        queue: JobQueue,
        effect: Arc<dyn JobEffect>,
        sink: Arc<dyn CompletionSink>,
    ) -> std::io::Result<Self> {
        let liveness = Arc::new(Liveness {
            live: Mutex::new(0),
            exited: Condvar::new(),
        });
        let mut handles = Vec::with_capacity(n);

        for id in 0..n {
            let worker_queue = queue.clone();
            let effect = Arc::clone(&effect);
            let sink = Arc::clone(&sink);

            *liveness.live.lock().unwrap_or_else(PoisonError::into_inner) += 1;
            let guard = ExitGuard {
                liveness: Arc::clone(&liveness),
            };

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || {
                    let _guard = guard;
                    worker_loop(id, worker_queue, effect, sink);
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::error!(worker = id, error = %e, "failed to spawn worker, stopping pool");
                    abort_start(&queue, handles);
                    return Err(e);
                }
            }
        }

        tracing::info!(workers = n, "worker pool started");

        Ok(Self {
            size: n,
            liveness,
            handles: Mutex::new(handles),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers que todavía no terminaron
    pub fn live(&self) -> usize {
        *self.liveness.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bloquea hasta que todos los workers terminen
    pub fn wait(&self) {
        let live = self.liveness.live.lock().unwrap_or_else(PoisonError::into_inner);
        let _live = self
            .liveness
            .exited
            .wait_while(live, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
        drop(_live);

        self.join_all();
    }

    /// Como `wait`, pero con un techo de tiempo
    pub fn wait_timeout(&self, timeout: Duration) -> DrainStatus {
        let live = self.liveness.live.lock().unwrap_or_else(PoisonError::into_inner);
        let (live, _) = self
            .liveness
            .exited
            .wait_timeout_while(live, timeout, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);

        let outstanding = *live;
        drop(live);

        if outstanding > 0 {
            return DrainStatus::TimedOut { outstanding };
        }

        self.join_all();
        DrainStatus::Drained
    }

    fn join_all(&self) {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::error!(worker = %name, "worker thread panicked outside a job");
            }
        }
    }
}

/// Deshace un arranque parcial: cierra la cola y espera a los workers ya lanzados
fn abort_start(queue: &JobQueue, handles: Vec<JoinHandle<()>>) {
    queue.close();
    for handle in handles {
        let _ = handle.join();
    }
}

fn worker_loop(id: usize, queue: JobQueue, effect: Arc<dyn JobEffect>, sink: Arc<dyn CompletionSink>) {
    tracing::debug!(worker = id, "worker started");

    loop {
        let job = match queue.pop() {
            Popped::Job(job) => job,
            Popped::Closed => break,
        };

        let record = execute(id, job, effect.as_ref());
        if panic::catch_unwind(AssertUnwindSafe(|| sink.record(&record))).is_err() {
            tracing::error!(worker = id, job_id = %record.job_id, "completion sink panicked");
        }
    }

    tracing::debug!(worker = id, "worker exiting: queue closed");
}

/// Ejecuta un job y construye su registro; nunca propaga fallos
fn execute(worker: usize, job: Job, effect: &dyn JobEffect) -> CompletionRecord {
    let started_at = Utc::now();
    let queued_for = (started_at - job.submitted_at()).to_std().unwrap_or(Duration::ZERO);
    let start = Instant::now();

    let result = panic::catch_unwind(AssertUnwindSafe(|| effect.run(job.payload())));
    let duration = start.elapsed();

    let outcome = match result {
        Ok(Ok(summary)) => {
            tracing::debug!(job_id = %job.id(), worker, summary = %summary, "job effect finished");
            Outcome::Success
        }
        Ok(Err(error)) => Outcome::Failure(error.to_string()),
        Err(panic) => Outcome::Failure(format!("job panicked: {}", panic_message(panic.as_ref()))),
    };

    CompletionRecord {
        job_id: job.id(),
        kind: job.payload().kind(),
        worker,
        started_at,
        queued_for,
        duration,
        outcome,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
