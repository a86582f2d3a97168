//! # Cola FIFO Acotada para Jobs
//! src/jobs/queue.rs
//!
//! Cola thread-safe de capacidad fija. Es el único punto de coordinación
//! entre productores (sumisiones) y consumidores (workers).
//!
//! - `try_push` nunca bloquea
//! - `push_timeout` bloquea como máximo el plazo indicado
//! - `pop` bloquea hasta que haya un job o la cola esté cerrada y vacía
//! - `close` es idempotente; tras cerrar, todo push falla pero los jobs
//!   ya encolados se siguen entregando

use crate::jobs::job::Job;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Motivo por el que un push falló; devuelve el job a quien lo intentó
#[derive(Debug)]
pub enum PushError {
    /// La cola estaba llena (push no bloqueante)
    Full(Job),

    /// El plazo venció sin que se liberara espacio
    TimedOut(Job),

    /// La cola ya fue cerrada
    Closed(Job),
}

impl PushError {
    pub fn into_job(self) -> Job {
        match self {
            PushError::Full(job) | PushError::TimedOut(job) | PushError::Closed(job) => job,
        }
    }
}

/// Resultado de `pop`
#[derive(Debug)]
pub enum Popped {
    Job(Job),
    /// Cerrada y vacía: el worker debe terminar su loop
    Closed,
}

struct QueueState {
    items: VecDeque<Job>,
    closed: bool,
    high_water: usize,
}

struct Shared {
    state: Mutex<QueueState>,
    /// Notifica a workers esperando jobs
    not_empty: Condvar,
    /// Notifica a productores esperando espacio
    not_full: Condvar,
}

/// Cola FIFO de capacidad fija
#[derive(Clone)]
pub struct JobQueue {
    shared: Arc<Shared>,
    capacity: usize,
}

impl JobQueue {
    /// Crea una cola con capacidad fija
    ///
    /// # Panics
    ///
    /// Si `capacity` es 0: una cola así no podría admitir nada.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be >= 1");

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity),
                    closed: false,
                    high_water: 0,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
            capacity,
        }
    }

    // Los jobs se ejecutan fuera del lock, así que un lock envenenado
    // sigue teniendo un estado consistente.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_locked(&self, state: &mut QueueState, job: Job) {
        state.items.push_back(job);
        state.high_water = state.high_water.max(state.items.len());
        debug_assert!(state.items.len() <= self.capacity);
        self.shared.not_empty.notify_one();
    }

    /// Encola sin bloquear
    pub fn try_push(&self, job: Job) -> Result<(), PushError> {
        let mut state = self.lock();

        if state.closed {
            return Err(PushError::Closed(job));
        }
        if state.items.len() >= self.capacity {
            return Err(PushError::Full(job));
        }

        self.push_locked(&mut state, job);
        Ok(())
    }

    /// Encola esperando como máximo `timeout` a que se libere un lugar
    pub fn push_timeout(&self, job: Job, timeout: Duration) -> Result<(), PushError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(PushError::Closed(job));
            }
            if state.items.len() < self.capacity {
                self.push_locked(&mut state, job);
                return Ok(());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PushError::TimedOut(job));
            }

            state = self
                .shared
                .not_full
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Desencola el job más antiguo
    ///
    /// Bloquea hasta que haya un job, o hasta que la cola esté cerrada y vacía.
    pub fn pop(&self) -> Popped {
        let mut state = self.lock();

        loop {
            if let Some(job) = state.items.pop_front() {
                self.shared.not_full.notify_one();
                return Popped::Job(job);
            }
            if state.closed {
                return Popped::Closed;
            }

            state = self
                .shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Cierra la cola a nuevas entradas
    ///
    /// Retorna `true` solo para la llamada que efectivamente la cerró.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        drop(state);

        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        true
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            len: state.items.len(),
            capacity: self.capacity,
            high_water: state.high_water,
            closed: state.closed,
        }
    }
}

/// Estadísticas de la cola
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub len: usize,
    pub capacity: usize,
    /// Máximo de jobs simultáneos observado
    pub high_water: usize,
    pub closed: bool,
}
