//! # Sinks de Completado
//! src/metrics/sink.rs
//!
//! Destinos de los registros de completado. Cada job ejecutado produce
//! exactamente un registro; las sumisiones rechazadas no producen ninguno.

use crate::jobs::{CompletionRecord, JobId, Outcome};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Colaborador de observabilidad que recibe los registros
pub trait CompletionSink: Send + Sync {
    fn record(&self, record: &CompletionRecord);
}

/// Emite cada registro como evento de `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl CompletionSink for LogSink {
    fn record(&self, record: &CompletionRecord) {
        let duration_ms = record.duration.as_millis() as u64;
        let queued_ms = record.queued_for.as_millis() as u64;

        match &record.outcome {
            Outcome::Success => tracing::info!(
                job_id = %record.job_id,
                kind = record.kind,
                worker = record.worker,
                duration_ms,
                queued_ms,
                "job completed"
            ),
            Outcome::Failure(reason) => tracing::warn!(
                job_id = %record.job_id,
                kind = record.kind,
                worker = record.worker,
                duration_ms,
                queued_ms,
                reason = %reason,
                "job failed"
            ),
        }
    }
}

/// Reenvía cada registro a varios sinks
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn CompletionSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn CompletionSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl CompletionSink for FanoutSink {
    fn record(&self, record: &CompletionRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}

/// Guarda los registros en memoria
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<CompletionRecord>>,
    arrived: Condvar,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CompletionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cuántos registros hay para un job dado
    pub fn count_for(&self, job_id: JobId) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.job_id == job_id)
            .count()
    }

    /// Espera hasta tener al menos `n` registros o hasta `timeout`
    ///
    /// Retorna `true` si se alcanzaron los `n` registros.
    pub fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);

        while records.len() < n {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            records = self
                .arrived
                .wait_timeout(records, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

impl CompletionSink for CollectingSink {
    fn record(&self, record: &CompletionRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        self.arrived.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::thread;

    fn record() -> CompletionRecord {
        CompletionRecord {
            job_id: JobId::new(),
            kind: "hash",
            worker: 1,
            started_at: Utc::now(),
            queued_for: Duration::ZERO,
            duration: Duration::from_millis(1),
            outcome: Outcome::Success,
        }
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(CollectingSink::new());
        let b = Arc::new(CollectingSink::new());
        let fanout = FanoutSink::new()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(LogSink));

        let r = record();
        fanout.record(&r);

        assert_eq!(a.count_for(r.job_id), 1);
        assert_eq!(b.count_for(r.job_id), 1);
    }

    #[test]
    fn test_wait_for_wakes_on_record() {
        let sink = Arc::new(CollectingSink::new());
        let producer = {
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                sink.record(&record());
                sink.record(&record());
            })
        };

        assert!(sink.wait_for(2, Duration::from_secs(5)));
        producer.join().unwrap();
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_wait_for_times_out() {
        let sink = CollectingSink::new();
        assert!(!sink.wait_for(1, Duration::from_millis(20)));
        assert!(sink.is_empty());
    }
}
