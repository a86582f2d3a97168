//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Recolecta y agrega métricas del servidor en tiempo real:
//! - Resultados de admisión (aceptados, ocupado, apagando)
//! - Jobs completados/fallidos y percentiles de duración
//! - Requests HTTP por código de estado y latencia

use crate::dispatch::AdmissionResult;
use crate::jobs::CompletionRecord;
use crate::metrics::sink::CompletionSink;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Máximo de muestras a guardar para calcular percentiles
const MAX_SAMPLES: usize = 10_000;

/// Collector de métricas thread-safe
pub struct MetricsCollector {
    inner: Mutex<MetricsData>,
    start_time: Instant,
}

#[derive(Default)]
struct MetricsData {
    accepted: u64,
    rejected_busy: u64,
    rejected_shutting_down: u64,

    succeeded: u64,
    failed: u64,
    /// Duración de jobs (microsegundos), ventana de las últimas muestras
    job_durations: VecDeque<u64>,

    total_requests: u64,
    status_codes: BTreeMap<u16, u64>,
    /// Latencias HTTP (microsegundos)
    request_latencies: VecDeque<u64>,
}

fn push_sample(samples: &mut VecDeque<u64>, value: Duration) {
    if samples.len() >= MAX_SAMPLES {
        samples.pop_front();
    }
    samples.push_back(value.as_micros() as u64);
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsData::default()),
            start_time: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra el resultado de una sumisión
    pub fn record_admission(&self, result: AdmissionResult) {
        let mut data = self.lock();
        match result {
            AdmissionResult::Accepted => data.accepted += 1,
            AdmissionResult::RejectedBusy => data.rejected_busy += 1,
            AdmissionResult::RejectedShuttingDown => data.rejected_shutting_down += 1,
        }
    }

    /// Registra un request HTTP atendido
    pub fn record_request(&self, status_code: u16, latency: Duration) {
        let mut data = self.lock();
        data.total_requests += 1;
        *data.status_codes.entry(status_code).or_insert(0) += 1;
        push_sample(&mut data.request_latencies, latency);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.lock();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            admission: AdmissionCounts {
                accepted: data.accepted,
                rejected_busy: data.rejected_busy,
                rejected_shutting_down: data.rejected_shutting_down,
            },
            jobs: JobCounts {
                succeeded: data.succeeded,
                failed: data.failed,
                duration_us: Percentiles::from_samples(&data.job_durations),
            },
            requests: RequestCounts {
                total: data.total_requests,
                status_codes: data.status_codes.clone(),
                latency_us: Percentiles::from_samples(&data.request_latencies),
            },
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSink for MetricsCollector {
    fn record(&self, record: &CompletionRecord) {
        let mut data = self.lock();
        if record.outcome.is_success() {
            data.succeeded += 1;
        } else {
            data.failed += 1;
        }
        push_sample(&mut data.job_durations, record.duration);
    }
}

/// Snapshot serializable de las métricas
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub admission: AdmissionCounts,
    pub jobs: JobCounts,
    pub requests: RequestCounts,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AdmissionCounts {
    pub accepted: u64,
    pub rejected_busy: u64,
    pub rejected_shutting_down: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobCounts {
    pub succeeded: u64,
    pub failed: u64,
    pub duration_us: Percentiles,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestCounts {
    pub total: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub latency_us: Percentiles,
}

/// Percentiles de una ventana de muestras
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Percentiles {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub avg: u64,
    pub samples: usize,
}

impl Percentiles {
    fn from_samples(samples: &VecDeque<u64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();

        let len = sorted.len();
        let sum: u64 = sorted.iter().sum();

        Self {
            p50: sorted[len * 50 / 100],
            p95: sorted[len * 95 / 100],
            p99: sorted[len * 99 / 100],
            avg: sum / len as u64,
            samples: len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobId, Outcome};
    use chrono::Utc;

    fn record(outcome: Outcome, ms: u64) -> CompletionRecord {
        CompletionRecord {
            job_id: JobId::new(),
            kind: "sleep",
            worker: 0,
            started_at: Utc::now(),
            queued_for: Duration::ZERO,
            duration: Duration::from_millis(ms),
            outcome,
        }
    }

    #[test]
    fn test_admission_counters() {
        let collector = MetricsCollector::new();
        collector.record_admission(AdmissionResult::Accepted);
        collector.record_admission(AdmissionResult::Accepted);
        collector.record_admission(AdmissionResult::RejectedBusy);
        collector.record_admission(AdmissionResult::RejectedShuttingDown);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.admission.accepted, 2);
        assert_eq!(snapshot.admission.rejected_busy, 1);
        assert_eq!(snapshot.admission.rejected_shutting_down, 1);
    }

    #[test]
    fn test_completion_counters() {
        let collector = MetricsCollector::new();
        collector.record(&record(Outcome::Success, 10));
        collector.record(&record(Outcome::Failure("boom".to_string()), 20));

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.jobs.succeeded, 1);
        assert_eq!(snapshot.jobs.failed, 1);
        assert_eq!(snapshot.jobs.duration_us.samples, 2);
    }

    #[test]
    fn test_percentiles() {
        let collector = MetricsCollector::new();
        for i in 1..=100 {
            collector.record_request(200, Duration::from_micros(i));
        }

        let latency = collector.snapshot().requests.latency_us;
        assert!(latency.p50 > 0);
        assert!(latency.p95 > latency.p50);
        assert!(latency.p99 > latency.p95);
    }

    #[test]
    fn test_status_codes() {
        let collector = MetricsCollector::new();
        collector.record_request(202, Duration::from_millis(1));
        collector.record_request(202, Duration::from_millis(1));
        collector.record_request(429, Duration::from_millis(1));

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.requests.total, 3);
        assert_eq!(snapshot.requests.status_codes.get(&202), Some(&2));
        assert_eq!(snapshot.requests.status_codes.get(&429), Some(&1));
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let collector = MetricsCollector::new();
        for i in 0..(MAX_SAMPLES as u64 + 500) {
            collector.record_request(200, Duration::from_micros(i));
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.requests.total, MAX_SAMPLES as u64 + 500);
        assert_eq!(snapshot.requests.latency_us.samples, MAX_SAMPLES);
    }

    #[test]
    fn test_snapshot_serializes() {
        let collector = MetricsCollector::new();
        collector.record_admission(AdmissionResult::Accepted);

        let json = serde_json::to_value(collector.snapshot()).unwrap();
        assert_eq!(json["admission"]["accepted"], 1);
        assert!(json["requests"]["latency_us"]["p50"].is_number());
    }
}
