//! Process-wide counters for processed files and errors

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Destination for service observability events
pub trait MetricsSink: Send + Sync {
    fn record_file_processed(&self, bytes: u64, rows: u64, duration: Duration);

    /// Count one failure under `error_type`
    fn record_error(&self, error_type: &str);

    /// Count one finished operation by outcome
    fn record_operation(&self, _operation: &str, _success: bool) {}

    fn snapshot(&self) -> MetricsSnapshot;
}

/// Success and failure totals for one operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounts {
    pub success: u64,
    pub failure: u64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub files_processed: u64,
    pub total_rows: u64,
    pub total_bytes: u64,
    pub total_duration_ms: u64,
    pub errors: BTreeMap<String, u64>,
    pub operations: BTreeMap<String, OperationCounts>,
}

impl MetricsSnapshot {
    pub fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }

    /// Mean processing time per file in milliseconds
    pub fn average_duration_ms(&self) -> f64 {
        if self.files_processed == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.files_processed as f64
        }
    }
}

/// Lock-free totals plus mutex-guarded maps for labelled counters.
/// Readers see eventually consistent values under concurrent writes.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    files_processed: AtomicU64,
    total_rows: AtomicU64,
    total_bytes: AtomicU64,
    total_duration_ms: AtomicU64,
    errors: Mutex<BTreeMap<String, u64>>,
    operations: Mutex<BTreeMap<String, OperationCounts>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_file_processed(&self, bytes: u64, rows: u64, duration: Duration) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.total_rows.fetch_add(rows, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.total_duration_ms.fetch_add(millis, Ordering::Relaxed);
    }

    fn record_error(&self, error_type: &str) {
        *self.errors.lock().entry(error_type.to_string()).or_insert(0) += 1;
    }

    fn record_operation(&self, operation: &str, success: bool) {
        let mut operations = self.operations.lock();
        let counts = operations.entry(operation.to_string()).or_default();
        if success {
            counts.success += 1;
        } else {
            counts.failure += 1;
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            total_rows: self.total_rows.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
            errors: self.errors.lock().clone(),
            operations: self.operations.lock().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_records_accumulate() {
        let metrics = InMemoryMetrics::new();
        metrics.record_file_processed(1024, 10, Duration::from_millis(30));
        metrics.record_file_processed(2048, 5, Duration::from_millis(10));
        metrics.record_error("invalid_column");
        metrics.record_error("invalid_column");
        metrics.record_error("io");
        metrics.record_operation("extract", true);
        metrics.record_operation("extract", false);
        metrics.record_operation("merge", true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_processed, 2);
        assert_eq!(snapshot.total_rows, 15);
        assert_eq!(snapshot.total_bytes, 3072);
        assert_eq!(snapshot.total_duration_ms, 40);
        assert_eq!(snapshot.average_duration_ms(), 20.0);
        assert_eq!(snapshot.errors["invalid_column"], 2);
        assert_eq!(snapshot.total_errors(), 3);
        assert_eq!(
            snapshot.operations["extract"],
            OperationCounts { success: 1, failure: 1 }
        );
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let metrics = InMemoryMetrics::new();
        metrics.record_error("io");
        let before = metrics.snapshot();
        metrics.record_error("io");
        assert_eq!(before.errors["io"], 1);
        assert_eq!(metrics.snapshot().errors["io"], 2);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(InMemoryMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_file_processed(1, 2, Duration::from_millis(1));
                        metrics.record_error("processing");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_processed, 800);
        assert_eq!(snapshot.total_rows, 1600);
        assert_eq!(snapshot.errors["processing"], 800);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(InMemoryMetrics::new().snapshot()).unwrap();
        assert_eq!(json["filesProcessed"], 0);
        assert_eq!(json["totalDurationMs"], 0);
        assert!(json["errors"].as_object().unwrap().is_empty());
    }
}
