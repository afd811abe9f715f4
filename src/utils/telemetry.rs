//! Telemetry Module
//!
//! Counts what the gateway produced (QLR files, prepared notebooks) and
//! what failed, for the `/stats` endpoint and the shutdown summary.
//! No URLs or query parameters are stored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Kind of operation being recorded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Qlr,
    Notebook,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Qlr => "qlr",
            OperationKind::Notebook => "notebook",
        }
    }
}

/// Aggregated statistics for reporting
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetryStats {
    pub qlr_generated: u64,
    pub notebooks_prepared: u64,
    pub total_failures: u64,
    /// Failures keyed by error code
    pub failures_by_code: HashMap<String, u64>,
    /// Average latency of successful operations (ms)
    pub avg_latency_ms: f64,
    /// Unix timestamp of collector creation
    pub period_start: i64,
}

/// Thread-safe collector shared through `AppState`
pub struct TelemetryCollector {
    qlr_generated: AtomicU64,
    notebooks_prepared: AtomicU64,
    total_failures: AtomicU64,
    total_latency_ms: AtomicU64,
    failure_counts: RwLock<HashMap<String, u64>>,
    session_start: i64,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            qlr_generated: AtomicU64::new(0),
            notebooks_prepared: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            failure_counts: RwLock::new(HashMap::new()),
            session_start: chrono::Utc::now().timestamp(),
        }
    }

    /// Record a successful operation
    pub fn record_success(&self, kind: OperationKind, latency_ms: u64) {
        match kind {
            OperationKind::Qlr => self.qlr_generated.fetch_add(1, Ordering::Relaxed),
            OperationKind::Notebook => self.notebooks_prepared.fetch_add(1, Ordering::Relaxed),
        };
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Record a failed operation under its error code
    pub fn record_failure(&self, code: &str) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut counts) = self.failure_counts.write() {
            *counts.entry(code.to_string()).or_insert(0) += 1;
        }
    }

    pub fn get_stats(&self) -> TelemetryStats {
        let qlr = self.qlr_generated.load(Ordering::Relaxed);
        let notebooks = self.notebooks_prepared.load(Ordering::Relaxed);
        let successes = qlr + notebooks;
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        let avg_latency_ms = if successes > 0 {
            total_latency as f64 / successes as f64
        } else {
            0.0
        };

        let failures_by_code = self
            .failure_counts
            .read()
            .map(|counts| counts.clone())
            .unwrap_or_default();

        TelemetryStats {
            qlr_generated: qlr,
            notebooks_prepared: notebooks,
            total_failures: self.total_failures.load(Ordering::Relaxed),
            failures_by_code,
            avg_latency_ms,
            period_start: self.session_start,
        }
    }

    /// Reset counters (for new reporting period)
    pub fn reset(&self) {
        self.qlr_generated.store(0, Ordering::Relaxed);
        self.notebooks_prepared.store(0, Ordering::Relaxed);
        self.total_failures.store(0, Ordering::Relaxed);
        self.total_latency_ms.store(0, Ordering::Relaxed);
        if let Ok(mut counts) = self.failure_counts.write() {
            counts.clear();
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_basic() {
        let collector = TelemetryCollector::new();
        collector.record_success(OperationKind::Qlr, 10);
        collector.record_success(OperationKind::Notebook, 30);
        collector.record_failure("NOTEBOOK_NOT_FOUND");
        collector.record_failure("NOTEBOOK_NOT_FOUND");

        let stats = collector.get_stats();
        assert_eq!(stats.qlr_generated, 1);
        assert_eq!(stats.notebooks_prepared, 1);
        assert_eq!(stats.total_failures, 2);
        assert_eq!(stats.failures_by_code.get("NOTEBOOK_NOT_FOUND"), Some(&2));
        assert_eq!(stats.avg_latency_ms, 20.0);
    }

    #[test]
    fn test_reset() {
        let collector = TelemetryCollector::new();
        collector.record_success(OperationKind::Qlr, 5);
        collector.record_failure("X");
        collector.reset();

        let stats = collector.get_stats();
        assert_eq!(stats.qlr_generated, 0);
        assert_eq!(stats.total_failures, 0);
        assert!(stats.failures_by_code.is_empty());
    }
}
