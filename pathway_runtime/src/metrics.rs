//! Planning service metrics: request counts and cumulative planning time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

/// Kind of event being counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Fresh path generated
    PathGenerated,
    /// Path re-planned after progress
    Replan,
    /// Step skipped for lack of content
    StepSkipped,
    /// Request ended with an empty path
    EmptyPath,
    /// Request cancelled by the caller
    Cancelled,
}

const KINDS: usize = 5;

/// Thread-safe counters shared by every clone.
#[derive(Clone, Debug)]
pub struct RuntimeMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    counts: [AtomicU64; KINDS],
    planning_time_ns: AtomicU64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                counts: std::array::from_fn(|_| AtomicU64::new(0)),
                planning_time_ns: AtomicU64::new(0),
            }),
        }
    }

    pub fn record(&self, kind: MetricKind) {
        self.record_n(kind, 1);
    }

    pub fn record_n(&self, kind: MetricKind, n: u64) {
        self.inner.counts[kind as usize].fetch_add(n, Ordering::Relaxed);
    }

    /// Adds one planning run's wall time.
    pub fn record_planning_time(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.inner.planning_time_ns.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn count(&self, kind: MetricKind) -> u64 {
        self.inner.counts[kind as usize].load(Ordering::Relaxed)
    }

    pub fn planning_time(&self) -> Duration {
        Duration::from_nanos(self.inner.planning_time_ns.load(Ordering::Relaxed))
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            paths_generated: self.count(MetricKind::PathGenerated),
            replans: self.count(MetricKind::Replan),
            steps_skipped: self.count(MetricKind::StepSkipped),
            empty_paths: self.count(MetricKind::EmptyPath),
            cancellations: self.count(MetricKind::Cancelled),
            planning_time: self.planning_time(),
        }
    }

    pub fn reset(&self) {
        for count in &self.inner.counts {
            count.store(0, Ordering::Relaxed);
        }
        self.inner.planning_time_ns.store(0, Ordering::Relaxed);
    }
}

impl Default for RuntimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub paths_generated: u64,
    pub replans: u64,
    pub steps_skipped: u64,
    pub empty_paths: u64,
    pub cancellations: u64,
    pub planning_time: Duration,
}
