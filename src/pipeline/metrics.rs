//! Pipeline counters and periodic progress logging.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Metrics for the pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Tasks emitted by the generator
    pub tasks_generated: AtomicU64,

    /// Tasks emitted with the malformed stamp
    pub tasks_malformed: AtomicU64,

    /// Tasks classified as success
    pub tasks_succeeded: AtomicU64,

    /// Tasks classified as failure
    pub tasks_failed: AtomicU64,

    /// Dispatches that found their sink closed
    pub dispatch_failures: AtomicU64,

    /// Tasks included in a flushed batch
    pub tasks_reported: AtomicU64,

    /// Batches flushed by all aggregators
    pub flushes: AtomicU64,

    /// Batches the emitter rejected
    pub emit_failures: AtomicU64,

    /// Start time
    start_time: Option<Instant>,
}

impl Metrics {
    /// Create new metrics.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        })
    }

    pub fn add_task_generated(&self) {
        self.tasks_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_task_malformed(&self) {
        self.tasks_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_task_succeeded(&self) {
        self.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a flushed batch of `tasks` tasks.
    pub fn add_flush(&self, tasks: u64) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.tasks_reported.fetch_add(tasks, Ordering::Relaxed);
    }

    pub fn add_emit_failure(&self) {
        self.emit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start_time.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Get generated tasks per second.
    pub fn tasks_per_second(&self) -> f64 {
        let tasks = self.tasks_generated.load(Ordering::Relaxed);
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            tasks as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_generated: self.tasks_generated.load(Ordering::Relaxed),
            tasks_malformed: self.tasks_malformed.load(Ordering::Relaxed),
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            tasks_reported: self.tasks_reported.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            emit_failures: self.emit_failures.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            tasks_per_second: self.tasks_per_second(),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub tasks_generated: u64,
    pub tasks_malformed: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub dispatch_failures: u64,
    pub tasks_reported: u64,
    pub flushes: u64,
    pub emit_failures: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub tasks_per_second: f64,
}

impl MetricsSnapshot {
    /// Tasks classified but not yet part of a flushed batch.
    pub fn in_flight(&self) -> u64 {
        (self.tasks_succeeded + self.tasks_failed).saturating_sub(self.tasks_reported)
    }

    /// Save metrics to a JSON file.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Metrics saved to {}", path);
        Ok(())
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tasks: {} generated ({} malformed) | Classified: {} ok, {} failed | \
             Reported: {} in {} flushes | In flight: {} | Rate: {:.0} tasks/s | Elapsed: {:.1}s",
            self.tasks_generated,
            self.tasks_malformed,
            self.tasks_succeeded,
            self.tasks_failed,
            self.tasks_reported,
            self.flushes,
            self.in_flight(),
            self.tasks_per_second,
            self.elapsed.as_secs_f64(),
        )
    }
}

/// Periodic metrics reporter.
pub struct MetricsReporter {
    metrics: Arc<Metrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    /// Create a new metrics reporter.
    pub fn new(metrics: Arc<Metrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Log snapshots until `shutdown` fires or its sender is dropped.
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = interval(Duration::from_secs(self.interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::info!("{}", self.metrics.snapshot());
                }
                _ = shutdown.recv() => {
                    tracing::info!("Final: {}", self.metrics.snapshot());
                    break;
                }
            }
        }
    }

    /// Log a final summary.
    pub fn log_summary(&self) {
        let snapshot = self.metrics.snapshot();

        tracing::info!("=== Pipeline Summary ===");
        tracing::info!("Total time: {:.1}s", snapshot.elapsed.as_secs_f64());
        tracing::info!(
            "Tasks generated: {} ({} malformed)",
            snapshot.tasks_generated,
            snapshot.tasks_malformed
        );
        tracing::info!(
            "Classified: {} succeeded, {} failed",
            snapshot.tasks_succeeded,
            snapshot.tasks_failed
        );
        tracing::info!(
            "Reported: {} tasks in {} flushes",
            snapshot.tasks_reported,
            snapshot.flushes
        );
        if snapshot.dispatch_failures > 0 || snapshot.emit_failures > 0 {
            tracing::warn!(
                "Dispatch failures: {}, emit failures: {}",
                snapshot.dispatch_failures,
                snapshot.emit_failures
            );
        }
    }
}
