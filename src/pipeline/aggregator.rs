//! Per-outcome batching of classified tasks.
//!
//! One aggregator owns one buffer. Appends, periodic flushes and the final
//! drain all happen inside a single `select!` loop, so an append can never
//! interleave with a flush and every received task lands in exactly one
//! emitted batch.

use crate::io::ReportEmitter;
use crate::pipeline::Metrics;
use crate::task::ProcessedTask;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Totals from one aggregator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub label: String,
    /// Batches emitted, including the final one
    pub flushes: u64,
    /// Tasks included across all batches
    pub tasks_reported: u64,
}

/// Buffers tasks of one outcome class and flushes them on a fixed tick.
pub struct Aggregator {
    label: String,
    flush_interval: Duration,
    emitter: Arc<dyn ReportEmitter>,
    metrics: Arc<Metrics>,
}

impl Aggregator {
    /// Intervals below one millisecond are raised to one millisecond.
    pub fn new(
        label: impl Into<String>,
        flush_interval: Duration,
        emitter: Arc<dyn ReportEmitter>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            label: label.into(),
            flush_interval: flush_interval.max(MIN_FLUSH_INTERVAL),
            emitter,
            metrics,
        }
    }

    /// Collect from `rx` until its senders are gone, then flush the remainder.
    ///
    /// The first tick fires one interval after start. An interval with no
    /// arrivals still emits its (empty) labeled batch.
    pub async fn run(self, mut rx: mpsc::Receiver<ProcessedTask>) -> AggregatorStats {
        let mut buffer: Vec<ProcessedTask> = Vec::new();
        let mut stats = AggregatorStats {
            label: self.label.clone(),
            ..Default::default()
        };

        let mut ticker = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                item = rx.recv() => match item {
                    Some(task) => buffer.push(task),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.flush(&mut buffer, &mut stats);
                }
            }
        }

        self.flush(&mut buffer, &mut stats);

        tracing::info!(
            "{} aggregator drained: {} tasks in {} batches",
            self.label,
            stats.tasks_reported,
            stats.flushes
        );
        stats
    }

    fn flush(&self, buffer: &mut Vec<ProcessedTask>, stats: &mut AggregatorStats) {
        let batch = std::mem::take(buffer);
        let count = batch.len() as u64;

        if let Err(e) = self.emitter.emit(&self.label, &batch) {
            tracing::warn!(
                "Failed to emit {} batch of {} tasks: {}",
                self.label,
                count,
                e
            );
            self.metrics.add_emit_failure();
        }

        stats.flushes += 1;
        stats.tasks_reported += count;
        self.metrics.add_flush(count);
        tracing::debug!("{} flushed {} tasks", self.label, count);
    }
}
