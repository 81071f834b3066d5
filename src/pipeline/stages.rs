//! Stage wiring for the task pipeline.
//!
//! ```text
//!                              ┌──────────────┐    ┌──────────────────┐
//!                        ┌────▶│ success sink │───▶│ "Done Tasks" agg │──┐
//! ┌───────────┐    ┌─────┴───┐ └──────────────┘    └──────────────────┘  │   ┌─────────┐
//! │ Generator │───▶│ Workers │                                           ├──▶│ Emitter │
//! └───────────┘    └─────┬───┘ ┌──────────────┐    ┌──────────────────┐  │   └─────────┘
//!       task_rx          └────▶│ failure sink │───▶│   "Errors" agg   │──┘
//!                              └──────────────┘    └──────────────────┘
//! ```
//!
//! Only the generator watches the clock. Every later stage stops when its
//! input closes, so tasks still in flight at the end of the window are
//! reported before the run returns.

use crate::config::Config;
use crate::io::ReportEmitter;
use crate::pipeline::{
    Aggregator, AggregatorStats, Classifier, Generator, Metrics, MetricsReporter, OutcomeSinks,
    WorkerPool,
};
use crate::task::Task;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration for the pipeline stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How long the generator emits tasks
    pub run_duration: Duration,
    /// Spacing between generated tasks
    pub produce_interval: Duration,
    /// Buffer between generator and workers
    pub queue_capacity: usize,
    /// Number of intake loops
    pub workers: usize,
    /// Maximum age that still classifies as success
    pub recency_window: Duration,
    /// Buffer of each outcome sink
    pub sink_capacity: usize,
    /// Aggregator flush interval
    pub report_interval: Duration,
    pub success_label: String,
    pub failure_label: String,
    /// Progress logging interval, `None` to disable
    pub metrics_interval: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            run_duration: config.generator.run_duration(),
            produce_interval: config.generator.produce_interval(),
            queue_capacity: config.generator.queue_capacity,
            workers: config.processing.workers,
            recency_window: config.processing.recency_window(),
            sink_capacity: config.processing.sink_capacity,
            report_interval: config.report.interval(),
            success_label: config.report.success_label.clone(),
            failure_label: config.report.failure_label.clone(),
            metrics_interval: config
                .metrics
                .enabled
                .then(|| Duration::from_secs(config.metrics.interval_secs)),
        }
    }
}

/// Pipeline executor.
pub struct Pipeline {
    config: PipelineConfig,
    emitter: Arc<dyn ReportEmitter>,
    metrics: Arc<Metrics>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        emitter: Arc<dyn ReportEmitter>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            emitter,
            metrics,
        }
    }

    /// Run every stage to completion.
    ///
    /// Returns once both aggregators have made their final flush.
    pub async fn run(&self, cancel: CancellationToken) -> Result<PipelineStats> {
        let config = &self.config;

        let (task_tx, task_rx) = async_channel::bounded::<Task>(config.queue_capacity.max(1));
        let (success_tx, success_rx) = mpsc::channel(config.sink_capacity.max(1));
        let (failure_tx, failure_rx) = mpsc::channel(config.sink_capacity.max(1));

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let reporter_handle = match config.metrics_interval {
            Some(interval) => {
                let reporter = MetricsReporter::new(self.metrics.clone(), interval.as_secs());
                Some(tokio::spawn(reporter.run(shutdown_rx)))
            }
            None => {
                drop(shutdown_rx);
                None
            }
        };

        let success_handle = tokio::spawn(
            Aggregator::new(
                config.success_label.clone(),
                config.report_interval,
                self.emitter.clone(),
                self.metrics.clone(),
            )
            .run(success_rx),
        );
        let failure_handle = tokio::spawn(
            Aggregator::new(
                config.failure_label.clone(),
                config.report_interval,
                self.emitter.clone(),
                self.metrics.clone(),
            )
            .run(failure_rx),
        );

        let pool = WorkerPool::new(
            Classifier::new(config.recency_window),
            config.workers,
            self.metrics.clone(),
        );
        let pool_handle = tokio::spawn(pool.run(
            task_rx,
            OutcomeSinks {
                success: success_tx,
                failure: failure_tx,
            },
        ));

        let generator = Generator::new(
            config.run_duration,
            config.produce_interval,
            self.metrics.clone(),
        );
        let generator_handle = tokio::spawn(generator.run(task_tx, cancel));

        tracing::info!(
            "Pipeline running for {:?} ({} workers, report every {:?})",
            config.run_duration,
            config.workers,
            config.report_interval
        );

        // Join every stage before surfacing a failure so none is left detached
        let generated = generator_handle.await;
        let pool_stats = pool_handle.await;
        let success = success_handle.await;
        let failure = failure_handle.await;

        let _ = shutdown_tx.send(()).await;
        if let Some(handle) = reporter_handle {
            let _ = handle.await;
        }

        let generated = generated?;
        let pool_stats = pool_stats??;
        let success = success?;
        let failure = failure?;

        let stats = PipelineStats {
            generated,
            malformed: self.metrics.snapshot().tasks_malformed,
            succeeded: pool_stats.succeeded,
            failed: pool_stats.failed,
            success,
            failure,
        };

        if !stats.is_balanced() {
            tracing::error!("Task accounting mismatch: {}", stats);
        }

        Ok(stats)
    }
}

/// Statistics from a pipeline run.
#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    pub generated: u64,
    pub malformed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub success: AggregatorStats,
    pub failure: AggregatorStats,
}

impl PipelineStats {
    /// Total tasks that appeared in any report.
    pub fn reported(&self) -> u64 {
        self.success.tasks_reported + self.failure.tasks_reported
    }

    /// Whether every generated task was reported exactly once.
    pub fn is_balanced(&self) -> bool {
        self.generated == self.reported()
            && self.success.tasks_reported == self.succeeded
            && self.failure.tasks_reported == self.failed
    }
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Generated: {} ({} malformed), {}: {} in {} batches, {}: {} in {} batches",
            self.generated,
            self.malformed,
            self.success.label,
            self.success.tasks_reported,
            self.success.flushes,
            self.failure.label,
            self.failure.tasks_reported,
            self.failure.flushes
        )
    }
}
