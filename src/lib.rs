//! Task Sorter
//!
//! Bounded-time task pipeline: a generator emits synthetic tasks, a worker
//! pool classifies each one by the age of its creation stamp, and one
//! aggregator per outcome prints the accumulated tasks on a fixed tick.
//!
//! # Architecture
//!
//! - **Task**: the unit of work, split into unclassified and processed forms
//! - **Pipeline**: generator, worker pool and aggregators connected by bounded channels
//! - **I/O**: report emitters that render labeled batches
//! - **Config**: YAML/JSON configuration with reference defaults
//!
//! # Usage
//!
//! ```no_run
//! use task_sorter::{run_pipeline, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let stats = run_pipeline(Config::default()).await?;
//!     assert!(stats.is_balanced());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod io;
pub mod pipeline;
pub mod task;

pub use config::Config;
pub use io::{MemoryEmitter, ReportEmitter, StdoutEmitter};
pub use pipeline::{Metrics, MetricsReporter, Pipeline, PipelineConfig, PipelineStats};
pub use task::{Outcome, ProcessedTask, Task};

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run the full pipeline with the given configuration, reporting to stdout.
///
/// Ctrl-C stops generation early; tasks already generated are still reported.
pub async fn run_pipeline(config: Config) -> Result<PipelineStats> {
    config.validate()?;

    tracing::info!("Starting task pipeline");

    let metrics = Metrics::new();
    let pipeline = Pipeline::new(
        PipelineConfig::from(&config),
        Arc::new(StdoutEmitter),
        metrics.clone(),
    );

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, draining pipeline");
                cancel.cancel();
            }
        })
    };

    let result = pipeline.run(cancel).await;
    ctrl_c.abort();
    let stats = result?;

    if config.metrics.enabled {
        MetricsReporter::new(metrics.clone(), config.metrics.interval_secs).log_summary();
    }
    if let Some(ref path) = config.metrics.output_path {
        if let Err(e) = metrics.snapshot().save_to_file(path) {
            tracing::warn!("Failed to save metrics to {}: {}", path, e);
        }
    }

    tracing::info!("Pipeline complete: {}", stats);

    Ok(stats)
}

/// Build a Tokio runtime with the specified configuration.
pub fn build_runtime(worker_threads: Option<usize>) -> Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();

    if let Some(threads) = worker_threads {
        builder.worker_threads(threads);
    }

    builder.enable_all();

    Ok(builder.build()?)
}
