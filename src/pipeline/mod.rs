//! Pipeline stages: generation, classification, aggregation.

mod aggregator;
mod classifier;
mod generator;
mod metrics;
mod stages;
mod worker_pool;


pub use aggregator::{Aggregator, AggregatorStats};
pub use classifier::Classifier;
pub use generator::{is_malformed_at, Generator};
pub use metrics::{Metrics, MetricsReporter, MetricsSnapshot};
pub use stages::{Pipeline, PipelineConfig, PipelineStats};
pub use worker_pool::{OutcomeSinks, WorkerPool, WorkerPoolStats};
