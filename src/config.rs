//! Configuration for the task pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the task pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Task generation
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Classification workers
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Periodic reporting
    #[serde(default)]
    pub report: ReportConfig,

    /// Progress metrics
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// How long the generator keeps emitting tasks, in milliseconds
    #[serde(default = "default_run_duration_ms")]
    pub run_duration_ms: u64,

    /// Spacing between emitted tasks, in nanoseconds.
    /// Anything below the timer resolution means "as fast as possible".
    #[serde(default = "default_produce_interval_ns")]
    pub produce_interval_ns: u64,

    /// Capacity of the queue between generator and workers
    #[serde(default = "default_capacity")]
    pub queue_capacity: usize,
}

impl GeneratorConfig {
    pub fn run_duration(&self) -> Duration {
        Duration::from_millis(self.run_duration_ms)
    }

    pub fn produce_interval(&self) -> Duration {
        Duration::from_nanos(self.produce_interval_ns)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            run_duration_ms: default_run_duration_ms(),
            produce_interval_ns: default_produce_interval_ns(),
            queue_capacity: default_capacity(),
        }
    }
}

/// Processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of intake loops sharing the generator queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum task age, in seconds, that still classifies as success
    #[serde(default = "default_recency_window_secs")]
    pub recency_window_secs: u64,

    /// Capacity of each outcome sink
    #[serde(default = "default_capacity")]
    pub sink_capacity: usize,

    /// Number of Tokio worker threads (null = num CPUs)
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl ProcessingConfig {
    pub fn recency_window(&self) -> Duration {
        Duration::from_secs(self.recency_window_secs)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            recency_window_secs: default_recency_window_secs(),
            sink_capacity: default_capacity(),
            worker_threads: None,
        }
    }
}

/// Reporting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Flush interval for each aggregator, in milliseconds
    #[serde(default = "default_report_interval_ms")]
    pub interval_ms: u64,

    /// Label printed above successful tasks
    #[serde(default = "default_success_label")]
    pub success_label: String,

    /// Label printed above failed tasks
    #[serde(default = "default_failure_label")]
    pub failure_label: String,
}

impl ReportConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_report_interval_ms(),
            success_label: default_success_label(),
            failure_label: default_failure_label(),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Log progress snapshots while running
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Progress logging interval in seconds
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,

    /// Optional path to save the final metrics as JSON
    #[serde(default)]
    pub output_path: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_metrics_interval(),
            output_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "json" => serde_json::from_str(&contents)?,
            // YAML is a superset of JSON
            _ => serde_yaml::from_str(&contents)?,
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.generator.run_duration_ms == 0 {
            anyhow::bail!("Run duration must be > 0");
        }
        if self.generator.queue_capacity == 0 || self.processing.sink_capacity == 0 {
            anyhow::bail!("Queue and sink capacities must be > 0");
        }
        if self.processing.workers == 0 {
            anyhow::bail!("Workers must be > 0");
        }
        if self.processing.recency_window_secs == 0 {
            anyhow::bail!("Recency window must be > 0");
        }
        if self.report.interval_ms == 0 {
            anyhow::bail!("Report interval must be > 0");
        }
        if self.report.success_label.is_empty() || self.report.failure_label.is_empty() {
            anyhow::bail!("Report labels must not be empty");
        }
        if self.report.success_label == self.report.failure_label {
            anyhow::bail!("Success and failure labels must differ");
        }
        if self.metrics.enabled && self.metrics.interval_secs == 0 {
            anyhow::bail!("Metrics interval must be > 0 when metrics are enabled");
        }
        Ok(())
    }
}

// Default value functions for serde
fn default_run_duration_ms() -> u64 { 10_000 }
fn default_produce_interval_ns() -> u64 { 1 }
fn default_capacity() -> usize { 10 }
fn default_workers() -> usize { 4 }
fn default_recency_window_secs() -> u64 { 20 }
fn default_report_interval_ms() -> u64 { 3_000 }
fn default_success_label() -> String { "Done Tasks".to_string() }
fn default_failure_label() -> String { "Errors".to_string() }
fn default_true() -> bool { true }
fn default_metrics_interval() -> u64 { 1 }
