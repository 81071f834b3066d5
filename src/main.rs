//! Task Sorter CLI
//!
//! Generates, classifies and periodically reports synthetic tasks.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use task_sorter::{build_runtime, run_pipeline, Config};

#[derive(Parser)]
#[command(name = "task-sorter")]
#[command(about = "Generate, classify and report synthetic tasks", long_about = None)]
struct Cli {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override how long tasks are generated, in milliseconds
    #[arg(long, global = true)]
    duration_ms: Option<u64>,

    /// Override the report interval, in milliseconds
    #[arg(long, global = true)]
    report_interval_ms: Option<u64>,

    /// Override the number of classification workers
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline (default if no command specified)
    Run,

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "task-sorter.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Reports own stdout, logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(&cli)?;
            run_command(config)?;
        }

        Some(Commands::Validate) => {
            load_config(&cli)?;
            println!("Configuration is valid");
        }

        Some(Commands::GenerateConfig { ref output }) => {
            generate_config_command(output)?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Apply overrides
    if let Some(ms) = cli.duration_ms {
        config.generator.run_duration_ms = ms;
    }
    if let Some(ms) = cli.report_interval_ms {
        config.report.interval_ms = ms;
    }
    if let Some(workers) = cli.workers {
        config.processing.workers = workers;
    }

    config.validate()?;
    Ok(config)
}

fn run_command(config: Config) -> Result<()> {
    let runtime = build_runtime(config.processing.worker_threads)?;
    let stats = runtime.block_on(async { run_pipeline(config).await })?;

    if !stats.is_balanced() {
        anyhow::bail!("Task accounting mismatch: {}", stats);
    }
    Ok(())
}

fn generate_config_command(output: &PathBuf) -> Result<()> {
    let yaml = r#"# Task Sorter Configuration

# === GENERATOR: Synthetic task source ===
generator:
  # How long tasks are generated, in milliseconds
  run_duration_ms: 10000

  # Spacing between tasks in nanoseconds (below 1ms = as fast as possible)
  produce_interval_ns: 1

  # Queue capacity between generator and workers
  queue_capacity: 10

# === PROCESSING: Classification workers ===
processing:
  # Intake loops sharing the generator queue
  workers: 4

  # Tasks older than this (seconds) are classified as failures
  recency_window_secs: 20

  # Capacity of each outcome sink
  sink_capacity: 10

  # Tokio worker threads (null = num CPUs)
  # worker_threads: 8

# === REPORT: Periodic output ===
report:
  # Flush interval per outcome, in milliseconds
  interval_ms: 3000

  success_label: "Done Tasks"
  failure_label: "Errors"

# === METRICS: Progress logging (stderr) ===
metrics:
  enabled: true
  interval_secs: 1

  # Save final metrics as JSON
  # output_path: "metrics.json"
"#;

    std::fs::write(output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_default() {
        // No subcommand - should default to Run
        let cli = Cli::try_parse_from(["task-sorter"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_overrides_apply() {
        let cli = Cli::try_parse_from([
            "task-sorter",
            "--duration-ms",
            "1000",
            "--report-interval-ms",
            "300",
            "--workers",
            "2",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();
        assert_eq!(config.generator.run_duration_ms, 1000);
        assert_eq!(config.report.interval_ms, 300);
        assert_eq!(config.processing.workers, 2);
    }

    #[test]
    fn test_cli_invalid_override_rejected() {
        let cli = Cli::try_parse_from(["task-sorter", "--workers", "0", "validate"]).unwrap();
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let cli = Cli::try_parse_from(["task-sorter", "-c", path.to_str().unwrap()]).unwrap();

        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_generated_config_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-sorter.yaml");
        generate_config_command(&path).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.report.interval_ms, 3000);
    }
}
