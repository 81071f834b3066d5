//! Task generation.
//!
//! Emits one task per produce interval until the run window closes, then
//! closes the queue so downstream stages can drain.

use crate::pipeline::Metrics;
use crate::task::Task;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Intervals shorter than this are below the timer resolution.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Fault injection rule: tasks created on an odd nanosecond are malformed.
pub fn is_malformed_at(now: DateTime<Utc>) -> bool {
    now.timestamp_subsec_nanos() % 2 > 0
}

/// Produces tasks for a fixed window.
pub struct Generator {
    run_duration: Duration,
    produce_interval: Duration,
    metrics: Arc<Metrics>,
}

impl Generator {
    pub fn new(run_duration: Duration, produce_interval: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            run_duration,
            produce_interval,
            metrics,
        }
    }

    /// Run until the window elapses or `cancel` fires.
    ///
    /// The queue is closed on return. Returns the number of tasks emitted.
    pub async fn run(self, tx: async_channel::Sender<Task>, cancel: CancellationToken) -> u64 {
        let deadline = Instant::now() + self.run_duration;
        let mut next_id: u64 = 1;

        tracing::debug!("Generator started for {:?}", self.run_duration);

        while Instant::now() < deadline && !cancel.is_cancelled() {
            let now = Utc::now();
            let malformed = is_malformed_at(now);
            let task = if malformed {
                Task::malformed(next_id)
            } else {
                Task::new(next_id, now)
            };

            // Blocks while the queue is full
            let sent = tokio::select! {
                res = tx.send(task) => res.is_ok(),
                _ = cancel.cancelled() => false,
            };
            if !sent {
                break;
            }

            self.metrics.add_task_generated();
            if malformed {
                self.metrics.add_task_malformed();
            }
            next_id += 1;

            if self.produce_interval < MIN_SLEEP {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(self.produce_interval) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }

        tx.close();

        let generated = next_id - 1;
        if cancel.is_cancelled() {
            tracing::info!("Generator cancelled after {} tasks", generated);
        } else {
            tracing::info!("Generator finished: {} tasks", generated);
        }
        generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fault_rule_uses_nanosecond_parity() {
        let even = Utc.timestamp_opt(1_700_000_000, 2_000).unwrap();
        let odd = Utc.timestamp_opt(1_700_000_000, 2_001).unwrap();

        assert!(!is_malformed_at(even));
        assert!(is_malformed_at(odd));
    }

    #[tokio::test]
    async fn test_generator_emits_increasing_ids_and_closes() {
        let metrics = Metrics::new();
        let (tx, rx) = async_channel::bounded(4);
        let generator = Generator::new(
            Duration::from_millis(50),
            Duration::from_millis(5),
            metrics.clone(),
        );

        let handle = tokio::spawn(generator.run(tx, CancellationToken::new()));

        let mut ids = Vec::new();
        while let Ok(task) = rx.recv().await {
            ids.push(task.id);
        }
        let generated = handle.await.unwrap();

        assert!(generated > 0);
        assert_eq!(ids.len() as u64, generated);
        assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(ids[0], 1);
        assert_eq!(metrics.snapshot().tasks_generated, generated);
    }

    #[tokio::test]
    async fn test_generator_applies_backpressure_without_dropping() {
        let metrics = Metrics::new();
        let (tx, rx) = async_channel::bounded(1);
        let generator = Generator::new(Duration::from_millis(100), Duration::ZERO, metrics);

        let handle = tokio::spawn(generator.run(tx, CancellationToken::new()));

        // Slow consumer: the generator must wait rather than drop
        let mut received = 0u64;
        while let Ok(_task) = rx.recv().await {
            received += 1;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let generated = handle.await.unwrap();

        assert_eq!(received, generated);
    }

    #[tokio::test]
    async fn test_generator_stops_on_cancel() {
        let metrics = Metrics::new();
        let (tx, rx) = async_channel::bounded(1);
        let cancel = CancellationToken::new();
        let generator = Generator::new(Duration::from_secs(60), Duration::ZERO, metrics);

        let handle = tokio::spawn(generator.run(tx, cancel.clone()));
        let first = rx.recv().await.unwrap();
        assert_eq!(first.id, 1);

        cancel.cancel();
        let generated = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("generator did not stop")
            .unwrap();

        let mut drained = 1u64;
        while rx.recv().await.is_ok() {
            drained += 1;
        }
        assert_eq!(drained, generated);
    }
}
