//! Classification workers.
//!
//! Several intake loops share the generator queue. Each classified task is
//! handed to a spawned dispatch so intake never waits on a slow sink. Every
//! loop tracks its dispatches in a `JoinSet` and waits for them once the
//! queue is drained; the sinks close when the last loop and its dispatches
//! have finished and every sender clone is dropped.

use crate::pipeline::{Classifier, Metrics};
use crate::task::{Outcome, ProcessedTask, Task};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Senders for the two outcome classes.
#[derive(Clone)]
pub struct OutcomeSinks {
    pub success: mpsc::Sender<ProcessedTask>,
    pub failure: mpsc::Sender<ProcessedTask>,
}

impl OutcomeSinks {
    fn for_outcome(&self, outcome: Outcome) -> &mpsc::Sender<ProcessedTask> {
        match outcome {
            Outcome::Success => &self.success,
            Outcome::Failure => &self.failure,
        }
    }
}

/// Totals from a worker pool run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolStats {
    pub succeeded: u64,
    pub failed: u64,
}

impl WorkerPoolStats {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }

    fn merge(&mut self, other: WorkerPoolStats) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Pool of classification workers.
pub struct WorkerPool {
    classifier: Classifier,
    workers: usize,
    metrics: Arc<Metrics>,
}

impl WorkerPool {
    pub fn new(classifier: Classifier, workers: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            classifier,
            workers: workers.max(1),
            metrics,
        }
    }

    /// Classify every task until the queue is closed and empty.
    ///
    /// Both sinks are closed when this returns: the pool consumes `sinks` and
    /// every dispatch clone has been dropped by then.
    pub async fn run(
        self,
        tasks: async_channel::Receiver<Task>,
        sinks: OutcomeSinks,
    ) -> Result<WorkerPoolStats> {
        let mut handles = Vec::with_capacity(self.workers);

        for worker_id in 0..self.workers {
            let tasks = tasks.clone();
            let sinks = sinks.clone();
            let metrics = self.metrics.clone();
            let classifier = self.classifier;

            handles.push(tokio::spawn(async move {
                intake_loop(worker_id, classifier, tasks, sinks, metrics).await
            }));
        }
        drop(sinks);

        let mut stats = WorkerPoolStats::default();
        for result in futures::future::join_all(handles).await {
            stats.merge(result?);
        }

        tracing::info!(
            "Worker pool drained: {} succeeded, {} failed",
            stats.succeeded,
            stats.failed
        );
        Ok(stats)
    }
}

async fn intake_loop(
    worker_id: usize,
    classifier: Classifier,
    tasks: async_channel::Receiver<Task>,
    sinks: OutcomeSinks,
    metrics: Arc<Metrics>,
) -> WorkerPoolStats {
    let mut stats = WorkerPoolStats::default();
    let mut dispatches = JoinSet::new();

    while let Ok(task) = tasks.recv().await {
        let processed = classifier.classify(task);

        match processed.outcome() {
            Outcome::Success => {
                stats.succeeded += 1;
                metrics.add_task_succeeded();
            }
            Outcome::Failure => {
                stats.failed += 1;
                metrics.add_task_failed();
            }
        }

        let outcome = processed.outcome();
        let sink = sinks.for_outcome(outcome).clone();
        let metrics = metrics.clone();
        dispatches.spawn(async move {
            let id = processed.id();
            if sink.send(processed).await.is_err() {
                tracing::warn!("{} sink closed before task {} could be dispatched", outcome, id);
                metrics.add_dispatch_failure();
            }
        });

        // Reap finished dispatches so the set tracks only in-flight ones
        while let Some(result) = dispatches.try_join_next() {
            log_dispatch_panic(result);
        }
    }

    tracing::debug!(
        "Worker {} input closed, waiting on {} dispatches",
        worker_id,
        dispatches.len()
    );

    while let Some(result) = dispatches.join_next().await {
        log_dispatch_panic(result);
    }

    stats
}

fn log_dispatch_panic(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::warn!("Dispatch task failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn sinks(
        capacity: usize,
    ) -> (
        OutcomeSinks,
        mpsc::Receiver<ProcessedTask>,
        mpsc::Receiver<ProcessedTask>,
    ) {
        let (success, success_rx) = mpsc::channel(capacity);
        let (failure, failure_rx) = mpsc::channel(capacity);
        (OutcomeSinks { success, failure }, success_rx, failure_rx)
    }

    async fn drain(mut rx: mpsc::Receiver<ProcessedTask>) -> Vec<ProcessedTask> {
        let mut out = Vec::new();
        while let Some(task) = rx.recv().await {
            out.push(task);
        }
        out
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_routes_by_outcome_and_closes_sinks() {
        let metrics = Metrics::new();
        let (tx, rx) = async_channel::bounded(4);
        let (sinks, success_rx, failure_rx) = sinks(2);
        let pool = WorkerPool::new(Classifier::new(Duration::from_secs(20)), 3, metrics.clone());

        let pool_handle = tokio::spawn(pool.run(rx, sinks));
        let success_handle = tokio::spawn(drain(success_rx));
        let failure_handle = tokio::spawn(drain(failure_rx));

        for id in 1..=100u64 {
            let task = if id % 3 == 0 {
                Task::malformed(id)
            } else {
                Task::new(id, Utc::now())
            };
            tx.send(task).await.unwrap();
        }
        drop(tx);

        let stats = pool_handle.await.unwrap().unwrap();
        let succeeded = success_handle.await.unwrap();
        let failed = failure_handle.await.unwrap();

        assert_eq!(stats.total(), 100);
        assert_eq!(stats.failed, 33);
        assert_eq!(succeeded.len() as u64, stats.succeeded);
        assert_eq!(failed.len() as u64, stats.failed);
        assert!(failed.iter().all(|t| t.id() % 3 == 0 && t.outcome() == Outcome::Failure));
        assert!(succeeded.iter().all(|t| t.detail().contains("success")));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_succeeded, stats.succeeded);
        assert_eq!(snapshot.tasks_failed, stats.failed);
        assert_eq!(snapshot.dispatch_failures, 0);
    }

    #[tokio::test]
    async fn test_pool_waits_for_in_flight_dispatches() {
        // Sink capacity 1 with a slow reader keeps dispatches in flight after
        // the input closes; nothing may be lost when the sinks close.
        let metrics = Metrics::new();
        let (tx, rx) = async_channel::bounded(64);
        let (sinks, mut success_rx, failure_rx) = sinks(1);
        let pool = WorkerPool::new(Classifier::new(Duration::from_secs(20)), 1, metrics);

        for id in 1..=20u64 {
            tx.send(Task::new(id, Utc::now())).await.unwrap();
        }
        drop(tx);

        let pool_handle = tokio::spawn(pool.run(rx, sinks));
        let failure_handle = tokio::spawn(drain(failure_rx));

        let mut ids = Vec::new();
        while let Some(task) = success_rx.recv().await {
            ids.push(task.id());
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let stats = pool_handle.await.unwrap().unwrap();
        assert_eq!(stats.succeeded, 20);
        assert!(failure_handle.await.unwrap().is_empty());

        ids.sort_unstable();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_stale_task_routes_to_failure_once() {
        let metrics = Metrics::new();
        let (tx, rx) = async_channel::bounded(1);
        let (sinks, success_rx, failure_rx) = sinks(1);
        let pool = WorkerPool::new(Classifier::new(Duration::from_secs(20)), 2, metrics);

        tx.send(Task::new(1, Utc::now() - chrono::Duration::seconds(30)))
            .await
            .unwrap();
        drop(tx);

        let stats = pool.run(rx, sinks).await.unwrap();
        assert_eq!(stats, WorkerPoolStats { succeeded: 0, failed: 1 });

        assert!(drain(success_rx).await.is_empty());
        let failed = drain(failure_rx).await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id(), 1);
    }

    #[tokio::test]
    async fn test_closed_sink_counts_dispatch_failure() {
        let metrics = Metrics::new();
        let (tx, rx) = async_channel::bounded(1);
        let (sinks, success_rx, failure_rx) = sinks(1);
        let pool = WorkerPool::new(Classifier::new(Duration::from_secs(20)), 1, metrics.clone());
        drop(success_rx);

        tx.send(Task::new(1, Utc::now())).await.unwrap();
        drop(tx);

        // Classification still counts; the lost delivery shows up as a dispatch failure
        let stats = pool.run(rx, sinks).await.unwrap();
        assert_eq!(stats, WorkerPoolStats { succeeded: 1, failed: 0 });
        assert!(drain(failure_rx).await.is_empty());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_succeeded, 1);
        assert_eq!(snapshot.dispatch_failures, 1);
    }
}
