//! Timestamp-based task classification.

use crate::task::{Outcome, ProcessedTask, Task};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Classifies tasks by the age of their creation stamp.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    recency_window: chrono::Duration,
}

impl Classifier {
    pub fn new(recency_window: Duration) -> Self {
        Self {
            recency_window: chrono::Duration::from_std(recency_window)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Outcome for a task evaluated at `now`.
    ///
    /// Success requires a parseable stamp strictly newer than
    /// `now - recency_window`. A stamp that does not parse counts as
    /// infinitely old.
    pub fn outcome_at(&self, task: &Task, now: DateTime<Utc>) -> Outcome {
        let cutoff = now
            .checked_sub_signed(self.recency_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        match task.parsed_created_at() {
            Some(created) if created > cutoff => Outcome::Success,
            _ => Outcome::Failure,
        }
    }

    /// Classify `task` against the current time and stamp its finish time.
    pub fn classify(&self, task: Task) -> ProcessedTask {
        let outcome = self.outcome_at(&task, Utc::now());
        ProcessedTask::new(task, outcome, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(Duration::from_secs(20))
    }

    #[test]
    fn test_fresh_task_succeeds() {
        let now = Utc::now();
        let task = Task::new(1, now);
        assert_eq!(classifier().outcome_at(&task, now), Outcome::Success);
    }

    #[test]
    fn test_malformed_task_fails() {
        let task = Task::malformed(1);
        assert_eq!(classifier().outcome_at(&task, Utc::now()), Outcome::Failure);
    }

    #[test]
    fn test_stale_task_fails() {
        let now = Utc::now();
        let task = Task::new(1, now - chrono::Duration::seconds(30));
        assert_eq!(classifier().outcome_at(&task, now), Outcome::Failure);
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let now = chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:20Z")
            .unwrap()
            .with_timezone(&Utc);
        let at_cutoff = Task::new(1, now - chrono::Duration::seconds(20));
        let inside = Task::new(2, now - chrono::Duration::seconds(19));

        assert_eq!(classifier().outcome_at(&at_cutoff, now), Outcome::Failure);
        assert_eq!(classifier().outcome_at(&inside, now), Outcome::Success);
    }

    #[test]
    fn test_classify_sets_detail_and_finish() {
        let before = Utc::now();
        let processed = classifier().classify(Task::new(9, Utc::now()));

        assert_eq!(processed.id(), 9);
        assert_eq!(processed.outcome(), Outcome::Success);
        assert!(processed.detail().contains("success"));
        // Creation stamps are truncated to whole seconds, finish stamps are not
        assert!(processed.finished_at() >= before);

        let processed = classifier().classify(Task::malformed(10));
        assert_eq!(processed.outcome(), Outcome::Failure);
        assert!(!processed.detail().contains("success"));
    }
}
