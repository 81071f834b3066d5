//! Task model shared by every pipeline stage.
//!
//! A [`Task`] is what the generator emits. Classification consumes it and
//! produces a [`ProcessedTask`], so the outcome and finish time can only be
//! attached once and never changed afterwards.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// Creation stamp carried by tasks born malformed.
pub const MALFORMED_STAMP: &str = "Some error occured";

/// Detail attached to successfully classified tasks.
pub const SUCCESS_DETAIL: &str = "task has been successed";

/// Detail attached to failed tasks.
pub const FAILURE_DETAIL: &str = "something went wrong";

/// Unclassified unit of synthetic work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Identifier, strictly increasing within a generator run
    pub id: u64,

    /// RFC 3339 creation time, or [`MALFORMED_STAMP`]
    pub created_at: String,
}

impl Task {
    /// Create a task stamped with the given creation time.
    pub fn new(id: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Create a task carrying the malformed creation stamp.
    pub fn malformed(id: u64) -> Self {
        Self {
            id,
            created_at: MALFORMED_STAMP.to_string(),
        }
    }

    /// Parse the creation stamp.
    ///
    /// Returns `None` for anything that is not valid RFC 3339, including the
    /// malformed sentinel.
    pub fn parsed_created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// Human-readable detail recorded for this outcome.
    pub fn detail(self) -> &'static str {
        match self {
            Outcome::Success => SUCCESS_DETAIL,
            Outcome::Failure => FAILURE_DETAIL,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
        }
    }
}

/// A task after classification.
///
/// Fields are private so only the classifier can build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedTask {
    task: Task,
    finished_at: DateTime<Utc>,
    outcome: Outcome,
}

impl ProcessedTask {
    pub(crate) fn new(task: Task, outcome: Outcome, finished_at: DateTime<Utc>) -> Self {
        Self {
            task,
            finished_at,
            outcome,
        }
    }

    pub fn id(&self) -> u64 {
        self.task.id
    }

    pub fn created_at(&self) -> &str {
        &self.task.created_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn detail(&self) -> &'static str {
        self.outcome.detail()
    }
}

impl fmt::Display for ProcessedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id: {}, Start: {}, Finish: {}, Result: {}",
            self.task.id,
            self.task.created_at,
            self.finished_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.detail()
        )
    }
}
