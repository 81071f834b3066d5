//! Report emitters: where flushed batches end up.

use crate::task::ProcessedTask;
use anyhow::Result;
use std::io::Write;
use std::sync::Mutex;

/// Sink for labeled batches of processed tasks.
pub trait ReportEmitter: Send + Sync {
    /// Emit one batch. An empty batch still produces its label.
    fn emit(&self, label: &str, tasks: &[ProcessedTask]) -> Result<()>;
}

/// Render a batch the way it is printed:
///
/// ```text
/// <Label>:
/// Id: <id>, Start: <created>, Finish: <finished>, Result: <detail>
/// ```
pub fn render_batch(label: &str, tasks: &[ProcessedTask]) -> String {
    let mut text = String::with_capacity(label.len() + 2 + tasks.len() * 96);
    text.push_str(label);
    text.push_str(":\n");
    for task in tasks {
        text.push_str(&task.to_string());
        text.push('\n');
    }
    text
}

/// Writes batches to standard output.
///
/// Each batch goes out in a single locked write so batches from different
/// aggregators never interleave.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutEmitter;

impl ReportEmitter for StdoutEmitter {
    fn emit(&self, label: &str, tasks: &[ProcessedTask]) -> Result<()> {
        let text = render_batch(label, tasks);
        let mut out = std::io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// A batch captured by [`MemoryEmitter`].
#[derive(Debug, Clone)]
pub struct EmittedBatch {
    pub label: String,
    pub tasks: Vec<ProcessedTask>,
}

/// Keeps every emitted batch in memory.
#[derive(Debug, Default)]
pub struct MemoryEmitter {
    batches: Mutex<Vec<EmittedBatch>>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All batches emitted so far, in emission order.
    pub fn batches(&self) -> Vec<EmittedBatch> {
        self.batches.lock().map(|b| b.to_vec()).unwrap_or_default()
    }

    /// Batches emitted under one label.
    pub fn batches_for(&self, label: &str) -> Vec<EmittedBatch> {
        self.batches()
            .into_iter()
            .filter(|b| b.label == label)
            .collect()
    }

    /// Ids of every task emitted under one label, across all its batches.
    pub fn ids_for(&self, label: &str) -> Vec<u64> {
        self.batches_for(label)
            .iter()
            .flat_map(|b| b.tasks.iter().map(ProcessedTask::id))
            .collect()
    }
}

impl ReportEmitter for MemoryEmitter {
    fn emit(&self, label: &str, tasks: &[ProcessedTask]) -> Result<()> {
        let mut batches = self
            .batches
            .lock()
            .map_err(|_| anyhow::anyhow!("memory emitter lock poisoned"))?;
        batches.push(EmittedBatch {
            label: label.to_string(),
            tasks: tasks.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Outcome, Task};
    use chrono::{TimeZone, Utc};

    fn processed(id: u64) -> ProcessedTask {
        let finished = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ProcessedTask::new(Task::malformed(id), Outcome::Failure, finished)
    }

    #[test]
    fn test_render_empty_batch_is_label_only() {
        assert_eq!(render_batch("Errors", &[]), "Errors:\n");
    }

    #[test]
    fn test_render_batch_one_line_per_task() {
        let text = render_batch("Errors", &[processed(1), processed(2)]);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Errors:");
        assert!(lines[1].starts_with("Id: 1, Start: Some error occured"));
        assert!(lines[2].starts_with("Id: 2, "));
    }

    #[test]
    fn test_memory_emitter_records_batches() {
        let emitter = MemoryEmitter::new();
        emitter.emit("Errors", &[processed(1)]).unwrap();
        emitter.emit("Done Tasks", &[]).unwrap();
        emitter.emit("Errors", &[processed(2), processed(3)]).unwrap();

        assert_eq!(emitter.batches().len(), 3);
        assert_eq!(emitter.batches_for("Done Tasks").len(), 1);
        assert_eq!(emitter.ids_for("Errors"), vec![1, 2, 3]);
    }
}
