//! Report output.

mod report;

pub use report::{render_batch, EmittedBatch, MemoryEmitter, ReportEmitter, StdoutEmitter};
