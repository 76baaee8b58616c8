pub mod cost;
pub mod entities;
pub mod metrics;

pub use entities::{Assignment, BatchMetrics, ExecutionRecord, Task, VmResource};
pub use metrics::summarize_batch;
