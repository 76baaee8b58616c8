pub mod dataset;
pub mod report;

pub use dataset::load_tasks;
pub use report::CsvReportSink;
