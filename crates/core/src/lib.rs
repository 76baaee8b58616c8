pub mod config;
pub mod errors;

pub use config::{AppConfig, DispatchConfig, ExperimentConfig, ResourceConfig};
pub use errors::{SchedulerError, SchedulerResult};
