//! Scheduling strategies and the concurrent dispatch harness.
//!
//! A strategy maps a batch of tasks onto the VM pool under the synthetic cost
//! model; the executor then runs the resulting assignment against the real
//! endpoints, serializing per VM and measuring actual elapsed time.

pub mod endpoint;
pub mod executor;
pub mod strategies;


pub use endpoint::{AttemptOutcome, HttpTaskEndpoint, TaskEndpoint};
pub use executor::{BatchExecution, DispatchExecutor};
pub use strategies::{create_strategy, SchedulingStrategy, StrategyOptions};
