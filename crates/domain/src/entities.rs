use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vmsched_core::config::ResourceConfig;

use crate::cost;

/// A worker VM with a fixed core capacity. Immutable once constructed; the
/// pool is built from config at startup and shared read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmResource {
    pub name: String,
    pub ip_address: String,
    pub cpu_cores: u32,
}

impl VmResource {
    pub fn new(name: String, ip_address: String, cpu_cores: u32) -> Self {
        Self {
            name,
            ip_address,
            cpu_cores,
        }
    }

    pub fn task_url(&self, port: u16, task_index: u32) -> String {
        format!("http://{}:{}/task/{}", self.ip_address, port, task_index)
    }
}

impl From<ResourceConfig> for VmResource {
    fn from(config: ResourceConfig) -> Self {
        Self {
            name: config.name,
            ip_address: config.ip_address,
            cpu_cores: config.cpu_cores,
        }
    }
}

/// A unit of work with a synthetic load derived from its dataset index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub index: u32,
    pub cpu_load: u64,
}

impl Task {
    pub fn new(id: i64, index: u32) -> Self {
        Self {
            id,
            name: format!("task-{index}-{id}"),
            index,
            cpu_load: cost::task_load(index),
        }
    }
}

/// Task id → VM name, produced once per (strategy, batch) pair.
pub type Assignment = HashMap<i64, String>;

/// Outcome of one dispatched task. `exec_time == 0.0` marks failure;
/// `wait_time` is the time spent queued on the VM's admission gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub task_id: i64,
    pub vm_name: String,
    pub exec_time: f64,
    pub wait_time: f64,
}

impl ExecutionRecord {
    pub fn is_success(&self) -> bool {
        self.exec_time > 0.0
    }
}

/// Aggregate statistics for one (dataset, algorithm, run) batch. Derived once
/// by the metrics aggregator, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMetrics {
    pub run_id: u32,
    pub dataset: String,
    pub algorithm: String,
    pub makespan: f64,
    pub throughput: f64,
    pub resource_utilization: f64,
    pub imbalance_degree: f64,
    pub total_tasks_success: usize,
    pub total_cpu_time: f64,
    pub total_wait_time: f64,
    pub avg_start_time: f64,
    pub avg_execution_time: f64,
    pub avg_finish_time: f64,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_derives_load_from_index() {
        let task = Task::new(7, 3);
        assert_eq!(task.cpu_load, 90_000);
        assert_eq!(task.name, "task-3-7");
    }

    #[test]
    fn test_vm_task_url() {
        let vm = VmResource::new("vm1".to_string(), "10.0.0.11".to_string(), 4);
        assert_eq!(vm.task_url(5000, 12), "http://10.0.0.11:5000/task/12");
    }

    #[test]
    fn test_execution_record_success_sentinel() {
        let failed = ExecutionRecord {
            task_id: 1,
            vm_name: "vm1".to_string(),
            exec_time: 0.0,
            wait_time: 1.5,
        };
        assert!(!failed.is_success());

        let ok = ExecutionRecord {
            exec_time: 0.01,
            ..failed
        };
        assert!(ok.is_success());
    }
}
