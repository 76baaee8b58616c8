use std::collections::HashMap;

use chrono::Utc;

use crate::entities::{BatchMetrics, ExecutionRecord, VmResource};

/// Reduces the execution records of one batch into its aggregate statistics.
///
/// `total_time` is the measured wall-clock time of the whole batch and is
/// taken as the makespan directly rather than recomputed from records. A
/// batch with zero successful records still yields a well-formed metrics row
/// with every derived field at zero.
pub fn summarize_batch(
    run_id: u32,
    dataset: &str,
    algorithm: &str,
    records: &[ExecutionRecord],
    vms: &[VmResource],
    total_time: f64,
) -> BatchMetrics {
    let successes: Vec<&ExecutionRecord> = records.iter().filter(|r| r.is_success()).collect();

    if successes.is_empty() {
        return BatchMetrics {
            run_id,
            dataset: dataset.to_string(),
            algorithm: algorithm.to_string(),
            makespan: 0.0,
            throughput: 0.0,
            resource_utilization: 0.0,
            imbalance_degree: 0.0,
            total_tasks_success: 0,
            total_cpu_time: 0.0,
            total_wait_time: 0.0,
            avg_start_time: 0.0,
            avg_execution_time: 0.0,
            avg_finish_time: 0.0,
            recorded_at: Utc::now(),
        };
    }

    let makespan = total_time;
    let success_count = successes.len();
    let throughput = if makespan > 0.0 {
        success_count as f64 / makespan
    } else {
        0.0
    };

    let total_cpu_time: f64 = successes.iter().map(|r| r.exec_time).sum();
    let total_wait_time: f64 = successes.iter().map(|r| r.wait_time).sum();
    let avg_start_time = total_wait_time / success_count as f64;
    let avg_execution_time = total_cpu_time / success_count as f64;
    let avg_finish_time = successes
        .iter()
        .map(|r| r.wait_time + r.exec_time)
        .sum::<f64>()
        / success_count as f64;

    let total_cores: u32 = vms.iter().map(|vm| vm.cpu_cores).sum();
    let resource_utilization = if makespan > 0.0 && total_cores > 0 {
        (total_cpu_time / (makespan * total_cores as f64)) * 100.0
    } else {
        0.0
    };

    let mut vm_loads: HashMap<&str, f64> = HashMap::new();
    for record in &successes {
        *vm_loads.entry(record.vm_name.as_str()).or_insert(0.0) += record.exec_time;
    }
    let imbalance_degree = if vm_loads.is_empty() {
        0.0
    } else {
        let max = vm_loads.values().cloned().fold(f64::MIN, f64::max);
        let min = vm_loads.values().cloned().fold(f64::MAX, f64::min);
        let mean = vm_loads.values().sum::<f64>() / vm_loads.len() as f64;
        if mean > 0.0 {
            (max - min) / mean
        } else {
            0.0
        }
    };

    BatchMetrics {
        run_id,
        dataset: dataset.to_string(),
        algorithm: algorithm.to_string(),
        makespan,
        throughput,
        resource_utilization,
        imbalance_degree,
        total_tasks_success: success_count,
        total_cpu_time,
        total_wait_time,
        avg_start_time,
        avg_execution_time,
        avg_finish_time,
        recorded_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(name: &str, cores: u32) -> VmResource {
        VmResource::new(name.to_string(), "127.0.0.1".to_string(), cores)
    }

    fn record(task_id: i64, vm_name: &str, exec: f64, wait: f64) -> ExecutionRecord {
        ExecutionRecord {
            task_id,
            vm_name: vm_name.to_string(),
            exec_time: exec,
            wait_time: wait,
        }
    }

    #[test]
    fn test_zero_records_yield_all_zero_metrics() {
        let vms = vec![vm("vm1", 4)];
        let metrics = summarize_batch(1, "ds", "round_robin", &[], &vms, 10.0);
        assert_eq!(metrics.total_tasks_success, 0);
        assert_eq!(metrics.makespan, 0.0);
        assert_eq!(metrics.throughput, 0.0);
        assert_eq!(metrics.resource_utilization, 0.0);
        assert_eq!(metrics.imbalance_degree, 0.0);
        assert_eq!(metrics.avg_finish_time, 0.0);
    }

    #[test]
    fn test_all_failures_yield_all_zero_metrics() {
        let vms = vec![vm("vm1", 4)];
        let records = vec![record(0, "vm1", 0.0, 1.0), record(1, "vm1", 0.0, 2.0)];
        let metrics = summarize_batch(1, "ds", "round_robin", &records, &vms, 10.0);
        assert_eq!(metrics.total_tasks_success, 0);
        assert_eq!(metrics.total_cpu_time, 0.0);
        assert_eq!(metrics.resource_utilization, 0.0);
    }

    #[test]
    fn test_single_success_utilization() {
        // One record with exec 5 and wait 1 on a 4-core pool over a 10 s
        // batch: utilization = (5 / (10 * 4)) * 100 = 12.5.
        let vms = vec![vm("vm1", 1), vm("vm2", 3)];
        let records = vec![record(0, "vm1", 5.0, 1.0)];
        let metrics = summarize_batch(3, "ds", "least_loaded", &records, &vms, 10.0);

        assert_eq!(metrics.makespan, 10.0);
        assert_eq!(metrics.total_tasks_success, 1);
        assert_eq!(metrics.throughput, 0.1);
        assert_eq!(metrics.resource_utilization, 12.5);
        assert_eq!(metrics.avg_start_time, 1.0);
        assert_eq!(metrics.avg_execution_time, 5.0);
        assert_eq!(metrics.avg_finish_time, 6.0);
        // A single loaded VM has no spread.
        assert_eq!(metrics.imbalance_degree, 0.0);
    }

    #[test]
    fn test_imbalance_degree_spread() {
        let vms = vec![vm("vm1", 1), vm("vm2", 1)];
        let records = vec![
            record(0, "vm1", 6.0, 0.0),
            record(1, "vm2", 2.0, 0.0),
        ];
        let metrics = summarize_batch(1, "ds", "round_robin", &records, &vms, 8.0);
        // loads: vm1 = 6, vm2 = 2 → (6 - 2) / 4 = 1.0
        assert!((metrics.imbalance_degree - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_failures_excluded_from_aggregates() {
        let vms = vec![vm("vm1", 2)];
        let records = vec![
            record(0, "vm1", 4.0, 1.0),
            record(1, "vm1", 0.0, 9.0),
        ];
        let metrics = summarize_batch(1, "ds", "top_k_greedy", &records, &vms, 10.0);
        assert_eq!(metrics.total_tasks_success, 1);
        assert_eq!(metrics.total_cpu_time, 4.0);
        // The failed record's wait time must not leak into the totals.
        assert_eq!(metrics.total_wait_time, 1.0);
    }
}
