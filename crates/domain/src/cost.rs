//! Synthetic cost model shared by every load-aware scheduling strategy.
//!
//! The dispatch harness never consults these estimates; it measures real
//! elapsed time instead.

/// Multiplier applied to the squared task index.
pub const LOAD_SCALE_FACTOR: u64 = 10_000;

/// Unit execution time for one load unit on a single core, in seconds.
pub const BASE_EXECUTION_TIME: f64 = 1.0;

/// Synthetic load of a task, quadratic in its dataset index.
pub fn task_load(index: u32) -> u64 {
    (index as u64).pow(2) * LOAD_SCALE_FACTOR
}

/// Estimated execution time of `load` on a VM with `cpu_cores` cores.
///
/// Callers must guarantee `cpu_cores > 0`; config validation rejects
/// zero-core resources before any strategy runs.
pub fn estimate_execution_time(load: u64, cpu_cores: u32) -> f64 {
    (load as f64 / LOAD_SCALE_FACTOR as f64) * (BASE_EXECUTION_TIME / cpu_cores as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_load_is_quadratic() {
        assert_eq!(task_load(0), 0);
        assert_eq!(task_load(1), 10_000);
        assert_eq!(task_load(3), 90_000);
        assert_eq!(task_load(10), 1_000_000);
    }

    #[test]
    fn test_task_load_monotonic_in_index() {
        let loads: Vec<u64> = (0..50).map(task_load).collect();
        assert!(loads.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_estimate_decreases_with_capacity() {
        let load = task_load(4);
        let t1 = estimate_execution_time(load, 1);
        let t2 = estimate_execution_time(load, 2);
        let t8 = estimate_execution_time(load, 8);
        assert!(t1 > t2);
        assert!(t2 > t8);
        assert_eq!(t1, 16.0);
        assert_eq!(t8, 2.0);
    }
}
