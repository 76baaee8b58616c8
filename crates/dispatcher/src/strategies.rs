use std::cmp::Ordering;
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use vmsched_core::{SchedulerError, SchedulerResult};
use vmsched_domain::cost;
use vmsched_domain::entities::{Assignment, Task, VmResource};

/// A scheduling strategy maps a full batch of tasks onto the VM pool.
///
/// Strategies are synchronous and single-threaded; the only state they carry
/// is their own (the round-robin cursor, an injected RNG), which is why
/// `assign` takes `&mut self`. An instance must not be shared across threads
/// without external synchronization.
pub trait SchedulingStrategy: Send {
    fn name(&self) -> &'static str;

    fn assign(&mut self, tasks: &[Task], vms: &[VmResource]) -> SchedulerResult<Assignment>;
}

/// Tuning knobs for the randomized strategies.
#[derive(Debug, Clone)]
pub struct StrategyOptions {
    pub hill_climbing_iterations: usize,
    pub top_k: usize,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            hill_climbing_iterations: 500,
            top_k: 2,
        }
    }
}

/// Resolves an algorithm name to a fresh strategy instance.
///
/// An unknown name is an error isolated to the batch attempt that asked for
/// it; it never aborts the surrounding experiment loop.
pub fn create_strategy(
    name: &str,
    options: &StrategyOptions,
) -> SchedulerResult<Box<dyn SchedulingStrategy>> {
    match name {
        "round_robin" => Ok(Box::new(RoundRobinStrategy::new())),
        "cyclic_fill" => Ok(Box::new(CyclicFillStrategy)),
        "least_loaded" => Ok(Box::new(LeastLoadedStrategy)),
        "hill_climbing" => Ok(Box::new(HillClimbingStrategy::new(
            options.hill_climbing_iterations,
        ))),
        "top_k_greedy" => Ok(Box::new(TopKGreedyStrategy::new(options.top_k))),
        other => Err(SchedulerError::UnknownStrategy(other.to_string())),
    }
}

/// Round-robin with a cursor that persists across calls on the same instance.
///
/// Deliberately a field and not a process-wide counter, so parallel
/// experiments with independent instances cannot interfere.
pub struct RoundRobinStrategy {
    cursor: usize,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }
}

impl Default for RoundRobinStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingStrategy for RoundRobinStrategy {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn assign(&mut self, tasks: &[Task], vms: &[VmResource]) -> SchedulerResult<Assignment> {
        if vms.is_empty() {
            return Err(SchedulerError::EmptyResourcePool);
        }
        let mut assignment = Assignment::with_capacity(tasks.len());
        for task in tasks {
            let vm = &vms[self.cursor % vms.len()];
            assignment.insert(task.id, vm.name.clone());
            self.cursor = (self.cursor + 1) % vms.len();
        }
        debug!(
            strategy = self.name(),
            tasks = tasks.len(),
            cursor = self.cursor,
            "assignment complete"
        );
        Ok(assignment)
    }
}

/// Stateless cyclic fill: task i goes to VM `i mod N` in input order, with no
/// memory between batches. Kept separate from [`RoundRobinStrategy`] on
/// purpose: the continuity of the cursor is the only difference, and the two
/// are reported as distinct algorithms.
pub struct CyclicFillStrategy;

impl SchedulingStrategy for CyclicFillStrategy {
    fn name(&self) -> &'static str {
        "cyclic_fill"
    }

    fn assign(&mut self, tasks: &[Task], vms: &[VmResource]) -> SchedulerResult<Assignment> {
        if vms.is_empty() {
            return Err(SchedulerError::EmptyResourcePool);
        }
        let mut assignment = Assignment::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            assignment.insert(task.id, vms[i % vms.len()].name.clone());
        }
        Ok(assignment)
    }
}

/// Greedy load balancing: each task in input order goes to the VM that would
/// finish it earliest given the load accumulated so far, ties to the lowest
/// VM index.
pub struct LeastLoadedStrategy;

impl SchedulingStrategy for LeastLoadedStrategy {
    fn name(&self) -> &'static str {
        "least_loaded"
    }

    fn assign(&mut self, tasks: &[Task], vms: &[VmResource]) -> SchedulerResult<Assignment> {
        if vms.is_empty() {
            return Err(SchedulerError::EmptyResourcePool);
        }
        let mut loads = vec![0.0_f64; vms.len()];
        let mut assignment = Assignment::with_capacity(tasks.len());

        for task in tasks {
            let estimates: Vec<f64> = vms
                .iter()
                .map(|vm| cost::estimate_execution_time(task.cpu_load, vm.cpu_cores))
                .collect();

            let mut best = 0;
            let mut best_potential = loads[0] + estimates[0];
            for i in 1..vms.len() {
                let potential = loads[i] + estimates[i];
                // strict < keeps the lowest index on ties
                if potential < best_potential {
                    best = i;
                    best_potential = potential;
                }
            }

            assignment.insert(task.id, vms[best].name.clone());
            loads[best] += estimates[best];
        }
        Ok(assignment)
    }
}

/// Stochastic hill climbing over full assignments: start from a uniformly
/// random assignment, then repeatedly move one random task to one random VM
/// and keep the move only when it strictly lowers the estimated makespan.
pub struct HillClimbingStrategy<R: Rng = StdRng> {
    iterations: usize,
    rng: R,
}

impl HillClimbingStrategy<StdRng> {
    pub fn new(iterations: usize) -> Self {
        Self::with_rng(iterations, StdRng::from_os_rng())
    }
}

impl<R: Rng> HillClimbingStrategy<R> {
    /// Injectable RNG so tests can replay exact decision sequences.
    pub fn with_rng(iterations: usize, rng: R) -> Self {
        Self { iterations, rng }
    }
}

impl<R: Rng + Send> SchedulingStrategy for HillClimbingStrategy<R> {
    fn name(&self) -> &'static str {
        "hill_climbing"
    }

    fn assign(&mut self, tasks: &[Task], vms: &[VmResource]) -> SchedulerResult<Assignment> {
        if vms.is_empty() {
            return Err(SchedulerError::EmptyResourcePool);
        }
        if tasks.is_empty() {
            return Ok(Assignment::new());
        }

        let mut current: Assignment = tasks
            .iter()
            .map(|task| {
                let vm = &vms[self.rng.random_range(0..vms.len())];
                (task.id, vm.name.clone())
            })
            .collect();
        let mut current_makespan = estimated_makespan(&current, tasks, vms);

        for _ in 0..self.iterations {
            let task = &tasks[self.rng.random_range(0..tasks.len())];
            let vm = &vms[self.rng.random_range(0..vms.len())];

            let mut neighbor = current.clone();
            neighbor.insert(task.id, vm.name.clone());

            let neighbor_makespan = estimated_makespan(&neighbor, tasks, vms);
            if neighbor_makespan < current_makespan {
                current = neighbor;
                current_makespan = neighbor_makespan;
            }
        }

        debug!(
            strategy = self.name(),
            makespan = current_makespan,
            "search finished"
        );
        Ok(current)
    }
}

/// Largest tasks first; each is placed on a uniformly random pick among the
/// `k` VMs with the lowest potential post-assignment load.
pub struct TopKGreedyStrategy<R: Rng = StdRng> {
    k: usize,
    rng: R,
}

impl TopKGreedyStrategy<StdRng> {
    pub fn new(k: usize) -> Self {
        Self::with_rng(k, StdRng::from_os_rng())
    }
}

impl<R: Rng> TopKGreedyStrategy<R> {
    pub fn with_rng(k: usize, rng: R) -> Self {
        Self { k, rng }
    }
}

impl<R: Rng + Send> SchedulingStrategy for TopKGreedyStrategy<R> {
    fn name(&self) -> &'static str {
        "top_k_greedy"
    }

    fn assign(&mut self, tasks: &[Task], vms: &[VmResource]) -> SchedulerResult<Assignment> {
        if vms.is_empty() {
            return Err(SchedulerError::EmptyResourcePool);
        }

        let mut ordered: Vec<&Task> = tasks.iter().collect();
        ordered.sort_by(|a, b| b.cpu_load.cmp(&a.cpu_load));

        let mut loads = vec![0.0_f64; vms.len()];
        let mut assignment = Assignment::with_capacity(tasks.len());

        for task in ordered {
            let estimates: Vec<f64> = vms
                .iter()
                .map(|vm| cost::estimate_execution_time(task.cpu_load, vm.cpu_cores))
                .collect();

            let mut ranked: Vec<usize> = (0..vms.len()).collect();
            ranked.sort_by(|&a, &b| {
                (loads[a] + estimates[a])
                    .partial_cmp(&(loads[b] + estimates[b]))
                    .unwrap_or(Ordering::Equal)
            });

            let choices = &ranked[..self.k.clamp(1, vms.len())];
            let chosen = choices[self.rng.random_range(0..choices.len())];

            assignment.insert(task.id, vms[chosen].name.clone());
            loads[chosen] += estimates[chosen];
        }
        Ok(assignment)
    }
}

/// Estimated makespan of an assignment: the largest per-VM sum of estimated
/// execution times. Entries naming an unknown VM or task are skipped rather
/// than failing the computation.
pub fn estimated_makespan(assignment: &Assignment, tasks: &[Task], vms: &[VmResource]) -> f64 {
    let tasks_by_id: HashMap<i64, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
    let vm_index: HashMap<&str, usize> = vms
        .iter()
        .enumerate()
        .map(|(i, vm)| (vm.name.as_str(), i))
        .collect();

    let mut vm_loads = vec![0.0_f64; vms.len()];
    for (task_id, vm_name) in assignment {
        let (Some(task), Some(&i)) = (tasks_by_id.get(task_id), vm_index.get(vm_name.as_str()))
        else {
            continue;
        };
        vm_loads[i] += cost::estimate_execution_time(task.cpu_load, vms[i].cpu_cores);
    }
    vm_loads.into_iter().fold(0.0, f64::max)
}
