use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use vmsched_core::config::DispatchConfig;
use vmsched_domain::entities::{Assignment, ExecutionRecord, Task, VmResource};

use crate::endpoint::{AttemptOutcome, HttpTaskEndpoint, TaskEndpoint};

/// Result of executing one assignment: the per-task records plus the measured
/// wall-clock time of the whole batch.
#[derive(Debug)]
pub struct BatchExecution {
    pub records: Vec<ExecutionRecord>,
    pub total_time: f64,
}

/// Lifecycle of one dispatched task. The admission gate bounds `Waiting`;
/// attempts and their throttle backoff happen inside the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskPhase {
    Waiting,
    Admitted,
    Attempting(u32),
    Succeeded,
    FailedTerminal,
}

/// Executes assignments concurrently: one tokio task per assigned task, one
/// capacity-1 admission gate per VM, bounded attempts with a linear throttle
/// before each one.
pub struct DispatchExecutor {
    endpoint: Arc<dyn TaskEndpoint>,
    max_attempts: u32,
    backoff_step: Duration,
}

impl DispatchExecutor {
    pub fn new(endpoint: Arc<dyn TaskEndpoint>, max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            endpoint,
            max_attempts,
            backoff_step,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(
            Arc::new(HttpTaskEndpoint::new(
                config.vm_port,
                Duration::from_secs(config.request_timeout_seconds),
            )),
            config.max_attempts,
            Duration::from_millis(config.backoff_step_ms),
        )
    }

    /// Dispatches every entry of `assignment` and waits for all of them to
    /// reach a terminal state. Entries referencing a task or VM not present
    /// in the batch are skipped without a record; they must not take the
    /// whole batch down.
    pub async fn execute(
        &self,
        assignment: &Assignment,
        tasks: &[Task],
        vms: &[VmResource],
    ) -> BatchExecution {
        let tasks_by_id: HashMap<i64, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
        let vms_by_name: HashMap<&str, &VmResource> =
            vms.iter().map(|vm| (vm.name.as_str(), vm)).collect();
        let gates: HashMap<String, Arc<Semaphore>> = vms
            .iter()
            .map(|vm| (vm.name.clone(), Arc::new(Semaphore::new(1))))
            .collect();

        let records: Arc<Mutex<Vec<ExecutionRecord>>> =
            Arc::new(Mutex::new(Vec::with_capacity(assignment.len())));
        let mut join_set = JoinSet::new();
        let started = Instant::now();

        for (task_id, vm_name) in assignment {
            let (Some(task), Some(vm)) =
                (tasks_by_id.get(task_id), vms_by_name.get(vm_name.as_str()))
            else {
                warn!(
                    task_id = *task_id,
                    vm = %vm_name,
                    "assignment references unknown task or VM, skipping"
                );
                continue;
            };
            join_set.spawn(dispatch_task(
                Arc::clone(&self.endpoint),
                (*task).clone(),
                (*vm).clone(),
                Arc::clone(&gates[vm_name]),
                self.max_attempts,
                self.backoff_step,
                Arc::clone(&records),
            ));
        }

        let dispatched = join_set.len();
        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "dispatch unit failed to join");
            }
        }
        let total_time = started.elapsed().as_secs_f64();
        info!(dispatched, total_time, "batch dispatch complete");

        let records = match Arc::try_unwrap(records) {
            Ok(inner) => inner.into_inner(),
            Err(shared) => shared.lock().await.clone(),
        };
        BatchExecution {
            records,
            total_time,
        }
    }
}

/// Runs one task through its state machine and appends exactly one record,
/// whatever the outcome.
async fn dispatch_task(
    endpoint: Arc<dyn TaskEndpoint>,
    task: Task,
    vm: VmResource,
    gate: Arc<Semaphore>,
    max_attempts: u32,
    backoff_step: Duration,
    records: Arc<Mutex<Vec<ExecutionRecord>>>,
) {
    let wait_started = Instant::now();
    let mut wait_time = 0.0;
    let mut exec_time = 0.0;
    let mut _gate_permit = None;

    let mut phase = TaskPhase::Waiting;
    let terminal = loop {
        phase = match phase {
            TaskPhase::Waiting => match gate.clone().acquire_owned().await {
                Ok(permit) => {
                    _gate_permit = Some(permit);
                    wait_time = wait_started.elapsed().as_secs_f64();
                    TaskPhase::Admitted
                }
                // The gate only closes if the batch is being torn down; there
                // is nothing left to run against.
                Err(_) => TaskPhase::FailedTerminal,
            },
            TaskPhase::Admitted => TaskPhase::Attempting(1),
            TaskPhase::Attempting(attempt) => {
                // Throttle before every attempt, the first included.
                tokio::time::sleep(backoff_step * attempt).await;
                let attempt_started = Instant::now();
                match endpoint.run_task(&vm, &task).await {
                    Ok(AttemptOutcome::Completed) => {
                        exec_time = attempt_started.elapsed().as_secs_f64();
                        debug!(task = %task.name, vm = %vm.name, exec_time, "task completed");
                        TaskPhase::Succeeded
                    }
                    Ok(AttemptOutcome::Overloaded) if attempt < max_attempts => {
                        debug!(task = %task.name, vm = %vm.name, attempt, "endpoint overloaded, retrying");
                        TaskPhase::Attempting(attempt + 1)
                    }
                    Ok(AttemptOutcome::Overloaded) => {
                        warn!(task = %task.name, vm = %vm.name, "retries exhausted");
                        TaskPhase::FailedTerminal
                    }
                    Ok(AttemptOutcome::Rejected { status }) => {
                        warn!(task = %task.name, vm = %vm.name, status, "task rejected");
                        TaskPhase::FailedTerminal
                    }
                    Err(e) if attempt < max_attempts => {
                        debug!(task = %task.name, vm = %vm.name, attempt, error = %e, "transport fault, retrying");
                        TaskPhase::Attempting(attempt + 1)
                    }
                    Err(e) => {
                        warn!(task = %task.name, vm = %vm.name, error = %e, "transport fault, retries exhausted");
                        TaskPhase::FailedTerminal
                    }
                }
            }
            TaskPhase::Succeeded | TaskPhase::FailedTerminal => break phase,
        };
    };

    // Exactly one record per dispatched task, success or failure.
    records.lock().await.push(ExecutionRecord {
        task_id: task.id,
        vm_name: vm.name.clone(),
        exec_time: if terminal == TaskPhase::Succeeded {
            exec_time
        } else {
            0.0
        },
        wait_time,
    });
}
