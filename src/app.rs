use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use vmsched_core::{AppConfig, SchedulerResult};
use vmsched_dispatcher::executor::DispatchExecutor;
use vmsched_dispatcher::strategies::{self, SchedulingStrategy, StrategyOptions};
use vmsched_domain::entities::{BatchMetrics, Task, VmResource};
use vmsched_domain::metrics;
use vmsched_infrastructure::dataset;
use vmsched_infrastructure::report::CsvReportSink;

/// Drives the full experiment matrix: every configured dataset, every
/// configured algorithm, `runs_per_algorithm` batches each. A failing cell
/// (unknown algorithm, unreadable dataset, failed run) is logged and skipped;
/// it never takes the rest of the matrix down.
pub struct ExperimentRunner {
    config: AppConfig,
    vms: Vec<VmResource>,
    executor: DispatchExecutor,
    sink: CsvReportSink,
}

impl ExperimentRunner {
    pub fn new(config: AppConfig) -> Self {
        let vms: Vec<VmResource> = config
            .resources
            .iter()
            .cloned()
            .map(VmResource::from)
            .collect();
        let executor = DispatchExecutor::from_config(&config.dispatch);
        let sink = CsvReportSink::new(&config.experiment.output_dir);
        Self {
            config,
            vms,
            executor,
            sink,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let experiment = &self.config.experiment;
        let options = StrategyOptions {
            hill_climbing_iterations: experiment.hill_climbing_iterations,
            top_k: experiment.top_k,
        };
        let mut all_rows: Vec<BatchMetrics> = Vec::new();

        for dataset_path in &experiment.datasets {
            let tasks = match dataset::load_tasks(Path::new(dataset_path)) {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!(dataset = %dataset_path, error = %e, "skipping dataset");
                    continue;
                }
            };
            if tasks.is_empty() {
                warn!(dataset = %dataset_path, "dataset produced no tasks, skipping");
                continue;
            }

            for algorithm in &experiment.algorithms {
                // One instance per (dataset, algorithm) cell: stateful
                // strategies carry their cursor across the repeated runs.
                let mut strategy = match strategies::create_strategy(algorithm, &options) {
                    Ok(strategy) => strategy,
                    Err(e) => {
                        warn!(algorithm = %algorithm, error = %e, "skipping algorithm");
                        continue;
                    }
                };

                let mut rows = Vec::with_capacity(experiment.runs_per_algorithm as usize);
                for run_id in 1..=experiment.runs_per_algorithm {
                    tokio::time::sleep(Duration::from_millis(experiment.pause_between_runs_ms))
                        .await;
                    match self
                        .run_cycle(run_id, dataset_path, strategy.as_mut(), &tasks)
                        .await
                    {
                        Ok(row) => {
                            info!(
                                run_id,
                                algorithm = %algorithm,
                                makespan = row.makespan,
                                success = row.total_tasks_success,
                                "run complete"
                            );
                            rows.push(row);
                        }
                        Err(e) => {
                            warn!(run_id, algorithm = %algorithm, error = %e, "run failed");
                        }
                    }
                }

                if !rows.is_empty() {
                    if let Err(e) = self.sink.write_batch_log(dataset_path, algorithm, &rows) {
                        error!(error = %e, "failed to write batch log");
                    }
                    all_rows.extend(rows);
                }
            }
        }

        if all_rows.is_empty() {
            warn!("no batch produced any metrics");
            return Ok(());
        }
        self.sink.write_raw(&all_rows)?;
        let summary_path = self.sink.write_summary(&all_rows)?;
        info!(path = %summary_path.display(), "experiment summary written");
        Ok(())
    }

    async fn run_cycle(
        &self,
        run_id: u32,
        dataset_path: &str,
        strategy: &mut dyn SchedulingStrategy,
        tasks: &[Task],
    ) -> SchedulerResult<BatchMetrics> {
        let assignment = strategy.assign(tasks, &self.vms)?;
        let execution = self.executor.execute(&assignment, tasks, &self.vms).await;
        Ok(metrics::summarize_batch(
            run_id,
            dataset_path,
            strategy.name(),
            &execution.records,
            &self.vms,
            execution.total_time,
        ))
    }
}
