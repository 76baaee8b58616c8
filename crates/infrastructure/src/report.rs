use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use vmsched_core::SchedulerResult;
use vmsched_domain::entities::BatchMetrics;

const METRICS_HEADER: &str = "run_id,dataset,algorithm,makespan,throughput,\
resource_utilization,imbalance_degree,total_tasks_success,total_cpu_time,\
total_wait_time,avg_start_time,avg_execution_time,avg_finish_time,recorded_at";

const SUMMARY_HEADER: &str = "dataset,algorithm,runs,makespan,throughput,\
resource_utilization,imbalance_degree,total_tasks_success,total_cpu_time,\
total_wait_time,avg_start_time,avg_execution_time,avg_finish_time";

/// Writes batch metrics as CSV files under a configured output directory:
/// one log per (dataset, algorithm), one raw file with every row, and one
/// per-(dataset, algorithm) averaged summary.
pub struct CsvReportSink {
    output_dir: PathBuf,
}

impl CsvReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn write_batch_log(
        &self,
        dataset: &str,
        algorithm: &str,
        rows: &[BatchMetrics],
    ) -> SchedulerResult<PathBuf> {
        let file_name = format!(
            "LOG_{}_{}.csv",
            sanitize(dataset_stem(dataset)),
            sanitize(algorithm)
        );
        self.write_metrics_file(&file_name, rows)
    }

    pub fn write_raw(&self, rows: &[BatchMetrics]) -> SchedulerResult<PathBuf> {
        self.write_metrics_file("FINAL_ALL_RAW_DATA.csv", rows)
    }

    /// Averages every numeric field over the runs of each (dataset,
    /// algorithm) pair, sorted by dataset and then by descending resource
    /// utilization so the best-utilizing algorithm leads its group.
    pub fn write_summary(&self, rows: &[BatchMetrics]) -> SchedulerResult<PathBuf> {
        let mut groups: BTreeMap<(String, String), Vec<&BatchMetrics>> = BTreeMap::new();
        for row in rows {
            groups
                .entry((row.dataset.clone(), row.algorithm.clone()))
                .or_default()
                .push(row);
        }

        let mut summaries: Vec<SummaryRow> = groups
            .into_iter()
            .map(|((dataset, algorithm), group)| SummaryRow::averaged(dataset, algorithm, &group))
            .collect();
        summaries.sort_by(|a, b| {
            a.dataset.cmp(&b.dataset).then(
                b.resource_utilization
                    .partial_cmp(&a.resource_utilization)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });

        let mut contents = String::from(SUMMARY_HEADER);
        contents.push('\n');
        for summary in &summaries {
            contents.push_str(&summary.to_csv_row());
            contents.push('\n');
        }

        let path = self.prepare_path("FINAL_AVERAGE_SUMMARY.csv")?;
        fs::write(&path, contents)?;
        info!(path = %path.display(), groups = summaries.len(), "summary written");
        Ok(path)
    }

    fn write_metrics_file(&self, file_name: &str, rows: &[BatchMetrics]) -> SchedulerResult<PathBuf> {
        let mut contents = String::from(METRICS_HEADER);
        contents.push('\n');
        for row in rows {
            contents.push_str(&metrics_csv_row(row));
            contents.push('\n');
        }

        let path = self.prepare_path(file_name)?;
        fs::write(&path, contents)?;
        info!(path = %path.display(), rows = rows.len(), "metrics written");
        Ok(path)
    }

    fn prepare_path(&self, file_name: &str) -> SchedulerResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(self.output_dir.join(file_name))
    }
}

struct SummaryRow {
    dataset: String,
    algorithm: String,
    runs: usize,
    makespan: f64,
    throughput: f64,
    resource_utilization: f64,
    imbalance_degree: f64,
    total_tasks_success: f64,
    total_cpu_time: f64,
    total_wait_time: f64,
    avg_start_time: f64,
    avg_execution_time: f64,
    avg_finish_time: f64,
}

impl SummaryRow {
    fn averaged(dataset: String, algorithm: String, group: &[&BatchMetrics]) -> Self {
        let n = group.len() as f64;
        let mean = |f: &dyn Fn(&BatchMetrics) -> f64| group.iter().map(|m| f(*m)).sum::<f64>() / n;
        Self {
            dataset,
            algorithm,
            runs: group.len(),
            makespan: mean(&|m| m.makespan),
            throughput: mean(&|m| m.throughput),
            resource_utilization: mean(&|m| m.resource_utilization),
            imbalance_degree: mean(&|m| m.imbalance_degree),
            total_tasks_success: mean(&|m| m.total_tasks_success as f64),
            total_cpu_time: mean(&|m| m.total_cpu_time),
            total_wait_time: mean(&|m| m.total_wait_time),
            avg_start_time: mean(&|m| m.avg_start_time),
            avg_execution_time: mean(&|m| m.avg_execution_time),
            avg_finish_time: mean(&|m| m.avg_finish_time),
        }
    }

    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{:.6},{:.6},{:.6},{:.6},{:.2},{:.6},{:.6},{:.6},{:.6},{:.6}",
            self.dataset,
            self.algorithm,
            self.runs,
            self.makespan,
            self.throughput,
            self.resource_utilization,
            self.imbalance_degree,
            self.total_tasks_success,
            self.total_cpu_time,
            self.total_wait_time,
            self.avg_start_time,
            self.avg_execution_time,
            self.avg_finish_time
        )
    }
}

fn metrics_csv_row(m: &BatchMetrics) -> String {
    format!(
        "{},{},{},{:.6},{:.6},{:.6},{:.6},{},{:.6},{:.6},{:.6},{:.6},{:.6},{}",
        m.run_id,
        m.dataset,
        m.algorithm,
        m.makespan,
        m.throughput,
        m.resource_utilization,
        m.imbalance_degree,
        m.total_tasks_success,
        m.total_cpu_time,
        m.total_wait_time,
        m.avg_start_time,
        m.avg_execution_time,
        m.avg_finish_time,
        m.recorded_at.to_rfc3339()
    )
}

fn dataset_stem(dataset: &str) -> &str {
    Path::new(dataset)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(dataset)
}

fn sanitize(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}
