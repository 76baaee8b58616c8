use std::fs;
use std::path::Path;

use tracing::{debug, info};

use vmsched_core::{SchedulerError, SchedulerResult};
use vmsched_domain::entities::Task;

/// Loads a batch of tasks from a dataset file: one integer index per line.
///
/// Task ids are the zero-based line ordinals, so they stay stable even when
/// lines in between are skipped. Blank and unparseable lines are dropped
/// silently; a missing file is an error the caller turns into a skipped
/// dataset, not a failed run.
pub fn load_tasks(path: &Path) -> SchedulerResult<Vec<Task>> {
    if !path.exists() {
        return Err(SchedulerError::dataset_error(format!(
            "dataset file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path)?;
    let mut tasks = Vec::new();
    for (line_no, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<u32>() {
            Ok(index) => tasks.push(Task::new(line_no as i64, index)),
            Err(_) => debug!(line = line_no + 1, "skipping unparseable dataset line"),
        }
    }

    info!(
        dataset = %path.display(),
        tasks = tasks.len(),
        "dataset loaded"
    );
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_dataset(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
        file.write_all(contents.as_bytes())
            .expect("failed to write temp file");
        file
    }

    #[test]
    fn test_load_tasks_parses_indices_in_order() {
        let file = write_dataset("1\n5\n3\n");
        let tasks = load_tasks(file.path()).unwrap();

        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].index, 1);
        assert_eq!(tasks[1].index, 5);
        assert_eq!(tasks[2].index, 3);
        assert_eq!(tasks[1].cpu_load, 250_000);
    }

    #[test]
    fn test_load_tasks_skips_blank_and_malformed_lines() {
        let file = write_dataset("1\n\nnot-a-number\n3\n");
        let tasks = load_tasks(file.path()).unwrap();

        assert_eq!(tasks.len(), 2);
        // Ids are line ordinals, skipped lines included.
        assert_eq!(tasks[0].id, 0);
        assert_eq!(tasks[1].id, 3);
        assert_eq!(tasks[1].index, 3);
    }

    #[test]
    fn test_load_tasks_missing_file() {
        let result = load_tasks(Path::new("/nonexistent/dataset.txt"));
        assert!(matches!(result, Err(SchedulerError::Dataset(_))));
    }

    #[test]
    fn test_load_tasks_empty_file() {
        let file = write_dataset("");
        let tasks = load_tasks(file.path()).unwrap();
        assert!(tasks.is_empty());
    }
}
