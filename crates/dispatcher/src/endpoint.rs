use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use vmsched_core::{SchedulerError, SchedulerResult};
use vmsched_domain::entities::{Task, VmResource};

/// Classified response of one attempt against a VM endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The endpoint completed the task.
    Completed,
    /// The endpoint signalled transient overload; the attempt may be retried.
    Overloaded,
    /// Any other status: terminal, no further attempts.
    Rejected { status: u16 },
}

/// Seam between the dispatch harness and the remote task endpoints. Tests
/// substitute a scripted implementation; production goes over HTTP.
#[async_trait]
pub trait TaskEndpoint: Send + Sync {
    /// Runs `task` on `vm` once. Transport-level failures surface as `Err`
    /// and are treated by the harness like an overloaded endpoint.
    async fn run_task(&self, vm: &VmResource, task: &Task) -> SchedulerResult<AttemptOutcome>;
}

pub struct HttpTaskEndpoint {
    client: reqwest::Client,
    port: u16,
    request_timeout: Duration,
}

impl HttpTaskEndpoint {
    pub fn new(port: u16, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            port,
            request_timeout,
        }
    }
}

#[async_trait]
impl TaskEndpoint for HttpTaskEndpoint {
    async fn run_task(&self, vm: &VmResource, task: &Task) -> SchedulerResult<AttemptOutcome> {
        let url = vm.task_url(self.port, task.index);
        debug!(task = %task.name, vm = %vm.name, %url, "sending task");

        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| SchedulerError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(AttemptOutcome::Completed)
        } else if status == StatusCode::INTERNAL_SERVER_ERROR {
            Ok(AttemptOutcome::Overloaded)
        } else {
            Ok(AttemptOutcome::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
