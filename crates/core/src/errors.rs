use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unknown scheduling strategy: {0}")]
    UnknownStrategy(String),
    #[error("resource pool is empty")]
    EmptyResourcePool,
    #[error("dataset error: {0}")]
    Dataset(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("report error: {0}")]
    Report(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn dataset_error<S: Into<String>>(msg: S) -> Self {
        Self::Dataset(msg.into())
    }
    pub fn network_error<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulerError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::UnknownStrategy("magic".to_string());
        assert_eq!(err.to_string(), "unknown scheduling strategy: magic");

        let err = SchedulerError::config_error("resources must not be empty");
        assert_eq!(
            err.to_string(),
            "configuration error: resources must not be empty"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SchedulerError::network_error("connection refused").is_retryable());
        assert!(!SchedulerError::EmptyResourcePool.is_retryable());
        assert!(!SchedulerError::UnknownStrategy("x".to_string()).is_retryable());
    }
}
