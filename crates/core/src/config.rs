use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::errors::{SchedulerError, SchedulerResult};

/// Strategy names accepted by the dispatcher registry.
pub const VALID_STRATEGIES: [&str; 5] = [
    "round_robin",
    "cyclic_fill",
    "least_loaded",
    "hill_climbing",
    "top_k_greedy",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub resources: Vec<ResourceConfig>,
    pub dispatch: DispatchConfig,
    pub experiment: ExperimentConfig,
}

/// One VM in the worker pool. The pool is loaded once at startup and shared
/// read-only for the rest of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub ip_address: String,
    pub cpu_cores: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub vm_port: u16,
    pub max_attempts: u32,
    pub backoff_step_ms: u64,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub datasets: Vec<String>,
    pub algorithms: Vec<String>,
    pub runs_per_algorithm: u32,
    pub pause_between_runs_ms: u64,
    pub hill_climbing_iterations: usize,
    pub top_k: usize,
    pub output_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            resources: vec![
                ResourceConfig {
                    name: "vm1".to_string(),
                    ip_address: "127.0.0.1".to_string(),
                    cpu_cores: 1,
                },
                ResourceConfig {
                    name: "vm2".to_string(),
                    ip_address: "127.0.0.1".to_string(),
                    cpu_cores: 2,
                },
                ResourceConfig {
                    name: "vm3".to_string(),
                    ip_address: "127.0.0.1".to_string(),
                    cpu_cores: 4,
                },
                ResourceConfig {
                    name: "vm4".to_string(),
                    ip_address: "127.0.0.1".to_string(),
                    cpu_cores: 8,
                },
            ],
            dispatch: DispatchConfig::default(),
            experiment: ExperimentConfig::default(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            vm_port: 5000,
            max_attempts: 3,
            backoff_step_ms: 200,
            request_timeout_seconds: 300,
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
            algorithms: VALID_STRATEGIES.iter().map(|s| s.to_string()).collect(),
            runs_per_algorithm: 10,
            pause_between_runs_ms: 500,
            hill_climbing_iterations: 500,
            top_k: 2,
            output_dir: "results".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&AppConfig::default())?);

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("config file not found: {}", path));
            }
        } else {
            let default_paths = ["config/vmsched.toml", "vmsched.toml"];
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("VMSCHED")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.resources.is_empty() {
            return Err(SchedulerError::EmptyResourcePool);
        }
        for resource in &self.resources {
            resource.validate()?;
        }
        let mut names: Vec<&str> = self.resources.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.resources.len() {
            return Err(SchedulerError::config_error(
                "resource names must be unique",
            ));
        }
        self.dispatch.validate()?;
        self.experiment.validate()?;
        Ok(())
    }
}

impl ResourceConfig {
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.name.is_empty() {
            return Err(SchedulerError::config_error("resource name must not be empty"));
        }
        if self.ip_address.is_empty() {
            return Err(SchedulerError::config_error(format!(
                "resource {} has no ip_address",
                self.name
            )));
        }
        // A zero-core VM would divide by zero in the cost model.
        if self.cpu_cores == 0 {
            return Err(SchedulerError::config_error(format!(
                "resource {} must have cpu_cores > 0",
                self.name
            )));
        }
        Ok(())
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.max_attempts == 0 {
            return Err(SchedulerError::config_error(
                "dispatch.max_attempts must be at least 1",
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(SchedulerError::config_error(
                "dispatch.request_timeout_seconds must be at least 1",
            ));
        }
        Ok(())
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.algorithms.is_empty() {
            return Err(SchedulerError::config_error(
                "experiment.algorithms must not be empty",
            ));
        }
        for algorithm in &self.algorithms {
            if !VALID_STRATEGIES.contains(&algorithm.as_str()) {
                return Err(SchedulerError::config_error(format!(
                    "invalid algorithm: {}. valid options: {:?}",
                    algorithm, VALID_STRATEGIES
                )));
            }
        }
        if self.runs_per_algorithm == 0 {
            return Err(SchedulerError::config_error(
                "experiment.runs_per_algorithm must be at least 1",
            ));
        }
        if self.top_k == 0 {
            return Err(SchedulerError::config_error(
                "experiment.top_k must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.resources.len(), 4);
        assert_eq!(config.dispatch.vm_port, 5000);
        assert_eq!(config.dispatch.max_attempts, 3);
        assert_eq!(config.experiment.runs_per_algorithm, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_core_resource_rejected() {
        let mut config = AppConfig::default();
        config.resources[0].cpu_cores = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_pool_rejected() {
        let mut config = AppConfig::default();
        config.resources.clear();
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::EmptyResourcePool)
        ));
    }

    #[test]
    fn test_duplicate_resource_names_rejected() {
        let mut config = AppConfig::default();
        config.resources[1].name = config.resources[0].name.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let mut config = AppConfig::default();
        config.experiment.algorithms = vec!["simulated_annealing".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let toml_str = r#"
[[resources]]
name = "vm1"
ip_address = "10.0.0.11"
cpu_cores = 2

[[resources]]
name = "vm2"
ip_address = "10.0.0.12"
cpu_cores = 8

[dispatch]
vm_port = 5000
max_attempts = 3
backoff_step_ms = 200
request_timeout_seconds = 300

[experiment]
datasets = ["datasets/RandomSimpleDataset.txt"]
algorithms = ["round_robin", "least_loaded"]
runs_per_algorithm = 2
pause_between_runs_ms = 0
hill_climbing_iterations = 100
top_k = 2
output_dir = "results"
"#;

        let config = AppConfig::from_toml(toml_str).expect("failed to parse TOML");
        assert_eq!(config.resources.len(), 2);
        assert_eq!(config.resources[1].cpu_cores, 8);
        assert_eq!(config.experiment.algorithms.len(), 2);
        assert_eq!(config.experiment.runs_per_algorithm, 2);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = AppConfig::default();
        let serialized = serde_json::to_string(&config).expect("failed to serialize");
        let deserialized: AppConfig =
            serde_json::from_str(&serialized).expect("failed to deserialize");
        assert_eq!(config.resources.len(), deserialized.resources.len());
        assert_eq!(config.dispatch.vm_port, deserialized.dispatch.vm_port);
    }
}
