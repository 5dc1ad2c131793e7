//! Runner config loading: YAML file, environment overrides, validation.

use std::env;
use std::path::Path;

use super::error::ConfigError;
use crate::types::RunnerConfig;

/// Check whether the config file exists.
pub fn config_exists(path: &Path) -> bool {
    path.exists()
}

/// Read the runner config from a YAML file. Missing file is an error;
/// callers that want defaults use `read_config_with_env` on a maybe-missing
/// path and fall back explicitly.
pub fn read_config(path: &Path) -> Result<RunnerConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    let config: RunnerConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Read config and apply `BRAIN_*` environment overrides.
/// A missing file yields defaults; a malformed file is still an error.
pub fn read_config_with_env(path: &Path) -> Result<RunnerConfig, ConfigError> {
    let mut config = if path.exists() {
        read_config(path)?
    } else {
        RunnerConfig::default()
    };
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Apply environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut RunnerConfig) -> Result<(), ConfigError> {
    if let Ok(url) = env::var("BRAIN_API_URL") {
        if !url.trim().is_empty() {
            config.api_url = Some(url);
        }
    }
    if let Ok(port) = env::var("BRAIN_API_PORT") {
        if !port.trim().is_empty() {
            config.api_port = Some(
                port.parse::<u16>()
                    .map_err(|_| ConfigError::InvalidEnv(format!("BRAIN_API_PORT={port}")))?,
            );
        }
    }
    if let Ok(parallel) = env::var("BRAIN_MAX_PARALLEL") {
        if !parallel.trim().is_empty() {
            config.max_parallel = parallel
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidEnv(format!("BRAIN_MAX_PARALLEL={parallel}")))?;
        }
    }
    if let Ok(interval) = env::var("BRAIN_POLL_INTERVAL") {
        if !interval.trim().is_empty() {
            config.poll_interval_secs = interval
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnv(format!("BRAIN_POLL_INTERVAL={interval}")))?;
        }
    }
    Ok(())
}

/// Validate invariants the rest of the runner assumes.
pub fn validate_config(config: &RunnerConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.poll_interval_secs == 0 {
        errors.push("poll_interval_secs must be at least 1".to_string());
    }
    if config.memory_threshold_pct > 90 {
        errors.push("memory_threshold_pct must be at most 90".to_string());
    }
    if config.agent.trim().is_empty() {
        errors.push("agent must not be empty".to_string());
    }
    for project in &config.projects {
        if project.name.trim().is_empty() {
            errors.push("project names must not be empty".to_string());
        }
    }
    let mut names: Vec<&str> = config.projects.iter().map(|p| p.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    if names.len() != config.projects.len() {
        errors.push("duplicate project names".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors))
    }
}

/// Write a config back as YAML (used by tests and fixtures).
pub fn write_config(path: &Path, config: &RunnerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_yaml::to_string(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_config_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let result = read_config(&tmp.path().join("runner.yaml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_read_config_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("runner.yaml");
        let mut config = RunnerConfig::default();
        config.max_parallel = 7;
        config.projects.push(crate::types::ProjectConfig {
            name: "demo".to_string(),
            limit: Some(2),
        });
        write_config(&path, &config).unwrap();

        let read = read_config(&path).unwrap();
        assert_eq!(read.max_parallel, 7);
        assert_eq!(read.projects.len(), 1);
        assert_eq!(read.projects[0].limit, Some(2));
    }

    #[test]
    fn test_read_config_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("runner.yaml");
        std::fs::write(&path, "max_parallel: [not a number\n").unwrap();
        assert!(matches!(read_config(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = RunnerConfig::default();
        config.poll_interval_secs = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_projects() {
        let mut config = RunnerConfig::default();
        for _ in 0..2 {
            config.projects.push(crate::types::ProjectConfig {
                name: "demo".to_string(),
                limit: None,
            });
        }
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
