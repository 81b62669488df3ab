use super::types::*;
use crate::config::{expand_env_vars, unexpanded_env_vars};
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    load_config_from_str(&yaml_string)
}

/// Parse and validate a config document, expanding `$env{VAR}` references first.
pub fn load_config_from_str(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let config: Config = serde_yaml::from_str(&yaml_string)?;
    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let unexpanded_vars = unexpanded_env_vars(yaml_string);
    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    match Url::parse(&config.cloud.logs_tail_url) {
        Ok(url) if url.scheme() == "ws" || url.scheme() == "wss" => {}
        Ok(url) => errors.push(format!(
            "cloud.logs_tail_url: unsupported scheme '{}', expected ws or wss",
            url.scheme()
        )),
        Err(e) => errors.push(format!(
            "cloud.logs_tail_url: invalid URL '{}': {}",
            config.cloud.logs_tail_url, e
        )),
    }

    if config.cloud.token.trim().is_empty() {
        errors.push("cloud.token cannot be empty".to_string());
    }

    if config.tail.reference_id.trim().is_empty() {
        errors.push("tail.reference_id cannot be empty".to_string());
    }

    if config.retry.attempts == 0 {
        errors.push("retry.attempts must be at least 1".to_string());
    }

    if config.retry.base_interval > config.retry.max_interval {
        errors.push(format!(
            "retry.base_interval ({}) must not exceed retry.max_interval ({})",
            humantime_serde::re::humantime::format_duration(config.retry.base_interval),
            humantime_serde::re::humantime::format_duration(config.retry.max_interval)
        ));
    }

    if config.pipeline.buffer_limit == 0 {
        errors.push("pipeline.buffer_limit must be at least 1".to_string());
    }

    if config.pipeline.close_deadline.is_zero() {
        errors.push("pipeline.close_deadline must be greater than zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}
