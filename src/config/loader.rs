//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::CompatConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Upstream host override.
pub const ENV_UPSTREAM_HOST: &str = "MCP_COMPAT_UPSTREAM_HOST";
/// Upstream port override.
pub const ENV_UPSTREAM_PORT: &str = "MCP_COMPAT_UPSTREAM_PORT";
/// Local listen port override.
pub const ENV_PORT: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML config file without validating it.
pub fn read_config(path: &Path) -> Result<CompatConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply environment overrides through `lookup`.
pub fn apply_env_overrides<F>(config: &mut CompatConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup(ENV_UPSTREAM_HOST).filter(|h| !h.trim().is_empty()) {
        config.upstream.host = host;
    }

    if let Some(value) = lookup(ENV_UPSTREAM_PORT) {
        config.upstream.port = parse_port(ENV_UPSTREAM_PORT, value)?;
    }

    if let Some(value) = lookup(ENV_PORT) {
        let port = parse_port(ENV_PORT, value)?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    Ok(())
}

fn parse_port(var: &'static str, value: String) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

/// Load configuration: optional file, then environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<CompatConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => CompatConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
