//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid environment override {name}: {value}")]
    Env { name: &'static str, value: String },
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub const ENV_MAX_ATTEMPTS: &str = "GATEWAY_OFFENDER_MAX_ATTEMPTS";
pub const ENV_WINDOW_SECS: &str = "GATEWAY_OFFENDER_WINDOW_SECS";
pub const ENV_BLOCK_SECS: &str = "GATEWAY_OFFENDER_BLOCK_SECS";
pub const ENV_PRODUCTION: &str = "GATEWAY_PRODUCTION";

/// Load, apply environment overrides, and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GatewayConfig = toml::from_str(&content)?;

    apply_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a config from defaults plus environment overrides, validated the same
/// way as a file.
pub fn load_from_env<F>(lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = GatewayConfig::default();
    apply_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply overrides from a variable lookup (the process environment in production).
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_MAX_ATTEMPTS) {
        config.offenders.max_attempts = parse_env(ENV_MAX_ATTEMPTS, value)?;
    }
    if let Some(value) = lookup(ENV_WINDOW_SECS) {
        config.offenders.window_secs = parse_env(ENV_WINDOW_SECS, value)?;
    }
    if let Some(value) = lookup(ENV_BLOCK_SECS) {
        config.offenders.block_secs = parse_env(ENV_BLOCK_SECS, value)?;
    }
    if let Some(value) = lookup(ENV_PRODUCTION) {
        config.security.production = parse_env(ENV_PRODUCTION, value)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { name, value })
}
