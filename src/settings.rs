//! Layered configuration loading for the native host.
//!
//! | Layer | Source                                  |
//! |-------|-----------------------------------------|
//! | 1     | [`ConsoleConfig::default`]              |
//! | 2     | optional TOML file (`--config`)         |
//! | 3     | `CRANE_CONSOLE_*` environment variables |
//!
//! Nested keys use a double underscore:
//! `CRANE_CONSOLE_RECONNECT__DELAY_MS=1000`.

use std::path::Path;

use ::config::{Config, Environment, File};
use thiserror::Error;

use crate::types::ConsoleConfig;

pub const ENV_PREFIX: &str = "CRANE_CONSOLE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration could not be loaded: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Defaults, then `path` if it exists, then the process environment.
pub fn load(path: Option<&Path>) -> Result<ConsoleConfig, ConfigError> {
    load_with_env(path, environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn load_with_env(path: Option<&Path>, env: Environment) -> Result<ConsoleConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&ConsoleConfig::default())?);
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(false));
    }
    let cfg: ConsoleConfig = builder.add_source(env).build()?.try_deserialize()?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn validate(cfg: &ConsoleConfig) -> Result<(), ConfigError> {
    if !(cfg.endpoint.starts_with("ws://") || cfg.endpoint.starts_with("wss://")) {
        return Err(ConfigError::Invalid(format!(
            "endpoint must be a ws:// or wss:// url, got '{}'",
            cfg.endpoint
        )));
    }
    if !(cfg.api_base.starts_with("http://") || cfg.api_base.starts_with("https://")) {
        return Err(ConfigError::Invalid(format!(
            "api_base must be an http(s) url, got '{}'",
            cfg.api_base
        )));
    }
    if cfg.reconnect.delay_ms == 0 {
        return Err(ConfigError::Invalid("reconnect.delay_ms must be positive".into()));
    }
    if cfg.event_log_len == 0 {
        return Err(ConfigError::Invalid("event_log_len must be positive".into()));
    }
    Ok(())
}
