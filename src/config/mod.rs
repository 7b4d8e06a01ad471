//! Application configuration.
//!
//! Loaded from a TOML file with `${VAR}` environment expansion. Every
//! section and field has a default, so an empty file (or no file at all)
//! yields a working configuration.

use std::path::Path;

use ipnet::IpNet;
use serde::Deserialize;

mod limits;
mod observability;
mod server;

pub use limits::{LimitsConfig, RateLimitConfig};
pub use observability::{LogFormat, LogLevel, LoggingConfig, ObservabilityConfig};
pub use server::{ServerConfig, TrustedPeersConfig};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;
        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string, expanding `${VAR}`
    /// placeholders from the environment first.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: AppConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let rate_limit = &self.limits.rate_limit;

        if rate_limit.window_secs == 0 {
            return Err(ConfigError::Validation(
                "limits.rate_limit.window_secs must be greater than zero".to_string(),
            ));
        }
        if rate_limit.enabled && rate_limit.limit == 0 {
            return Err(ConfigError::Validation(
                "limits.rate_limit.limit must be greater than zero when rate limiting is enabled"
                    .to_string(),
            ));
        }
        if rate_limit.max_partitions == 0 {
            return Err(ConfigError::Validation(
                "limits.rate_limit.max_partitions must be greater than zero".to_string(),
            ));
        }

        for cidr in &self.server.trusted_peers.cidrs {
            if cidr.parse::<IpNet>().is_err() {
                return Err(ConfigError::Validation(format!(
                    "server.trusted_peers.cidrs entry is not a valid CIDR: {cidr}"
                )));
            }
        }

        Ok(())
    }
}

/// Expand `${VAR}` placeholders with values from the process environment.
///
/// Placeholders at or after a `#` comment marker are left untouched, so
/// commented-out lines do not require the variable to be set.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let placeholder = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut expanded = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#').unwrap_or(line.len());
        let mut rest = 0;

        for caps in placeholder.captures_iter(line) {
            let matched = caps.get(0).unwrap();
            if matched.start() >= comment_pos {
                continue;
            }
            let name = &caps[1];
            let value =
                std::env::var(name).map_err(|_| ConfigError::EnvVarNotFound(name.to_string()))?;
            expanded.push_str(&line[rest..matched.start()]);
            expanded.push_str(&value);
            rest = matched.end();
        }

        expanded.push_str(&line[rest..]);
        expanded.push('\n');
    }

    if !input.ends_with('\n') {
        expanded.pop();
    }

    Ok(expanded)
}
