//! Tracing subscriber initialization.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

/// Install the global tracing subscriber.
///
/// Fails if a subscriber is already installed, which in practice means
/// `init_tracing` was called twice.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingError> {
    let filter = build_env_filter(config);
    let registry = tracing_subscriber::registry().with(filter);
    let fmt = tracing_subscriber::fmt::layer()
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    let result = match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => registry.with(fmt.pretty()).try_init(),
        (LogFormat::Pretty, false) => registry.with(fmt.pretty().without_time()).try_init(),
        (LogFormat::Compact, true) => registry.with(fmt.compact()).try_init(),
        (LogFormat::Compact, false) => registry.with(fmt.compact().without_time()).try_init(),
        (LogFormat::Json, true) => registry.with(fmt.json()).try_init(),
        (LogFormat::Json, false) => registry.with(fmt.json().without_time()).try_init(),
    };

    result.map_err(|e| TracingError::Init(e.to_string()))
}

/// Build the log filter: `RUST_LOG` wins outright, otherwise the
/// configured level plus directives quieting the HTTP internals, plus any
/// extra directives from the config file.
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = std::env::var(EnvFilter::DEFAULT_ENV)
        && !env_filter.is_empty()
    {
        return EnvFilter::new(env_filter);
    }

    let mut directives = format!("{},hyper=warn,tower=warn", config.level.as_str());
    if let Some(extra) = &config.filter {
        directives.push(',');
        directives.push_str(extra);
    }
    EnvFilter::new(directives)
}
