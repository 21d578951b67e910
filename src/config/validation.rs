use crate::config::types::{Config, HttpConfig, PipelineConfig, ServerConfig};
use crate::ConfigError;
use std::net::SocketAddr;

/// Number of top-level stages the orchestrator runs side by side
const FIXED_STAGES: usize = 4;

/// Upper bound for the per-stage worker pools
const MAX_WORKERS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_server_config(&config.server)?;
    validate_http_config(&config.http)?;
    validate_pipeline_config(&config.pipeline)?;
    Ok(())
}

/// Validates listener configuration
fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    config
        .bind_address
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidAddress(format!("{}: {}", config.bind_address, e)))?;
    Ok(())
}

/// Validates outbound HTTP configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates pipeline concurrency settings
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    validate_workers("download_concurrency", config.download_concurrency)?;
    validate_workers("chapter_concurrency", config.chapter_concurrency)?;

    // Fewer permits than stages would leave a stage waiting on a sibling that
    // never finishes.
    if config.stage_limit < FIXED_STAGES {
        return Err(ConfigError::Validation(format!(
            "stage_limit must be >= {}, got {}",
            FIXED_STAGES, config.stage_limit
        )));
    }

    if config.channel_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "channel_capacity must be >= 1, got {}",
            config.channel_capacity
        )));
    }

    if config.stream_buffer_size < 1024 {
        return Err(ConfigError::Validation(format!(
            "stream_buffer_size must be >= 1024 bytes, got {}",
            config.stream_buffer_size
        )));
    }

    Ok(())
}

fn validate_workers(name: &str, value: usize) -> Result<(), ConfigError> {
    if value < 1 || value > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and {}, got {}",
            name, MAX_WORKERS, value
        )));
    }
    Ok(())
}
