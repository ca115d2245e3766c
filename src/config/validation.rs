use crate::config::types::{
    Config, HarvestConfig, OutputConfig, RetryConfig, ThrottleConfig, TransportConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_throttle_config(&config.throttle)?;
    validate_retry_config(&config.retry)?;
    validate_transport_config(&config.transport)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates page count, concurrency and retry budget
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.start_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start_url '{}': {}", config.start_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "start_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.total_pages < 1 {
        return Err(ConfigError::Validation(
            "total_pages must be >= 1, got 0".to_string(),
        ));
    }

    if config.concurrency_limit < 1 || config.concurrency_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency_limit must be between 1 and 100, got {}",
            config.concurrency_limit
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "max_retries must be >= 1, got 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_throttle_config(config: &ThrottleConfig) -> Result<(), ConfigError> {
    validate_seconds("throttle.base_delay", config.base_delay)?;
    validate_seconds("throttle.random_delay_min", config.random_delay_min)?;
    validate_seconds("throttle.random_delay_max", config.random_delay_max)?;

    if config.random_delay_min > config.random_delay_max {
        return Err(ConfigError::Validation(format!(
            "random_delay_min ({}) must not exceed random_delay_max ({})",
            config.random_delay_min, config.random_delay_max
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    validate_seconds("retry.base_delay", config.base_delay)?;
    validate_seconds("retry.jitter", config.jitter)?;
    validate_seconds("retry.max_delay", config.max_delay)?;

    if !config.backoff_factor.is_finite() || config.backoff_factor < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff_factor must be >= 1.0, got {}",
            config.backoff_factor
        )));
    }

    if config.max_delay < config.base_delay {
        return Err(ConfigError::Validation(format!(
            "max_delay ({}s) must be >= base_delay ({}s)",
            config.max_delay, config.base_delay
        )));
    }

    Ok(())
}

fn validate_transport_config(config: &TransportConfig) -> Result<(), ConfigError> {
    Url::parse(&config.api_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api_url: {}", e)))?;

    if config.zone.is_empty() {
        return Err(ConfigError::Validation("zone cannot be empty".to_string()));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.api_key_env.is_empty() {
        return Err(ConfigError::Validation(
            "api_key_env cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_path.is_empty() {
        return Err(ConfigError::Validation(
            "output_path cannot be empty".to_string(),
        ));
    }

    if matches!(config.debug_dir.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "debug_dir cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Upper bound for any configured delay: one day
const MAX_DELAY_SECS: f64 = 86_400.0;

/// Timing values are seconds and must lie in `[0, MAX_DELAY_SECS]`
fn validate_seconds(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        )));
    }
    if value > MAX_DELAY_SECS {
        return Err(ConfigError::Validation(format!(
            "{} must be at most {} seconds, got {}",
            name, MAX_DELAY_SECS, value
        )));
    }
    Ok(())
}
