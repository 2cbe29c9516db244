use rust_decimal::Decimal;
use std::path::Path;
use thiserror::Error;

use super::types::{GatewayConfig, MAX_DURATION_SECS};
use crate::rate_limit::MIN_CALLS_PER_SECOND;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load gateway configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GatewayConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<GatewayConfig, ConfigError> {
    let default_config = include_str!("gateway_config.json");
    load_config_from_str(default_config)
}

impl GatewayConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crypto_currencies.is_empty() {
            return Err(ConfigError::Invalid(
                "no supported cryptocurrencies".to_string(),
            ));
        }
        if !(self.allowed_calls_per_second.is_finite()
            && self.allowed_calls_per_second >= MIN_CALLS_PER_SECOND)
        {
            return Err(ConfigError::Invalid(format!(
                "allowed_calls_per_second must be at least {}, got {}",
                MIN_CALLS_PER_SECOND, self.allowed_calls_per_second
            )));
        }
        if self.reference_volume <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "reference_volume must be positive".to_string(),
            ));
        }
        if self.cache_ttl_secs == 0 || self.cache_ttl_secs > MAX_DURATION_SECS {
            return Err(ConfigError::Invalid(format!(
                "cache_ttl_secs must be between 1 and {}, got {}",
                MAX_DURATION_SECS, self.cache_ttl_secs
            )));
        }
        if self.task_timeout_secs > MAX_DURATION_SECS {
            return Err(ConfigError::Invalid(format!(
                "task_timeout_secs must be at most {}, got {}",
                MAX_DURATION_SECS, self.task_timeout_secs
            )));
        }
        Ok(())
    }
}
