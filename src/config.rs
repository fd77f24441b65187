//! Settings read from the function's environment.

use std::time::Duration;

use thiserror::Error;

use crate::parameters::DEFAULT_MAX_AGE;

/// Default cache max age in seconds.
pub const MAX_AGE_ENV: &str = "POWERTOOLS_PARAMETERS_MAX_AGE";
/// Whether SSM values are decrypted unless a call says otherwise.
pub const SSM_DECRYPT_ENV: &str = "POWERTOOLS_PARAMETERS_SSM_DECRYPT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a number of seconds, got {value:?}")]
    InvalidDuration { name: &'static str, value: String },

    #[error("{name} must be true or false, got {value:?}")]
    InvalidBool { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamsConfig {
    pub max_age: Duration,
    pub ssm_decrypt: bool,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        ParamsConfig {
            max_age: DEFAULT_MAX_AGE,
            ssm_decrypt: false,
        }
    }
}

impl ParamsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with variables taken from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ParamsConfig::default();

        if let Some(value) = lookup(MAX_AGE_ENV).filter(|value| !value.trim().is_empty()) {
            let seconds = value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidDuration {
                name: MAX_AGE_ENV,
                value: value.clone(),
            })?;
            config.max_age = Duration::from_secs(seconds);
        }

        if let Some(value) = lookup(SSM_DECRYPT_ENV).filter(|value| !value.trim().is_empty()) {
            config.ssm_decrypt = match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::InvalidBool {
                        name: SSM_DECRYPT_ENV,
                        value,
                    })
                }
            };
        }

        Ok(config)
    }
}
