use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::{ClientOptions, DEFAULT_BASE_URL};
use crate::guard::DEFAULT_REQUIRED_ROLE;
use crate::report::DEFAULT_RECENT_LIMIT;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub state_dir: PathBuf,
    pub required_role: String,
    pub recent_limit: usize,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            state_dir: PathBuf::from(".cashier"),
            required_role: DEFAULT_REQUIRED_ROLE.to_string(),
            recent_limit: DEFAULT_RECENT_LIMIT,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Unset or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let recent_limit = match get("CASHIER_RECENT_LIMIT") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "CASHIER_RECENT_LIMIT",
                        format!("'{}' is not a positive number", v),
                    )
                })?,
            None => defaults.recent_limit,
        };

        let request_timeout = match get("CASHIER_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::InvalidValue("CASHIER_TIMEOUT_SECS", e.to_string()))?,
            None => defaults.request_timeout,
        };

        Ok(Self {
            api_url: get("CASHIER_API_URL").unwrap_or(defaults.api_url),
            state_dir: get("CASHIER_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            required_role: get("CASHIER_REQUIRED_ROLE")
                .map(|r| r.trim().to_lowercase())
                .unwrap_or(defaults.required_role),
            recent_limit,
            request_timeout,
        })
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: Some(self.api_url.clone()),
            timeout: Some(self.request_timeout),
        }
    }
}
