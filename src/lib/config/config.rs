use std::time::Duration;

use super::types::{ConfigError, WorkerConfig};

pub const ENV_NAME: &str = "CUBE_WORKER_NAME";
pub const ENV_HOST: &str = "CUBE_HOST";
pub const ENV_PORT: &str = "CUBE_PORT";
pub const ENV_RUN_TIMEOUT: &str = "CUBE_RUN_TIMEOUT_SECS";
pub const ENV_STOP_TIMEOUT: &str = "CUBE_STOP_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL: &str = "CUBE_POLL_INTERVAL_SECS";
pub const ENV_LOG_LEVEL: &str = "CUBE_LOG_LEVEL";

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            name: "default_worker".to_string(),
            address: "localhost".to_string(),
            port: 8080,
            run_timeout_secs: 120,
            stop_timeout_secs: 30,
            poll_interval_secs: 5,
            log_level: "info".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, keeping defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = WorkerConfig::default();

        if let Some(name) = lookup(ENV_NAME) {
            config.name = name;
        }
        if let Some(address) = lookup(ENV_HOST) {
            config.address = address;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.port = parse(ENV_PORT, port)?;
        }
        if let Some(secs) = lookup(ENV_RUN_TIMEOUT) {
            config.run_timeout_secs = parse_secs(ENV_RUN_TIMEOUT, secs)?;
        }
        if let Some(secs) = lookup(ENV_STOP_TIMEOUT) {
            config.stop_timeout_secs = parse_secs(ENV_STOP_TIMEOUT, secs)?;
        }
        if let Some(secs) = lookup(ENV_POLL_INTERVAL) {
            config.poll_interval_secs = parse_secs(ENV_POLL_INTERVAL, secs)?;
        }

        Ok(config)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_secs(key: &'static str, value: String) -> Result<u64, ConfigError> {
    let secs: u64 = parse(key, value)?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: secs.to_string(),
            reason: "must be at least one second".to_string(),
        });
    }
    Ok(secs)
}
