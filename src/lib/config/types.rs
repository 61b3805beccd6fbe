use thiserror::Error;

/// Worker settings. Durations are whole seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub name: String,
    pub address: String,
    pub port: u16,
    /// Deadline for pulling, creating and starting a container.
    pub run_timeout_secs: u64,
    /// Deadline for stopping and removing a container.
    pub stop_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Fallback filter when `RUST_LOG` is unset.
    pub log_level: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
