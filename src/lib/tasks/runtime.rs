use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use super::types::Config;

/// The container engine seen from the worker: start one container, stop one.
///
/// Implementations are not required to be idempotent. The worker makes
/// sure it never asks for a second `run` of a task it believes is running.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Creates and starts exactly one container, returning its id.
    ///
    /// On error no container created by this call is left behind.
    async fn run(&self, config: &Config) -> Result<String, RuntimeError>;

    /// Stops a container previously returned by [`Runtime::run`].
    ///
    /// Stopping an unknown or already stopped container is an error.
    async fn stop(&self, container_id: &str) -> Result<(), RuntimeError>;
}

/// Errors reported by a [`Runtime`]. Daemon messages are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("invalid container config: {0}")]
    InvalidSpec(String),

    #[error("{0}")]
    Connect(String),

    #[error("{0}")]
    Pull(String),

    #[error("{0}")]
    Create(String),

    #[error("{0}")]
    Start(String),

    #[error("{start} (cleanup also failed: {cleanup})")]
    StartCleanup { start: String, cleanup: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyStopped(String),

    #[error("{0}")]
    Stop(String),

    #[error("{0}")]
    Remove(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Run,
    Stop,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Run => write!(f, "run"),
            Action::Stop => write!(f, "stop"),
        }
    }
}
