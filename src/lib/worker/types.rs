use std::{collections::VecDeque, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::stats::{megabytes, percent};
use crate::registry::types::Registry;
use crate::tasks::{
    runtime::{Action, Runtime, RuntimeError},
    types::{State, Task},
};

pub struct Worker {
    pub name: String,
    pub(super) queue: VecDeque<Task>,
    pub(super) registry: Registry,
    pub(super) runtime: Arc<dyn Runtime>,
    pub(super) run_timeout: Duration,
    pub(super) stop_timeout: Duration,
}

/// What a single `run_task` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The queue was empty; nothing was attempted.
    Idle,
    /// A pending task was recorded without touching the runtime.
    Admitted { task_id: Uuid },
    Started { task_id: Uuid, container_id: String },
    Stopped { task_id: Uuid, container_id: String },
}

impl RunOutcome {
    pub fn container_id(&self) -> Option<&str> {
        match self {
            RunOutcome::Started { container_id, .. } | RunOutcome::Stopped { container_id, .. } => {
                Some(container_id)
            }
            RunOutcome::Idle | RunOutcome::Admitted { .. } => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("illegal transition for task {id}: {from:?} -> {to:?}")]
    IllegalTransition {
        id: Uuid,
        from: Option<State>,
        to: State,
    },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("{action} timed out after {after:?}")]
    Timeout { action: Action, after: Duration },
}

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Host usage reported by `GET /stats`. Memory figures are MiB.
#[derive(Serialize, Debug)]
pub struct SystemStats {
    #[serde(serialize_with = "percent")]
    pub cpu_usage: f32,
    #[serde(serialize_with = "megabytes")]
    pub total_memory: u64,
    #[serde(serialize_with = "megabytes")]
    pub used_memory: u64,
    #[serde(serialize_with = "megabytes")]
    pub total_swap: u64,
    #[serde(serialize_with = "megabytes")]
    pub used_swap: u64,
    pub system_name: String,
    pub hostname: String,
    pub total_cpus: u64,
    #[serde(serialize_with = "percent")]
    pub disk_usage: f32,
    pub task_count: u64,
}

pub struct TaskServer {
    pub worker: Arc<Mutex<Worker>>,
    pub registry: Registry,
    pub address: String,
    pub port: u16,
    pub(super) sysinfo: Mutex<sysinfo::System>,
}

/// Body returned by the API for rejected requests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
