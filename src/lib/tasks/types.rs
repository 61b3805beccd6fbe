use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
}

/// A unit of work: one container the worker should bring up or tear down.
///
/// `state` on a queued record is the state the caller asks for; the copy
/// kept in the registry is the last state the worker observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub container_id: Option<String>,
    pub name: String,
    pub state: State,
    pub image: String,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub memory: i64,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub restart_policy: String,
    #[serde(default)]
    pub start_time: Option<SystemTime>,
    #[serde(default)]
    pub finish_time: Option<SystemTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: Uuid,
    pub state: State,
    pub timestamp: Option<SystemTime>,
    pub task: Task,
}

/// What the runtime needs to create a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub cpu: f64,
    pub memory: i64,
    pub restart_policy: String,
}

pub fn new_config(task: &Task) -> Config {
    Config {
        name: task.name.clone(),
        image: task.image.clone(),
        env: task.env.clone(),
        cpu: task.cpu,
        memory: task.memory,
        restart_policy: task.restart_policy.clone(),
        ..Default::default()
    }
}

impl Task {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Task {
            id: Uuid::new_v4(),
            container_id: None,
            name: name.into(),
            state: State::Pending,
            image: image.into(),
            env: Vec::new(),
            memory: 0,
            cpu: 0.0,
            restart_policy: String::new(),
            start_time: None,
            finish_time: None,
        }
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }
}

impl TaskEvent {
    pub fn new(state: State, task: Task) -> Self {
        TaskEvent {
            id: Uuid::new_v4(),
            state,
            timestamp: Some(SystemTime::now()),
            task,
        }
    }

    /// The record the worker should queue: the task carrying the event's state.
    pub fn into_task(self) -> Task {
        Task {
            state: self.state,
            ..self.task
        }
    }
}
