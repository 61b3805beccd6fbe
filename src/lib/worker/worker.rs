use std::{future::Future, sync::Arc, time::Duration, time::SystemTime};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::types::{RunOutcome, Worker, WorkerError, WorkerResult};
use crate::config::types::WorkerConfig;
use crate::registry::types::Registry;
use crate::tasks::{
    runtime::{Action, Runtime, RuntimeError},
    state::valid_state_transition,
    types::{State, Task, new_config},
};

impl Worker {
    pub fn new(name: &str, runtime: Arc<dyn Runtime>, registry: Registry) -> Self {
        let defaults = WorkerConfig::default();
        Worker {
            name: name.to_string(),
            queue: std::collections::VecDeque::new(),
            registry,
            runtime,
            run_timeout: defaults.run_timeout(),
            stop_timeout: defaults.stop_timeout(),
        }
    }

    pub fn from_config(
        config: &WorkerConfig,
        runtime: Arc<dyn Runtime>,
        registry: Registry,
    ) -> Self {
        Worker::new(&config.name, runtime, registry)
            .with_timeouts(config.run_timeout(), config.stop_timeout())
    }

    pub fn with_timeouts(mut self, run: Duration, stop: Duration) -> Self {
        self.run_timeout = run;
        self.stop_timeout = stop;
        self
    }

    /// Queues `task` as a request to move it to `task.state`.
    pub fn add_task(&mut self, task: Task) {
        debug!(worker = %self.name, task_id = %task.id, state = ?task.state, "task queued");
        self.queue.push_back(task);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn get_tasks(&self) -> Vec<Task> {
        self.registry.list().await
    }

    /// Takes the oldest queued record and reconciles it with the registry.
    ///
    /// A `Scheduled` record starts a container, a `Completed` record stops
    /// the container the registry holds for a running task, and a `Pending`
    /// record is only recorded. Any other combination is rejected with
    /// [`WorkerError::IllegalTransition`] before the runtime is called and
    /// leaves the registry as it was.
    pub async fn run_task(&mut self) -> WorkerResult<RunOutcome> {
        let Some(queued) = self.queue.pop_front() else {
            debug!(worker = %self.name, "no tasks in queue");
            return Ok(RunOutcome::Idle);
        };

        let persisted = self.registry.get(&queued.id).await;
        let from = persisted.as_ref().map(|task| task.state);

        let legal = match (&persisted, queued.state) {
            (_, State::Running | State::Failed) => false,
            (None, requested) => requested != State::Completed,
            (Some(prior), State::Completed) => {
                valid_state_transition(&prior.state, &State::Completed)
                    && prior.container_id.is_some()
            }
            (Some(prior), requested) => valid_state_transition(&prior.state, &requested),
        };

        if !legal {
            warn!(
                worker = %self.name,
                task_id = %queued.id,
                from = ?from,
                to = ?queued.state,
                "illegal state transition"
            );
            return Err(WorkerError::IllegalTransition {
                id: queued.id,
                from,
                to: queued.state,
            });
        }

        match (queued.state, persisted) {
            (State::Scheduled, _) => self.start_task(queued).await,
            (State::Completed, Some(prior)) => self.stop_task(prior).await,
            _ => {
                let task_id = queued.id;
                self.registry
                    .put(Task {
                        container_id: None,
                        ..queued
                    })
                    .await;
                info!(worker = %self.name, %task_id, "task admitted");
                Ok(RunOutcome::Admitted { task_id })
            }
        }
    }

    async fn start_task(&mut self, mut task: Task) -> WorkerResult<RunOutcome> {
        let config = new_config(&task);
        info!(worker = %self.name, task_id = %task.id, image = %task.image, "starting task");

        let result = deadline(Action::Run, self.run_timeout, self.runtime.run(&config)).await;

        match result {
            Ok(container_id) => {
                task.state = State::Running;
                task.container_id = Some(container_id.clone());
                task.start_time = Some(SystemTime::now());
                task.finish_time = None;
                let task_id = task.id;
                self.registry.put(task).await;

                info!(worker = %self.name, %task_id, %container_id, "task running");
                Ok(RunOutcome::Started {
                    task_id,
                    container_id,
                })
            }
            Err(err) => {
                task.state = State::Failed;
                task.container_id = None;
                task.finish_time = Some(SystemTime::now());
                error!(
                    worker = %self.name,
                    task_id = %task.id,
                    error = %err,
                    "task failed to start"
                );
                self.registry.put(task).await;
                Err(err)
            }
        }
    }

    /// Stops the container recorded for `task`. On failure the container id
    /// stays on the failed record for inspection.
    async fn stop_task(&mut self, mut task: Task) -> WorkerResult<RunOutcome> {
        let Some(container_id) = task.container_id.clone() else {
            return Err(WorkerError::IllegalTransition {
                id: task.id,
                from: Some(task.state),
                to: State::Completed,
            });
        };
        info!(worker = %self.name, task_id = %task.id, %container_id, "stopping task");

        let result =
            deadline(Action::Stop, self.stop_timeout, self.runtime.stop(&container_id)).await;

        task.finish_time = Some(SystemTime::now());
        match result {
            Ok(()) => {
                task.state = State::Completed;
                let task_id = task.id;
                self.registry.put(task).await;

                info!(worker = %self.name, %task_id, %container_id, "task completed");
                Ok(RunOutcome::Stopped {
                    task_id,
                    container_id,
                })
            }
            Err(err) => {
                task.state = State::Failed;
                error!(
                    worker = %self.name,
                    task_id = %task.id,
                    %container_id,
                    error = %err,
                    "task failed to stop"
                );
                self.registry.put(task).await;
                Err(err)
            }
        }
    }
}

async fn deadline<T, F>(action: Action, after: Duration, fut: F) -> WorkerResult<T>
where
    F: Future<Output = Result<T, RuntimeError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(WorkerError::from),
        Err(_) => Err(WorkerError::Timeout { action, after }),
    }
}

/// Drains the worker's queue forever, sleeping `poll_interval` when it is empty.
pub async fn run_tasks(worker: Arc<Mutex<Worker>>, poll_interval: Duration) {
    loop {
        let mut guard = worker.lock().await;
        if guard.queue_len() == 0 {
            drop(guard);
            tokio::time::sleep(poll_interval).await;
            continue;
        }

        match guard.run_task().await {
            Ok(outcome) => debug!(worker = %guard.name, ?outcome, "task processed"),
            Err(err) => warn!(worker = %guard.name, error = %err, "task not processed"),
        }
    }
}
