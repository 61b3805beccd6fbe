use axum::{
    Json, Router,
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use sysinfo::System;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::stats::get_stats;
use super::types::{ErrorResponse, TaskServer, Worker};
use crate::registry::types::Registry;
use crate::tasks::types::{State, Task, TaskEvent};

impl TaskServer {
    pub fn new(worker: Arc<Mutex<Worker>>, registry: Registry, address: &str, port: u16) -> Self {
        Self {
            worker,
            registry,
            address: address.to_string(),
            port,
            sysinfo: Mutex::new(System::new()),
        }
    }

    async fn get_tasks(AxumState(server): AxumState<Arc<TaskServer>>) -> Json<Vec<Task>> {
        Json(server.registry.list().await)
    }

    async fn start_task(
        AxumState(server): AxumState<Arc<TaskServer>>,
        Json(task_event): Json<TaskEvent>,
    ) -> impl IntoResponse {
        let event_id = task_event.id;
        let task = task_event.into_task();
        info!(%event_id, task_id = %task.id, state = ?task.state, "task event received");
        server.worker.lock().await.add_task(task.clone());
        (StatusCode::CREATED, Json(task))
    }

    async fn stop_task(
        AxumState(server): AxumState<Arc<TaskServer>>,
        Path(id): Path<Uuid>,
    ) -> Response {
        let Some(task) = server.registry.get(&id).await else {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    message: format!("Task with id {} not found", id),
                }),
            )
                .into_response();
        };

        server
            .worker
            .lock()
            .await
            .add_task(task.with_state(State::Completed));
        info!(task_id = %id, "task queued to stop");
        StatusCode::NO_CONTENT.into_response()
    }

    async fn get_stats(AxumState(server): AxumState<Arc<TaskServer>>) -> impl IntoResponse {
        let running = server.registry.count_in(State::Running).await as u64;
        let mut sysinfo = server.sysinfo.lock().await;
        sysinfo.refresh_all();
        Json(get_stats(&sysinfo, running))
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route(
                "/tasks",
                get(TaskServer::get_tasks).post(TaskServer::start_task),
            )
            .route("/tasks/{id}", axum::routing::delete(TaskServer::stop_task))
            .route("/stats", get(TaskServer::get_stats))
            .with_state(self)
    }

    pub async fn start_server(self) -> std::io::Result<()> {
        let address = format!("{}:{}", self.address, self.port);
        let app = Arc::new(self).router();

        let listener = TcpListener::bind(&address).await?;
        info!(%address, "worker API listening");
        axum::serve(listener, app).await
    }
}
