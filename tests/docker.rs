use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    extract::State as AxumState,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use bollard::{API_DEFAULT_VERSION, Docker};
use tokio::net::TcpListener;

use cube_worker::{
    registry::types::Registry,
    tasks::{
        docker::DockerClient,
        runtime::{Action, Runtime, RuntimeError},
        types::{Config, State, Task},
    },
    worker::types::{Worker, WorkerError},
};

/// Scripted answers for the handful of Engine API calls the client makes.
#[derive(Clone)]
struct Script {
    start: (StatusCode, &'static str),
    start_delay: Duration,
    remove: (StatusCode, &'static str),
    inspect: (StatusCode, &'static str),
}

impl Default for Script {
    fn default() -> Self {
        Script {
            start: (StatusCode::NO_CONTENT, ""),
            start_delay: Duration::ZERO,
            remove: (StatusCode::NO_CONTENT, ""),
            inspect: (StatusCode::OK, r#"{"Id":"c1","State":{"Running":true}}"#),
        }
    }
}

#[derive(Clone)]
struct FakeDaemon {
    script: Script,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeDaemon {
    async fn start(script: Script) -> (DockerClient, FakeDaemon) {
        let daemon = FakeDaemon {
            script,
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new().fallback(handle).with_state(daemon.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let docker =
            Docker::connect_with_http(&format!("http://{addr}"), 10, API_DEFAULT_VERSION).unwrap();
        (DockerClient::with_client(docker), daemon)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn saw(&self, prefix: &str) -> bool {
        self.requests().iter().any(|line| line.starts_with(prefix))
    }

    async fn wait_for(&self, prefix: &str) -> bool {
        for _ in 0..50 {
            if self.saw(prefix) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }
}

fn json(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn handle(AxumState(daemon): AxumState<FakeDaemon>, method: Method, uri: Uri) -> Response {
    // Drop any API version prefix so routes read like the Engine docs.
    let full = uri.path();
    let path = full
        .find("/containers")
        .or_else(|| full.find("/images"))
        .map_or(full, |i| &full[i..])
        .to_string();
    let line = match uri.query() {
        Some(query) => format!("{method} {path}?{query}"),
        None => format!("{method} {path}"),
    };
    daemon.requests.lock().unwrap().push(line);

    let script = &daemon.script;
    match method {
        Method::POST if path == "/images/create" => {
            json(StatusCode::OK, r#"{"status":"Downloaded newer image"}"#)
        }
        Method::POST if path == "/containers/create" => {
            json(StatusCode::CREATED, r#"{"Id":"abc","Warnings":[]}"#)
        }
        Method::POST if path.ends_with("/start") => {
            tokio::time::sleep(script.start_delay).await;
            json(script.start.0, script.start.1)
        }
        Method::POST if path.ends_with("/stop") => json(StatusCode::NO_CONTENT, ""),
        Method::GET if path.ends_with("/json") => json(script.inspect.0, script.inspect.1),
        Method::DELETE => json(script.remove.0, script.remove.1),
        _ => json(StatusCode::NOT_FOUND, r#"{"message":"page not found"}"#),
    }
}

fn web_config() -> Config {
    Config {
        name: "web".into(),
        image: "strm/helloworld-http".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn run_creates_and_starts_container() {
    let (client, daemon) = FakeDaemon::start(Script::default()).await;

    let container_id = client.run(&web_config()).await.unwrap();

    assert_eq!(container_id, "abc");
    assert!(daemon.saw("POST /images/create"));
    assert!(daemon.saw("POST /containers/create"));
    assert!(daemon.saw("POST /containers/abc/start"));
    assert!(!daemon.saw("DELETE"));
}

#[tokio::test]
async fn start_failure_removes_created_container() {
    let (client, daemon) = FakeDaemon::start(Script {
        start: (
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"message":"port is already allocated"}"#,
        ),
        ..Default::default()
    })
    .await;

    let err = client.run(&web_config()).await.unwrap_err();

    assert_eq!(err, RuntimeError::Start("port is already allocated".into()));
    let removal = daemon
        .requests()
        .into_iter()
        .find(|line| line.starts_with("DELETE /containers/abc"))
        .expect("container removed");
    assert!(removal.contains("force=true"));
}

#[tokio::test]
async fn start_failure_reports_cleanup_failure_too() {
    let (client, _daemon) = FakeDaemon::start(Script {
        start: (
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"message":"port is already allocated"}"#,
        ),
        remove: (
            StatusCode::CONFLICT,
            r#"{"message":"removal of container abc is already in progress"}"#,
        ),
        ..Default::default()
    })
    .await;

    let err = client.run(&web_config()).await.unwrap_err();

    assert_eq!(
        err,
        RuntimeError::StartCleanup {
            start: "port is already allocated".into(),
            cleanup: "removal of container abc is already in progress".into(),
        }
    );
}

#[tokio::test]
async fn stop_running_container_stops_and_removes() {
    let (client, daemon) = FakeDaemon::start(Script::default()).await;

    client.stop("c1").await.unwrap();

    assert!(daemon.saw("GET /containers/c1/json"));
    assert!(daemon.saw("POST /containers/c1/stop"));
    assert!(daemon.saw("DELETE /containers/c1"));
}

#[tokio::test]
async fn stop_on_stopped_container_is_an_error() {
    let (client, daemon) = FakeDaemon::start(Script {
        inspect: (StatusCode::OK, r#"{"Id":"c1","State":{"Running":false}}"#),
        ..Default::default()
    })
    .await;

    let err = client.stop("c1").await.unwrap_err();

    assert_eq!(
        err,
        RuntimeError::AlreadyStopped("container c1 is already stopped".into())
    );
    assert!(!daemon.saw("POST /containers/c1/stop"));
    assert!(!daemon.saw("DELETE"));
}

#[tokio::test]
async fn stop_on_unknown_container_is_not_found() {
    let (client, daemon) = FakeDaemon::start(Script {
        inspect: (StatusCode::NOT_FOUND, r#"{"message":"No such container: c1"}"#),
        ..Default::default()
    })
    .await;

    let err = client.stop("c1").await.unwrap_err();

    assert_eq!(err, RuntimeError::NotFound("No such container: c1".into()));
    assert!(!daemon.saw("POST /containers/c1/stop"));
}

#[tokio::test]
async fn run_timeout_removes_late_container() {
    let (client, daemon) = FakeDaemon::start(Script {
        start_delay: Duration::from_secs(1),
        ..Default::default()
    })
    .await;
    let registry = Registry::new();
    let mut worker = Worker::new("docker-test", Arc::new(client), registry.clone())
        .with_timeouts(Duration::from_millis(200), Duration::from_secs(5));
    let task = Task::new("web", "strm/helloworld-http").with_state(State::Scheduled);
    let id = task.id;

    worker.add_task(task);
    let err = worker.run_task().await.unwrap_err();

    assert_eq!(
        err,
        WorkerError::Timeout {
            action: Action::Run,
            after: Duration::from_millis(200)
        }
    );
    let failed = registry.get(&id).await.unwrap();
    assert_eq!(failed.state, State::Failed);
    assert!(failed.container_id.is_none());
    assert!(daemon.wait_for("DELETE /containers/abc").await);
}
