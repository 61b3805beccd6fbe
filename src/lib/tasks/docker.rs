use async_trait::async_trait;
use bollard::{
    Docker,
    container::{
        CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
        StartContainerOptions,
    },
    errors::Error as DockerError,
    image::CreateImageOptions,
    models::{HostConfig, RestartPolicy, RestartPolicyNameEnum},
};
use futures_util::stream::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::runtime::{Runtime, RuntimeError};
use super::types::Config;

/// [`Runtime`] backed by a Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerClient {
    client: Docker,
}

impl DockerClient {
    /// Connects using `DOCKER_HOST` or the platform's default socket.
    pub fn new() -> Result<Self, RuntimeError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Connect(daemon_message(&e)))?;
        Ok(DockerClient { client })
    }

    pub fn with_client(client: Docker) -> Self {
        DockerClient { client }
    }

    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        let reference = image_with_tag(image);
        info!(image = %reference, "pulling image");

        let mut stream = self.client.create_image(
            Some(CreateImageOptions {
                from_image: reference.clone(),
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(msg) = stream.next().await {
            match msg {
                Ok(progress) => {
                    if let Some(status) = progress.status {
                        debug!(image = %reference, %status, "pull progress");
                    }
                }
                Err(e) => {
                    warn!(image = %reference, error = %e, "image pull failed");
                    return Err(RuntimeError::Pull(daemon_message(&e)));
                }
            }
        }

        Ok(())
    }

    async fn remove(&self, container_id: &str) -> Result<(), DockerError> {
        self.client
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
    }

    /// Removes a container nobody is waiting for any more.
    async fn discard(&self, container_id: &str) {
        warn!(%container_id, "run abandoned by caller, removing container");
        if let Err(e) = self.remove(container_id).await {
            warn!(%container_id, error = %e, "abandoned container remove failed");
        }
    }

    async fn create_and_start(
        &self,
        config: &Config,
        tx: &oneshot::Sender<Result<String, RuntimeError>>,
    ) -> Result<String, RuntimeError> {
        self.pull(&config.image).await?;

        let options = Some(CreateContainerOptions {
            name: config.name.clone(),
            ..Default::default()
        });

        let container_id = match self
            .client
            .create_container(options, container_config(config))
            .await
        {
            Ok(resp) => {
                info!(container_id = %resp.id, name = %config.name, "container created");
                resp.id
            }
            Err(e) => {
                warn!(name = %config.name, error = %e, "container create failed");
                return Err(RuntimeError::Create(daemon_message(&e)));
            }
        };

        // Caller gave up while the container was being created.
        if tx.is_closed() {
            return Ok(container_id);
        }

        if let Err(e) = self
            .client
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
        {
            let start = daemon_message(&e);
            warn!(%container_id, error = %start, "container start failed, removing it");
            return match self.remove(&container_id).await {
                Ok(()) => Err(RuntimeError::Start(start)),
                Err(cleanup) => Err(RuntimeError::StartCleanup {
                    start,
                    cleanup: daemon_message(&cleanup),
                }),
            };
        }

        info!(%container_id, name = %config.name, "container started");
        Ok(container_id)
    }
}

#[async_trait]
impl Runtime for DockerClient {
    /// Creates and starts the container on a detached task.
    ///
    /// If the caller stops waiting (a deadline dropping this future), the
    /// detached task removes whatever container it ends up creating.
    async fn run(&self, config: &Config) -> Result<String, RuntimeError> {
        if config.image.trim().is_empty() {
            return Err(RuntimeError::InvalidSpec("image must not be empty".into()));
        }

        let (tx, rx) = oneshot::channel();
        let client = self.clone();
        let config = config.clone();
        tokio::spawn(async move {
            let result = client.create_and_start(&config, &tx).await;
            if let Err(Ok(container_id)) = tx.send(result) {
                client.discard(&container_id).await;
            }
        });

        PendingRun {
            rx,
            client: self.clone(),
            done: false,
        }
        .wait()
        .await
    }

    async fn stop(&self, container_id: &str) -> Result<(), RuntimeError> {
        let inspect = self
            .client
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| stop_error(&e))?;
        let running = inspect
            .state
            .and_then(|state| state.running)
            .unwrap_or(false);
        if !running {
            warn!(%container_id, "container is not running");
            return Err(RuntimeError::AlreadyStopped(format!(
                "container {container_id} is already stopped"
            )));
        }

        info!(%container_id, "stopping container");
        if let Err(e) = self.client.stop_container(container_id, None).await {
            warn!(%container_id, error = %e, "container stop failed");
            return Err(stop_error(&e));
        }

        if let Err(e) = self.remove(container_id).await {
            warn!(%container_id, error = %e, "container remove failed");
            return Err(RuntimeError::Remove(daemon_message(&e)));
        }

        info!(%container_id, "container stopped and removed");
        Ok(())
    }
}

/// Receiving end of a detached run.
///
/// Dropped before a result arrived, it closes the channel so a late
/// success is routed to cleanup instead of being lost.
struct PendingRun {
    rx: oneshot::Receiver<Result<String, RuntimeError>>,
    client: DockerClient,
    done: bool,
}

impl PendingRun {
    async fn wait(mut self) -> Result<String, RuntimeError> {
        let result = (&mut self.rx)
            .await
            .unwrap_or_else(|_| Err(RuntimeError::Start("run task ended without a result".into())));
        self.done = true;
        result
    }
}

impl Drop for PendingRun {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.rx.close();
        if let Ok(Ok(container_id)) = self.rx.try_recv() {
            let client = self.client.clone();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { client.discard(&container_id).await });
            }
        }
    }
}

fn container_config(config: &Config) -> bollard::container::Config<String> {
    let host_config = HostConfig {
        restart_policy: Some(RestartPolicy {
            name: Some(restart_policy(&config.restart_policy)),
            maximum_retry_count: None,
        }),
        memory: (config.memory > 0).then_some(config.memory),
        nano_cpus: (config.cpu > 0.0).then(|| (config.cpu * 1_000_000_000.0) as i64),
        ..Default::default()
    };

    bollard::container::Config {
        image: Some(config.image.clone()),
        env: (!config.env.is_empty()).then(|| config.env.clone()),
        cmd: (!config.cmd.is_empty()).then(|| config.cmd.clone()),
        host_config: Some(host_config),
        ..Default::default()
    }
}

fn restart_policy(name: &str) -> RestartPolicyNameEnum {
    match name {
        "always" => RestartPolicyNameEnum::ALWAYS,
        "unless-stopped" => RestartPolicyNameEnum::UNLESS_STOPPED,
        "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
        _ => RestartPolicyNameEnum::NO,
    }
}

/// Pins untagged references to `latest`; an empty tag would pull every tag.
fn image_with_tag(image: &str) -> String {
    let last = image.rsplit('/').next().unwrap_or(image);
    if last.contains(':') || last.contains('@') {
        image.to_string()
    } else {
        format!("{image}:latest")
    }
}

fn daemon_message(err: &DockerError) -> String {
    match err {
        DockerError::DockerResponseServerError { message, .. } if !message.is_empty() => {
            message.clone()
        }
        DockerError::DockerStreamError { error } => error.clone(),
        other => other.to_string(),
    }
}

fn stop_error(err: &DockerError) -> RuntimeError {
    match err {
        DockerError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(daemon_message(err)),
        _ => RuntimeError::Stop(daemon_message(err)),
    }
}
