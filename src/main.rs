use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cube_worker::{
    config::types::WorkerConfig,
    registry::types::Registry,
    tasks::docker::DockerClient,
    worker::{
        types::{TaskServer, Worker},
        worker::run_tasks,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env().context("loading worker config")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let runtime = Arc::new(DockerClient::new().context("connecting to docker")?);
    let registry = Registry::new();
    let worker = Arc::new(Mutex::new(Worker::from_config(
        &config,
        runtime,
        registry.clone(),
    )));
    let server = TaskServer::new(worker.clone(), registry, &config.address, config.port);

    info!(worker = %config.name, address = %config.bind_address(), "starting worker");

    let loop_handle = tokio::spawn(run_tasks(worker, config.poll_interval()));

    tokio::select! {
        result = server.start_server() => {
            if let Err(err) = &result {
                error!(error = %err, "worker API stopped");
            }
            result.context("serving worker API")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    loop_handle.abort();
    Ok(())
}
