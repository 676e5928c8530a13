//! Swarm Scaler - autoscaler for Docker Swarm services
//!
//! Runs next to a swarm manager, watches the resource usage of managed
//! services and toggles node labels so the swarm scheduler places or
//! removes replicas.

use anyhow::Result;
use scaler_lib::{
    health::{components, HealthRegistry},
    observability::{ScalerMetrics, StructuredLogger},
    DecisionLog, DockerProvider, FilePolicyProvider, Supervisor,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SCALER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting swarm-scaler");

    let config = config::ScalerConfig::load()?;
    info!(
        node_name = %config.node_name,
        docker_url = %config.docker_url,
        policy_path = %config.policy_path.display(),
        "Scaler configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SNAPSHOT).await;
    health_registry.register(components::POLICIES).await;
    health_registry.register(components::SCALER).await;

    let metrics = ScalerMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(
        SCALER_VERSION,
        &config.docker_url,
        &config.policy_path.display().to_string(),
    );

    let provider = Arc::new(DockerProvider::new(config.docker_config())?);
    let policies = Arc::new(FilePolicyProvider::new(&config.policy_path));
    let decisions = DecisionLog::new();

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        decisions.clone(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let supervisor = Supervisor::builder()
        .cluster(provider)
        .policies(policies)
        .settings(config.reconciler_settings())
        .health(health_registry)
        .decision_log(decisions)
        .logger(logger.clone())
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let reconciler_handle = tokio::spawn(supervisor.run(shutdown_rx));

    let reason = shutdown_signal().await?;
    logger.log_shutdown(reason);

    // Ignore send errors: the supervisor may already have stopped
    let _ = shutdown_tx.send(());
    if let Err(e) = reconciler_handle.await {
        error!(error = %e, "Reconciliation task ended abnormally");
    }
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                Ok("SIGINT received")
            }
            _ = terminate.recv() => Ok("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("SIGINT received")
    }
}
