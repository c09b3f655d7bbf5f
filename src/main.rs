use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::Client;
use tokio::signal;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use namespace_guard::health::run_health_server;
use namespace_guard::webhooks::shutdown;
use namespace_guard::{Adjudicator, Config, HealthState, run_webhook_server, telemetry};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Grace period for in-flight admission reviews to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::parse();
    config.validate()?;

    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    let _log_guard = telemetry::init_logging(&config)?;

    info!("Starting namespace-guard");

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    if config.admit_all {
        warn!("admit-all is enabled, every namespace deletion will be allowed without validation");
    }

    let health_state = Arc::new(HealthState::new());
    let adjudicator = Arc::new(
        Adjudicator::for_cluster(client)
            .with_admit_all(config.admit_all)
            .with_health_state(health_state.clone()),
    );

    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move { run_health_server(health_state, port).await })
    };

    let server_handle = axum_server::Handle::new();
    let webhook_handle = {
        let tls = config.tls_settings();
        let port = config.port;
        let server_handle = server_handle.clone();
        let health_state = health_state.clone();
        tokio::spawn(async move {
            run_webhook_server(adjudicator, &tls, port, server_handle, Some(health_state)).await
        })
    };

    tokio::select! {
        result = webhook_handle => return server_exit("Webhook server", result),
        result = health_handle => return server_exit("Health server", result),
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            let grace = Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS);
            shutdown(&server_handle, grace);
            info!(
                "Waiting {}s for in-flight admission reviews to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(grace).await;
        }
    }

    info!("namespace-guard stopped");
    Ok(())
}

/// Turn a server task that stopped on its own into a process error
fn server_exit<E>(name: &str, result: Result<Result<(), E>, JoinError>) -> Result<(), BoxError>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match result {
        Ok(Ok(())) => {
            error!("{} stopped unexpectedly", name);
            Err(format!("{} stopped unexpectedly", name).into())
        }
        Ok(Err(e)) => {
            error!("{} error: {}", name, e);
            Err(Box::new(e))
        }
        Err(e) => {
            error!("{} task failed: {}", name, e);
            Err(Box::new(e))
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
