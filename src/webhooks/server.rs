//! Webhook HTTP server
//!
//! Every path except `/status.html` is handed to the [`Adjudicator`], which
//! owns method and path validation so that wrong requests get the same
//! answers regardless of the HTTP framework in front of it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use axum::routing::any;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tracing::{debug, info};

use super::adjudicator::Adjudicator;
use super::tls::{TlsSettings, load_server_config};
use crate::health::HealthState;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("Webhook server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Create the webhook router
pub fn create_webhook_router(adjudicator: Arc<Adjudicator>) -> Router {
    Router::new()
        .route("/status.html", any(status))
        .fallback(admit)
        .with_state(adjudicator)
}

/// Always-healthy status page, for any method
async fn status(uri: Uri) -> impl IntoResponse {
    debug!(path = %uri.path(), "Serving status request");
    (StatusCode::OK, "OK")
}

async fn admit(
    State(adjudicator): State<Arc<Adjudicator>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> impl IntoResponse {
    debug!(method = %method, path = %uri.path(), "Serving webhook request");
    adjudicator.adjudicate(&method, uri.path(), &body).await
}

/// Run the webhook server with TLS
///
/// Binds to `0.0.0.0:<port>`. Readiness is flipped on only once the listener
/// is bound. The `handle` can be used to shut the listener down gracefully.
pub async fn run_webhook_server(
    adjudicator: Arc<Adjudicator>,
    tls: &TlsSettings,
    port: u16,
    handle: Handle,
    health_state: Option<Arc<HealthState>>,
) -> Result<(), WebhookError> {
    let app = create_webhook_router(adjudicator);

    let config = RustlsConfig::from_config(load_server_config(tls)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server = axum_server::bind_rustls(addr, config)
        .handle(handle.clone())
        .serve(app.into_make_service());

    let mark_ready = async {
        if let Some(bound) = handle.listening().await {
            info!(
                client_auth = tls.client_ca_file.is_some(),
                "Webhook server listening on {} with TLS", bound
            );
            if let Some(state) = &health_state {
                state.set_ready(true).await;
            }
        }
    };

    let (served, ()) = tokio::join!(server, mark_ready);
    served?;

    Ok(())
}

/// Stop accepting connections and give in-flight reviews `grace` to finish
pub fn shutdown(handle: &Handle, grace: Duration) {
    handle.graceful_shutdown(Some(grace));
}
