//! TLS configuration for the webhook listener
//!
//! The API server always talks to admission webhooks over TLS. When client
//! authentication is enabled the listener also requires a client certificate
//! signed by the cluster CA.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::RootCertStore;
use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;

use super::server::WebhookError;

/// Where to find the serving certificate and, optionally, the client CA
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    /// Require and verify client certificates against this CA bundle
    pub client_ca_file: Option<PathBuf>,
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, WebhookError> {
    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
        .map_err(|e| WebhookError::TlsConfig(format!("{}: {}", path.display(), e)))?;
    if certs.is_empty() {
        return Err(WebhookError::TlsConfig(format!(
            "{}: no certificates found",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, WebhookError> {
    PrivateKeyDer::from_pem_file(path)
        .map_err(|e| WebhookError::TlsConfig(format!("{}: {}", path.display(), e)))
}

/// Build the rustls server configuration
pub fn load_server_config(settings: &TlsSettings) -> Result<Arc<ServerConfig>, WebhookError> {
    let certs = load_certs(&settings.cert_file)?;
    let key = load_key(&settings.key_file)?;

    let builder = match &settings.client_ca_file {
        Some(ca_file) => {
            let mut roots = RootCertStore::empty();
            let (added, ignored) = roots.add_parsable_certificates(load_certs(ca_file)?);
            tracing::debug!(added, ignored, ca_file = %ca_file.display(), "Loaded client CA bundle");
            let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                .build()
                .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;
            ServerConfig::builder().with_client_cert_verifier(verifier)
        }
        None => ServerConfig::builder().with_no_client_auth(),
    };

    let mut config = builder
        .with_single_cert(certs, key)
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
