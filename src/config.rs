//! Command line and environment configuration

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use crate::error::{Error, Result};
use crate::webhooks::{TlsSettings, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT};

/// Default port for the health and metrics listener
pub const HEALTH_PORT: u16 = 8080;
/// CA that signs the API server's client certificate inside a pod
pub const CLIENT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Validating admission webhook that blocks deletion of non-empty namespaces
#[derive(Parser, Debug, Clone)]
#[command(name = "namespace-guard", version)]
pub struct Config {
    /// HTTPS port for admission reviews
    #[arg(long, env = "NAMESPACE_GUARD_PORT", default_value_t = WEBHOOK_PORT)]
    pub port: u16,

    /// Plain HTTP port for /healthz, /readyz and /metrics
    #[arg(long, env = "NAMESPACE_GUARD_HEALTH_PORT", default_value_t = HEALTH_PORT)]
    pub health_port: u16,

    /// Serving certificate (PEM)
    #[arg(long, env = "NAMESPACE_GUARD_CERT_FILE", default_value = WEBHOOK_CERT_PATH)]
    pub cert_file: PathBuf,

    /// Serving private key (PEM)
    #[arg(long, env = "NAMESPACE_GUARD_KEY_FILE", default_value = WEBHOOK_KEY_PATH)]
    pub key_file: PathBuf,

    /// CA bundle that signs the API server's client certificate
    #[arg(long, env = "NAMESPACE_GUARD_CLIENT_CA_FILE", default_value = CLIENT_CA_PATH)]
    pub client_ca_file: PathBuf,

    /// Require and verify client certificates during the TLS handshake
    #[arg(long, env = "NAMESPACE_GUARD_CLIENT_AUTH")]
    pub client_auth: bool,

    /// Admit every namespace deletion without validation
    #[arg(long, env = "NAMESPACE_GUARD_ADMIT_ALL")]
    pub admit_all: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "NAMESPACE_GUARD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Also write logs to this file, rotated daily
    #[arg(long, env = "NAMESPACE_GUARD_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Check settings clap cannot check on its own
    pub fn validate(&self) -> Result<()> {
        if self.port == self.health_port {
            return Err(Error::InvalidConfig(format!(
                "webhook port and health port must differ (both are {})",
                self.port
            )));
        }
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("unknown log level '{}'", self.log_level)))
    }

    pub fn tls_settings(&self) -> TlsSettings {
        TlsSettings {
            cert_file: self.cert_file.clone(),
            key_file: self.key_file.clone(),
            client_ca_file: self.client_auth.then(|| self.client_ca_file.clone()),
        }
    }
}
