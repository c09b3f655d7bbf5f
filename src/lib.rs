//! namespace-guard: a validating admission webhook that refuses to delete
//! Kubernetes namespaces which still contain workload resources.

pub mod config;
pub mod error;
pub mod health;
pub mod resources;
pub mod telemetry;
pub mod webhooks;

pub use config::Config;
pub use error::{Error, Result};
pub use health::{HealthState, Metrics};
pub use webhooks::{
    ADMISSION_PATH, Adjudication, Adjudicator, BYPASS_ANNOTATION_KEY, DecisionEngine, Evaluation,
    ReviewRequest, ReviewVerdict, TlsSettings, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
    WebhookError, run_webhook_server,
};
