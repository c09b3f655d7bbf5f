//! Validating admission webhook for namespace deletion
//!
//! The API server sends every namespace DELETE to this webhook. Deletion is
//! denied while the namespace still holds workload resources, unless an
//! operator has set the bypass annotation on it.

pub mod adjudicator;
pub mod policies;
pub mod review;
mod server;
pub mod tls;

pub use adjudicator::{ADMISSION_PATH, Adjudication, Adjudicator, DECODE_FAILURE_PREFIX};
pub use policies::{BYPASS_ANNOTATION_KEY, BYPASS_ANNOTATION_VALUE, DecisionEngine, Evaluation};
pub use review::{ReviewRequest, ReviewVerdict};
pub use server::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, create_webhook_router,
    run_webhook_server, shutdown,
};
pub use tls::TlsSettings;
