//! Admission request adjudication
//!
//! Requests pass through an ordered series of gates. The first gate that
//! reaches a decision ends the review:
//!
//! 1. method must be POST
//! 2. path must be [`ADMISSION_PATH`]
//! 3. body must decode into an AdmissionReview
//! 4. admit-all short-circuits to allowed
//! 5. resource must be core/v1 namespaces
//! 6. operation must be DELETE
//! 7. a namespace that no longer exists is allowed
//! 8. the bypass annotation allows
//! 9. otherwise the workload count decides

use std::sync::Arc;
use std::time::Instant;

use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, warn};

use super::policies::{BYPASS_ANNOTATION_KEY, BYPASS_ANNOTATION_VALUE, DecisionEngine, Evaluation};
use super::review::{
    ADMISSION_API_VERSION, AdmissionReviewResponse, GroupVersionResource, Operation,
    ReviewRequest, ReviewVerdict,
};
use crate::health::HealthState;
use crate::resources::{ApiNamespaceLookup, NamespaceLookup, workload_queries};

/// The only path admission reviews are accepted on
pub const ADMISSION_PATH: &str = "/";
/// Prefix of the reason returned for undecodable request bodies
pub const DECODE_FAILURE_PREFIX: &str =
    "Failed to decode the request body json into an AdmissionReview resource: ";

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// HTTP response produced for one inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjudication {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Adjudication {
    fn text(status: StatusCode, message: String) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_TEXT,
            body: message.into_bytes(),
        }
    }

    fn review(status: StatusCode, review: &AdmissionReviewResponse) -> Self {
        match serde_json::to_vec(review) {
            Ok(body) => Self {
                status,
                content_type: CONTENT_TYPE_JSON,
                body,
            },
            Err(e) => {
                error!(error = %e, "Failed to encode admission review response");
                Self::text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!(
                        "Error occurred while encoding the admission review status into json: {}",
                        e
                    ),
                )
            }
        }
    }

    /// Decode the body as a review response
    pub fn decode_review(&self) -> serde_json::Result<AdmissionReviewResponse> {
        serde_json::from_slice(&self.body)
    }
}

impl IntoResponse for Adjudication {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}

/// Decides namespace deletion requests
pub struct Adjudicator {
    namespaces: Arc<dyn NamespaceLookup>,
    engine: DecisionEngine,
    admit_all: bool,
    health_state: Option<Arc<HealthState>>,
}

impl Adjudicator {
    pub fn new(namespaces: Arc<dyn NamespaceLookup>, engine: DecisionEngine) -> Self {
        Self {
            namespaces,
            engine,
            admit_all: false,
            health_state: None,
        }
    }

    /// Adjudicator backed by the Kubernetes API
    pub fn for_cluster(client: Client) -> Self {
        let engine = DecisionEngine::new(workload_queries(&client));
        Self::new(Arc::new(ApiNamespaceLookup::new(client)), engine)
    }

    /// Allow every well-formed request without evaluating it
    pub fn with_admit_all(mut self, admit_all: bool) -> Self {
        self.admit_all = admit_all;
        self
    }

    /// Record metrics into the given health state
    pub fn with_health_state(mut self, health_state: Arc<HealthState>) -> Self {
        self.health_state = Some(health_state);
        self
    }

    pub fn admit_all(&self) -> bool {
        self.admit_all
    }

    fn record_review(&self, verdict: &str) {
        if let Some(state) = &self.health_state {
            state.metrics.record_review(verdict);
        }
    }

    /// Answer one raw HTTP request
    pub async fn adjudicate(&self, method: &Method, path: &str, body: &[u8]) -> Adjudication {
        if method != Method::POST {
            return Adjudication::text(
                StatusCode::METHOD_NOT_ALLOWED,
                format!(
                    "Incoming request method {} is not supported, only POST is supported",
                    method
                ),
            );
        }

        if path != ADMISSION_PATH {
            return Adjudication::text(StatusCode::NOT_FOUND, format!("{} 404 Not Found", path));
        }

        let request = match ReviewRequest::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                let reason = format!("{}{}", DECODE_FAILURE_PREFIX, e);
                error!(reason = %reason, "Rejecting malformed admission review");
                self.record_review("malformed");
                let review = ReviewVerdict::denied(reason).into_review("", ADMISSION_API_VERSION);
                return Adjudication::review(StatusCode::BAD_REQUEST, &review);
            }
        };

        debug!(
            uid = %request.uid,
            operation = %request.operation,
            resource = %request.resource,
            name = %request.name,
            "Processing admission request"
        );

        let verdict = self.review(&request).await;

        info!(
            allowed = verdict.allowed,
            operation = %request.operation,
            name = %request.name,
            user = %request.requester,
            "Responding to admission request"
        );
        if verdict.allowed {
            self.record_review("allowed");
        } else {
            warn!(name = %request.name, reason = %verdict.reason, "Admission request denied");
            self.record_review("denied");
        }

        let review = verdict.into_review(&request.uid, &request.api_version);
        Adjudication::review(StatusCode::OK, &review)
    }

    /// Decide a decoded request (gates 4 to 9)
    pub async fn review(&self, request: &ReviewRequest) -> ReviewVerdict {
        if self.admit_all {
            warn!(
                name = %request.name,
                "admit-all is enabled, allowing admission request without validation"
            );
            return ReviewVerdict::allowed();
        }

        if request.resource != GroupVersionResource::namespaces() {
            return ReviewVerdict::denied(format!(
                "Incoming resource is not a Namespace: {}",
                request.resource
            ));
        }

        if request.operation != Operation::Delete {
            return ReviewVerdict::denied(format!(
                "Incoming operation is {} on namespace {}. Only DELETE is currently supported.",
                request.operation, request.name
            ));
        }

        let namespace = match self.namespaces.get_namespace(&request.name).await {
            Ok(ns) => ns,
            Err(e) if e.is_not_found() => {
                debug!(name = %request.name, error = %e, "Namespace not found, deferring to the API server");
                return ReviewVerdict::allowed();
            }
            Err(e) => {
                return ReviewVerdict::denied(format!(
                    "Error occurred while retrieving the namespace {}: {}",
                    request.name, e
                ));
            }
        };

        if namespace
            .annotations()
            .get(BYPASS_ANNOTATION_KEY)
            .is_some_and(|v| v == BYPASS_ANNOTATION_VALUE)
        {
            info!(
                name = %request.name,
                annotation = BYPASS_ANNOTATION_KEY,
                "Namespace has the bypass annotation set, allowing deletion"
            );
            return ReviewVerdict::allowed();
        }

        let started = Instant::now();
        let evaluation = self.engine.evaluate(&request.name).await;
        if let Some(state) = &self.health_state {
            state
                .metrics
                .record_evaluation(started.elapsed().as_secs_f64());
        }

        match evaluation {
            Evaluation::Clear => {
                info!(name = %request.name, "Namespace does not contain any workload resources, allowing deletion");
                ReviewVerdict::allowed()
            }
            Evaluation::Denied(denial) => {
                if let Some(state) = &self.health_state {
                    for failed in &denial.tally.errors {
                        state.metrics.record_query_error(failed.kind);
                    }
                }
                ReviewVerdict::denied(denial.message())
            }
        }
    }
}
