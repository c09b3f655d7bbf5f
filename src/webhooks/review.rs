//! AdmissionReview wire types
//!
//! Only the fields the namespace policy reads are modelled. Unknown fields are
//! ignored on decode so newer API servers keep working.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// API version used when the incoming review does not name one
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
/// Kind of every review envelope
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";
/// HTTP-style status code attached to denied reviews
pub const DENIED_STATUS_CODE: u16 = 403;

fn default_api_version() -> String {
    ADMISSION_API_VERSION.to_string()
}

fn default_kind() -> String {
    ADMISSION_REVIEW_KIND.to_string()
}

/// Kubernetes AdmissionReview request envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub request: Option<AdmissionRequest>,
}

/// AdmissionRequest contains the details of the admission request
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<GroupVersionKind>,
    pub resource: GroupVersionResource,
    pub operation: Operation,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub user_info: UserInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }

    /// The core/v1 `namespaces` resource
    pub fn namespaces() -> Self {
        Self::new("", "v1", "namespaces")
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {} {}}}", self.group, self.version, self.resource)
    }
}

/// Identity of the requester as reported by the API server
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// Admission operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Connect => "CONNECT",
        };
        f.write_str(op)
    }
}

/// A decoded admission request, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    pub api_version: String,
    pub uid: String,
    pub operation: Operation,
    pub resource: GroupVersionResource,
    pub name: String,
    pub namespace: String,
    pub requester: String,
    pub object: Option<serde_json::Value>,
}

impl ReviewRequest {
    /// Decode a request body into a review request
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let review: AdmissionReview = serde_json::from_slice(body)?;
        Self::try_from(review)
    }
}

impl TryFrom<AdmissionReview> for ReviewRequest {
    type Error = Error;

    fn try_from(review: AdmissionReview) -> Result<Self> {
        let request = review.request.ok_or_else(|| {
            Error::InvalidRequest("missing request in AdmissionReview".to_string())
        })?;

        Ok(Self {
            api_version: review.api_version,
            uid: request.uid,
            operation: request.operation,
            resource: request.resource,
            name: request.name,
            namespace: request.namespace,
            requester: request.user_info.username,
            object: request.object,
        })
    }
}

/// The allow/deny decision for one review request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewVerdict {
    pub allowed: bool,
    /// Empty when allowed
    pub reason: String,
}

impl ReviewVerdict {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }

    /// Wrap the verdict in a response envelope
    pub fn into_review(self, uid: &str, api_version: &str) -> AdmissionReviewResponse {
        AdmissionReviewResponse {
            api_version: api_version.to_string(),
            kind: ADMISSION_REVIEW_KIND.to_string(),
            response: AdmissionResponse {
                uid: uid.to_string(),
                allowed: self.allowed,
                status: if self.allowed {
                    None
                } else {
                    Some(AdmissionStatus {
                        code: DENIED_STATUS_CODE,
                        message: self.reason.clone(),
                        reason: self.reason,
                    })
                },
            },
        }
    }
}

/// AdmissionReview response
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

/// AdmissionResponse contains the result
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionStatus>,
}

impl AdmissionResponse {
    /// Reason text, empty when allowed
    pub fn reason(&self) -> &str {
        self.status.as_ref().map(|s| s.reason.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: String,
}
