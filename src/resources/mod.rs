//! Cluster queries consumed by the admission policy
//!
//! The policy only sees the two traits below. The Kubernetes-backed
//! implementations live in the submodules; tests substitute in-memory fakes.

pub mod counters;
pub mod namespace;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;

use crate::error::Result;

pub use counters::{ApiCounter, workload_queries};
pub use namespace::ApiNamespaceLookup;

/// Counts the members of one resource kind inside a namespace
#[async_trait]
pub trait ResourceCounter: Send + Sync {
    async fn count(&self, namespace: &str) -> Result<usize>;
}

/// Fetches a namespace object by name
///
/// A missing namespace must be reported as [`crate::Error::NotFound`].
#[async_trait]
pub trait NamespaceLookup: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<Namespace>;
}
