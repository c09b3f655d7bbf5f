//! Namespace deletion policy
//!
//! A namespace may only be deleted once every workload kind in it is
//! confirmed empty. Each kind is counted independently; a kind whose count
//! cannot be determined blocks deletion just like a non-empty one, and never
//! stops the remaining kinds from being counted.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;

use crate::error::{Error, Result};
use crate::resources::ResourceCounter;

/// Annotation an operator sets on a namespace to skip the policy
pub const BYPASS_ANNOTATION_KEY: &str =
    "k8s-namespace-guard.admission.yahoo.com/allow-cascade-delete";
/// The only value of [`BYPASS_ANNOTATION_KEY`] that bypasses the policy
pub const BYPASS_ANNOTATION_VALUE: &str = "true";

/// Workload kinds that block namespace deletion, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Pods,
    Services,
    ReplicaSets,
    Deployments,
    StatefulSets,
    DaemonSets,
    Ingresses,
    HorizontalPodAutoscalers,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 8] = [
        WorkloadKind::Pods,
        WorkloadKind::Services,
        WorkloadKind::ReplicaSets,
        WorkloadKind::Deployments,
        WorkloadKind::StatefulSets,
        WorkloadKind::DaemonSets,
        WorkloadKind::Ingresses,
        WorkloadKind::HorizontalPodAutoscalers,
    ];

    /// Plural resource name
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Pods => "pods",
            WorkloadKind::Services => "services",
            WorkloadKind::ReplicaSets => "replicasets",
            WorkloadKind::Deployments => "deployments",
            WorkloadKind::StatefulSets => "statefulsets",
            WorkloadKind::DaemonSets => "daemonsets",
            WorkloadKind::Ingresses => "ingresses",
            WorkloadKind::HorizontalPodAutoscalers => "horizontalpodautoscalers",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the kind table: a kind name and the query that counts it
#[derive(Clone)]
pub struct KindQuery {
    kind: &'static str,
    counter: Arc<dyn ResourceCounter>,
}

impl KindQuery {
    pub fn new(kind: &'static str, counter: Arc<dyn ResourceCounter>) -> Self {
        Self { kind, counter }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Debug for KindQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindQuery")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindCount {
    pub kind: &'static str,
    pub count: usize,
}

impl fmt::Display for KindCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindError {
    pub kind: &'static str,
    pub error: String,
}

impl fmt::Display for KindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error listing {}, {}", self.kind, self.error)
    }
}

/// Evidence gathered for one namespace, in kind-table order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceTally {
    /// Kinds with at least one member
    pub non_empty: Vec<KindCount>,
    /// Kinds whose count could not be determined
    pub errors: Vec<KindError>,
}

impl ResourceTally {
    /// Fold one query outcome into the tally
    pub fn record(&mut self, kind: &'static str, outcome: Result<usize>) {
        match outcome {
            Ok(0) => {}
            Ok(count) => self.non_empty.push(KindCount { kind, count }),
            Err(e) => self.errors.push(KindError {
                kind,
                error: match e {
                    Error::KubeError(api) => api.to_string(),
                    other => other.to_string(),
                },
            }),
        }
    }

    /// True when every kind was confirmed empty
    pub fn is_clear(&self) -> bool {
        self.non_empty.is_empty() && self.errors.is_empty()
    }
}

/// Render items the way operators are used to reading them: `[a b c]`
fn bracketed<T: fmt::Display>(items: &[T]) -> String {
    let joined = items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!("[{}]", joined)
}

/// Why a namespace cannot be deleted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub namespace: String,
    pub tally: ResourceTally,
}

impl Denial {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = &self.namespace;
        if !self.tally.non_empty.is_empty() {
            write!(
                f,
                "The namespace {} you are trying to remove contains one or more of these resources: {}. Please delete them and try again.",
                ns,
                bracketed(&self.tally.non_empty)
            )?;
        }
        if !self.tally.errors.is_empty() {
            write!(
                f,
                "The following error(s) occurred while validating the DELETE operation on the namespace {}: {}.",
                ns,
                bracketed(&self.tally.errors)
            )?;
        }
        write!(
            f,
            " WARNING: If you know what you are doing, run `kubectl annotate namespace {} {}={}` to bypass this policy check.",
            ns, BYPASS_ANNOTATION_KEY, BYPASS_ANNOTATION_VALUE
        )
    }
}

/// Outcome of evaluating a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Clear,
    Denied(Denial),
}

impl Evaluation {
    pub fn is_clear(&self) -> bool {
        matches!(self, Evaluation::Clear)
    }
}

/// Counts every kind in its table and decides whether deletion may proceed
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    queries: Vec<KindQuery>,
}

impl DecisionEngine {
    pub fn new(queries: Vec<KindQuery>) -> Self {
        Self { queries }
    }

    /// Kind names in evaluation order
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.queries.iter().map(KindQuery::kind)
    }

    /// Run every query and collect the results
    ///
    /// Queries run concurrently but the tally is always built in table
    /// order. Dropping the future abandons any queries still in flight.
    pub async fn tally(&self, namespace: &str) -> ResourceTally {
        let outcomes = join_all(self.queries.iter().map(|query| async move {
            (query.kind, query.counter.count(namespace).await)
        }))
        .await;

        let mut tally = ResourceTally::default();
        for (kind, outcome) in outcomes {
            if let Err(e) = &outcome {
                tracing::warn!(namespace = %namespace, kind = %kind, error = %e, "Failed to count resources");
            }
            tally.record(kind, outcome);
        }
        tally
    }

    pub async fn evaluate(&self, namespace: &str) -> Evaluation {
        let tally = self.tally(namespace).await;
        if tally.is_clear() {
            Evaluation::Clear
        } else {
            Evaluation::Denied(Denial {
                namespace: namespace.to_string(),
                tally,
            })
        }
    }
}
