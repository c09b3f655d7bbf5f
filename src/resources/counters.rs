//! Kubernetes-backed resource counters
//!
//! Counting uses metadata-only list calls so the webhook only needs `list`
//! permission on each kind and never pulls full object bodies.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::ListParams;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

use super::ResourceCounter;
use crate::error::Result;
use crate::webhooks::policies::{KindQuery, WorkloadKind};

/// Counts objects of kind `K` in a namespace
pub struct ApiCounter<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> ApiCounter<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K> ResourceCounter for ApiCounter<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn count(&self, namespace: &str) -> Result<usize> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list_metadata(&ListParams::default()).await?;
        Ok(list.items.len())
    }
}

fn counter_for(kind: WorkloadKind, client: Client) -> Arc<dyn ResourceCounter> {
    match kind {
        WorkloadKind::Pods => Arc::new(ApiCounter::<Pod>::new(client)),
        WorkloadKind::Services => Arc::new(ApiCounter::<Service>::new(client)),
        WorkloadKind::ReplicaSets => Arc::new(ApiCounter::<ReplicaSet>::new(client)),
        WorkloadKind::Deployments => Arc::new(ApiCounter::<Deployment>::new(client)),
        WorkloadKind::StatefulSets => Arc::new(ApiCounter::<StatefulSet>::new(client)),
        WorkloadKind::DaemonSets => Arc::new(ApiCounter::<DaemonSet>::new(client)),
        WorkloadKind::Ingresses => Arc::new(ApiCounter::<Ingress>::new(client)),
        WorkloadKind::HorizontalPodAutoscalers => {
            Arc::new(ApiCounter::<HorizontalPodAutoscaler>::new(client))
        }
    }
}

/// Build the kind table backed by the Kubernetes API, in policy order
pub fn workload_queries(client: &Client) -> Vec<KindQuery> {
    WorkloadKind::ALL
        .iter()
        .map(|kind| KindQuery::new(kind.as_str(), counter_for(*kind, client.clone())))
        .collect()
}
