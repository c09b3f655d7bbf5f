use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client};

use super::NamespaceLookup;
use crate::error::{Error, Result};

/// Namespace lookup through the Kubernetes API
#[derive(Clone)]
pub struct ApiNamespaceLookup {
    client: Client,
}

impl ApiNamespaceLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NamespaceLookup for ApiNamespaceLookup {
    async fn get_namespace(&self, name: &str) -> Result<Namespace> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces
            .get_opt(name)
            .await?
            .ok_or_else(|| Error::not_found("namespaces", name))
    }
}
