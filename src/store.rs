use crate::openshift::DeploymentConfig;
use anyhow::{Context, Result};
use kube::api::{ListParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

/// Where deployment configs are listed from and written back to.
pub trait DeploymentConfigStore {
    async fn list(&self) -> Result<Vec<DeploymentConfig>>;

    /// Replaces the stored config with `config`, keyed by namespace and name. Stale
    /// `metadata.resourceVersion` values are rejected by the store.
    async fn update(&self, config: &DeploymentConfig) -> Result<DeploymentConfig>;
}

#[derive(Clone)]
pub struct KubeDeploymentConfigStore {
    client: Client,
    namespace: Option<String>,
}

impl KubeDeploymentConfigStore {
    /// Store over all namespaces, or only `namespace` when given.
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    fn scoped_api(&self) -> Api<DeploymentConfig> {
        match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }
}

impl DeploymentConfigStore for KubeDeploymentConfigStore {
    async fn list(&self) -> Result<Vec<DeploymentConfig>> {
        let list = self
            .scoped_api()
            .list(&ListParams::default())
            .await
            .context("Failed to list deployment configs")?;
        debug!("Listed {} deployment configs", list.items.len());
        Ok(list.items)
    }

    async fn update(&self, config: &DeploymentConfig) -> Result<DeploymentConfig> {
        let api: Api<DeploymentConfig> = Api::namespaced(self.client.clone(), config.namespace());
        api.replace(config.name(), &PostParams::default(), config)
            .await
            .with_context(|| format!("Failed to replace deployment config {}", config.label()))
    }
}
