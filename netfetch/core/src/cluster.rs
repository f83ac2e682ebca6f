use crate::{DenyAll, Dialect, Pod, Policy, RemediationError};
use anyhow::Result;

/// Models the cluster API the scanner reads from and remediates against.
///
/// Implementations decode and validate raw resources before returning them:
/// policies that cannot be classified are skipped (with a diagnostic) rather
/// than failing the whole listing.
#[async_trait::async_trait]
pub trait Cluster: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Returns `None` when the namespace does not exist.
    async fn get_namespace(&self, name: &str) -> Result<Option<String>>;

    /// Lists pods in `namespace`, or in all namespaces when `None`.
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>>;

    async fn list_policies(&self, dialect: Dialect, namespace: &str) -> Result<Vec<Policy>>;

    /// Lists cluster-scoped policies. Dialects without a cluster-scoped kind
    /// return nothing.
    async fn list_cluster_policies(&self, dialect: Dialect) -> Result<Vec<Policy>>;

    async fn create_policy(&self, policy: &DenyAll) -> Result<(), RemediationError>;
}

/// Asks the operator a yes/no question.
#[async_trait::async_trait]
pub trait Prompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

#[async_trait::async_trait]
impl<C: Cluster + ?Sized> Cluster for std::sync::Arc<C> {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        (**self).list_namespaces().await
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<String>> {
        (**self).get_namespace(name).await
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
        (**self).list_pods(namespace).await
    }

    async fn list_policies(&self, dialect: Dialect, namespace: &str) -> Result<Vec<Policy>> {
        (**self).list_policies(dialect, namespace).await
    }

    async fn list_cluster_policies(&self, dialect: Dialect) -> Result<Vec<Policy>> {
        (**self).list_cluster_policies(dialect).await
    }

    async fn create_policy(&self, policy: &DenyAll) -> Result<(), RemediationError> {
        (**self).create_policy(policy).await
    }
}
