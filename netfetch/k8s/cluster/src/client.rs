use crate::{cilium, network_policy, pod, template, ClassifyError, FIELD_MANAGER};
use anyhow::Result;
use netfetch_core::{Cluster, DenyAll, Dialect, Pod, Policy, RemediationError, Scope};
use netfetch_k8s_api::{
    self as k8s,
    policy::{CiliumClusterwideNetworkPolicy, CiliumNetworkPolicy},
    Api, ApiResource, Client, DynamicObject, ListParams, NetworkPolicy, PostParams, ResourceExt,
};
use tracing::{debug, instrument, warn};

/// A [`Cluster`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

// === impl KubeCluster ===

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn cilium_api(&self, scope: &Scope) -> Api<DynamicObject> {
        match scope {
            Scope::Namespaced(ns) => Api::namespaced_with(
                self.client.clone(),
                ns,
                &ApiResource::erase::<CiliumNetworkPolicy>(&()),
            ),
            Scope::ClusterWide => Api::all_with(
                self.client.clone(),
                &ApiResource::erase::<CiliumClusterwideNetworkPolicy>(&()),
            ),
        }
    }

    async fn list_cilium(&self, scope: Scope) -> Result<Vec<Policy>> {
        let objects = self
            .cilium_api(&scope)
            .list(&ListParams::default())
            .await?;
        Ok(classified(objects.items.iter().map(|obj| {
            cilium::classify_object(obj, scope.clone())
        })))
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        }
    }
}

#[async_trait::async_trait]
impl Cluster for KubeCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces = Api::<k8s::Namespace>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(namespaces.items.iter().map(ResourceExt::name_any).collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<String>> {
        let ns = Api::<k8s::Namespace>::all(self.client.clone())
            .get_opt(name)
            .await?;
        Ok(ns.map(|ns| ns.name_any()))
    }

    #[instrument(skip(self))]
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
        let api = match namespace {
            Some(ns) => Api::<k8s::Pod>::namespaced(self.client.clone(), ns),
            None => Api::<k8s::Pod>::all(self.client.clone()),
        };
        let pods = api.list(&ListParams::default()).await?;
        debug!(pods = pods.items.len());
        Ok(pods.items.into_iter().filter_map(pod::convert).collect())
    }

    #[instrument(skip(self))]
    async fn list_policies(&self, dialect: Dialect, namespace: &str) -> Result<Vec<Policy>> {
        match dialect {
            Dialect::Kubernetes => {
                let policies = Api::<NetworkPolicy>::namespaced(self.client.clone(), namespace)
                    .list(&ListParams::default())
                    .await?;
                Ok(classified(policies.items.iter().map(network_policy::classify)))
            }
            Dialect::Cilium => self.list_cilium(Scope::Namespaced(namespace.to_string())).await,
        }
    }

    #[instrument(skip(self))]
    async fn list_cluster_policies(&self, dialect: Dialect) -> Result<Vec<Policy>> {
        if !dialect.has_cluster_scope() {
            return Ok(vec![]);
        }
        self.list_cilium(Scope::ClusterWide).await
    }

    async fn create_policy(&self, policy: &DenyAll) -> Result<(), RemediationError> {
        let params = Self::post_params();
        let created = match (policy.dialect, &policy.scope) {
            (Dialect::Kubernetes, Scope::Namespaced(ns)) => {
                Api::<NetworkPolicy>::namespaced(self.client.clone(), ns)
                    .create(&params, &template::network_policy(policy, ns))
                    .await
                    .map(|_| ())
            }
            (Dialect::Cilium, Scope::Namespaced(ns)) => {
                Api::<CiliumNetworkPolicy>::namespaced(self.client.clone(), ns)
                    .create(&params, &template::cilium_network_policy(policy, ns))
                    .await
                    .map(|_| ())
            }
            (Dialect::Cilium, Scope::ClusterWide) => {
                Api::<CiliumClusterwideNetworkPolicy>::all(self.client.clone())
                    .create(
                        &params,
                        &template::cilium_clusterwide_network_policy(policy),
                    )
                    .await
                    .map(|_| ())
            }
            (Dialect::Kubernetes, Scope::ClusterWide) => {
                return Err(RemediationError::Unsupported {
                    dialect: policy.dialect,
                    scope: policy.scope.clone(),
                });
            }
        };

        created.map_err(|error| RemediationError::Create {
            dialect: policy.dialect,
            scope: policy.scope.clone(),
            source: error.into(),
        })
    }
}

/// Keeps successfully classified policies, logging the rest.
fn classified(results: impl Iterator<Item = Result<Policy, ClassifyError>>) -> Vec<Policy> {
    results
        .filter_map(|result| match result {
            Ok(policy) => Some(policy),
            Err(error) => {
                warn!(%error, "Skipping policy");
                None
            }
        })
        .collect()
}
