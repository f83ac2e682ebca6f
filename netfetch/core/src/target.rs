//! Inspection of the pods a single named policy targets.

use crate::{coverage, namespace, Cluster, Dialect, Error, Pod, Policy, Scope};
use serde::Serialize;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TargetedPod {
    pub namespace: String,
    pub name: String,
    pub ip: Option<String>,
}

/// Finds a policy by name.
///
/// Non-system namespaces are searched in discovery order. Cilium falls back to
/// cluster-wide policies when no namespaced policy has the name.
pub async fn find_policy<C>(cluster: &C, dialect: Dialect, name: &str) -> Result<Option<Policy>, Error>
where
    C: Cluster + ?Sized,
{
    for ns in namespace::select(cluster, None).await? {
        let policies = cluster
            .list_policies(dialect, &ns)
            .await
            .map_err(Error::fetch("policies"))?;
        if let Some(policy) = policies.into_iter().find(|p| p.name == name) {
            debug!(%ns, policy = %name, "Found policy");
            return Ok(Some(policy));
        }
    }

    if !dialect.has_cluster_scope() {
        return Ok(None);
    }

    let policy = cluster
        .list_cluster_policies(dialect)
        .await
        .map_err(Error::fetch("cluster-wide policies"))?
        .into_iter()
        .find(|p| p.name == name);
    Ok(policy)
}

/// Lists the pods whose labels the policy's selector matches.
pub async fn targeted_pods<C>(cluster: &C, policy: &Policy) -> Result<Vec<TargetedPod>, Error>
where
    C: Cluster + ?Sized,
{
    let pods = match &policy.scope {
        Scope::Namespaced(ns) => cluster
            .list_pods(Some(ns))
            .await
            .map_err(Error::fetch("pods"))?,
        Scope::ClusterWide => cluster
            .list_pods(None)
            .await
            .map_err(Error::fetch("pods"))?
            .into_iter()
            .filter(|p| !namespace::is_system(p.namespace()))
            .collect(),
    };

    Ok(pods
        .iter()
        .filter(|pod| coverage::selects(policy, pod))
        .map(TargetedPod::from)
        .collect())
}

impl From<&Pod> for TargetedPod {
    fn from(pod: &Pod) -> Self {
        Self {
            namespace: pod.namespace().to_string(),
            name: pod.name().to_string(),
            ip: pod.ip.clone(),
        }
    }
}
