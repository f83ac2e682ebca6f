//! Policy-to-pod relationships, as rendered by the dashboard.

use crate::{coverage, namespace, Cluster, Dialect, Error, Pod, PodInfo, Policy};
use serde::Serialize;
use tracing::{debug, warn};

/// The policies in a namespace and the pods each one selects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VisualizationData {
    pub policies: Vec<PolicyVisualization>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyVisualization {
    pub name: String,
    pub namespace: String,
    pub target_pods: Vec<String>,
}

// === impl VisualizationData ===

impl VisualizationData {
    pub fn new(namespace: &str, policies: &[Policy], pods: &[Pod]) -> Self {
        let policies = policies
            .iter()
            .map(|policy| PolicyVisualization {
                name: policy.name.clone(),
                namespace: namespace.to_string(),
                target_pods: target_pods(policy, pods),
            })
            .collect();
        Self { policies }
    }
}

/// Names the pods, in listing order, that `policy` selects.
pub fn target_pods(policy: &Policy, pods: &[Pod]) -> Vec<String> {
    pods.iter()
        .filter(|pod| coverage::selects(policy, pod))
        .map(|pod| pod.name().to_string())
        .collect()
}

/// Builds the visualization of a single namespace, which must exist.
pub async fn namespace<C>(cluster: &C, dialect: Dialect, ns: &str) -> Result<VisualizationData, Error>
where
    C: Cluster + ?Sized,
{
    namespace::select(cluster, Some(ns)).await?;
    let policies = cluster
        .list_policies(dialect, ns)
        .await
        .map_err(Error::fetch("policies"))?;
    let pods = cluster
        .list_pods(Some(ns))
        .await
        .map_err(Error::fetch("pods"))?;
    Ok(VisualizationData::new(ns, &policies, &pods))
}

/// Lists the non-system namespaces holding at least one policy.
///
/// Namespaces whose policies cannot be listed are skipped.
pub async fn namespaces_with_policies<C>(cluster: &C, dialect: Dialect) -> Result<Vec<String>, Error>
where
    C: Cluster + ?Sized,
{
    let mut found = vec![];
    for ns in namespace::select(cluster, None).await? {
        match cluster.list_policies(dialect, &ns).await {
            Ok(policies) if policies.is_empty() => debug!(%ns, "No policies"),
            Ok(_) => found.push(ns),
            Err(error) => {
                warn!(%ns, error = format_args!("{:#}", error), "Skipping namespace");
            }
        }
    }
    Ok(found)
}

/// Builds a visualization for every namespace holding policies.
pub async fn cluster<C>(cluster: &C, dialect: Dialect) -> Result<Vec<VisualizationData>, Error>
where
    C: Cluster + ?Sized,
{
    let mut data = vec![];
    for ns in namespaces_with_policies(cluster, dialect).await? {
        match namespace(cluster, dialect, &ns).await {
            Ok(viz) => data.push(viz),
            Err(error) => warn!(%ns, %error, "Skipping namespace"),
        }
    }
    Ok(data)
}

/// Describes every pod in a namespace, which must exist.
pub async fn pod_info<C>(cluster: &C, ns: &str) -> Result<Vec<PodInfo>, Error>
where
    C: Cluster + ?Sized,
{
    namespace::select(cluster, Some(ns)).await?;
    let pods = cluster
        .list_pods(Some(ns))
        .await
        .map_err(Error::fetch("pods"))?;
    Ok(pods.iter().map(PodInfo::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Labels, Phase, PodId, Scope, Selector};
    use std::iter::FromIterator;

    fn mk_pod(name: &str, app: &'static str) -> Pod {
        Pod {
            id: PodId::new("shop", name),
            labels: Labels::from_iter(vec![("app", app)]),
            phase: Phase::Pending,
            ip: None,
            ports: vec![],
        }
    }

    fn mk_policy(name: &str, selector: Selector) -> Policy {
        Policy {
            name: name.to_string(),
            dialect: Dialect::Kubernetes,
            scope: Scope::Namespaced("shop".to_string()),
            selector,
            pod_namespace: None,
            ingress: vec![],
            egress: vec![],
        }
    }

    #[test]
    fn lists_selected_pods_per_policy() {
        let pods = [mk_pod("web-0", "web"), mk_pod("db-0", "db"), mk_pod("web-1", "web")];
        let policies = [
            mk_policy("allow-web", Selector::from_iter(vec![("app", "web")])),
            mk_policy("deny-all", Selector::default()),
            mk_policy("cache", Selector::from_iter(vec![("app", "cache")])),
        ];

        let data = VisualizationData::new("shop", &policies, &pods);
        let targets = data
            .policies
            .iter()
            .map(|p| (p.name.as_str(), p.target_pods.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            targets,
            vec![
                ("allow-web", vec!["web-0".to_string(), "web-1".to_string()]),
                (
                    "deny-all",
                    vec!["web-0".to_string(), "db-0".to_string(), "web-1".to_string()]
                ),
                ("cache", vec![]),
            ]
        );
        assert!(data.policies.iter().all(|p| p.namespace == "shop"));
    }
}
