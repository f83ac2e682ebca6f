use crate::{Cluster, Error};
use tracing::debug;

/// Namespaces owned by the platform. These are never scanned.
pub const SYSTEM_NAMESPACES: [&str; 6] = [
    "kube-system",
    "kube-public",
    "kube-node-lease",
    "tigera-operator",
    "gatekeeper-system",
    "calico-system",
];

pub fn is_system(namespace: &str) -> bool {
    SYSTEM_NAMESPACES.contains(&namespace)
}

/// Resolves the namespaces to scan, in discovery order.
///
/// An explicitly requested namespace must exist. Otherwise every
/// non-system namespace is returned.
pub async fn select<C>(cluster: &C, namespace: Option<&str>) -> Result<Vec<String>, Error>
where
    C: Cluster + ?Sized,
{
    if let Some(name) = namespace {
        return match cluster
            .get_namespace(name)
            .await
            .map_err(Error::fetch("namespace"))?
        {
            Some(ns) => Ok(vec![ns]),
            None => Err(Error::NamespaceNotFound(name.to_string())),
        };
    }

    let namespaces = cluster
        .list_namespaces()
        .await
        .map_err(Error::fetch("namespaces"))?
        .into_iter()
        .filter(|ns| {
            let system = is_system(ns);
            if system {
                debug!(%ns, "Skipping system namespace");
            }
            !system
        })
        .collect();
    Ok(namespaces)
}
