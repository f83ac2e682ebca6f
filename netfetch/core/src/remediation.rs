use crate::{Cluster, Dialect, RemediationError, Scope};
use std::fmt;
use tracing::info;

/// Describes a pure deny-all policy to create: empty selector, no ingress or
/// egress rules.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DenyAll {
    pub dialect: Dialect,
    pub scope: Scope,
}

// === impl DenyAll ===

impl DenyAll {
    pub fn namespaced(dialect: Dialect, namespace: impl Into<String>) -> Self {
        Self {
            dialect,
            scope: Scope::Namespaced(namespace.into()),
        }
    }

    pub fn cluster_wide(dialect: Dialect) -> Self {
        Self {
            dialect,
            scope: Scope::ClusterWide,
        }
    }

    /// The name of the created policy object.
    pub fn name(&self) -> String {
        match (&self.scope, self.dialect) {
            (Scope::Namespaced(ns), Dialect::Kubernetes) => format!("{ns}-default-deny-all"),
            (Scope::Namespaced(ns), Dialect::Cilium) => format!("{ns}-cilium-default-deny-all"),
            (Scope::ClusterWide, _) => "clusterwide-default-deny-all".to_string(),
        }
    }

    /// The question asked before creating the policy interactively.
    pub fn prompt(&self) -> String {
        let kind = match self.dialect {
            Dialect::Kubernetes => "network policy",
            Dialect::Cilium => "cilium network policy",
        };
        match &self.scope {
            Scope::Namespaced(ns) => {
                format!("Do you want to add a default deny all {kind} to the namespace {ns}?")
            }
            Scope::ClusterWide => {
                format!("Do you want to create a cluster wide default deny all {kind}?")
            }
        }
    }
}

impl fmt::Display for DenyAll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.dialect, self.name(), self.scope)
    }
}

/// Creates the deny-all policy. There is no retry and no rollback.
pub async fn apply<C>(cluster: &C, policy: &DenyAll) -> Result<(), RemediationError>
where
    C: Cluster + ?Sized,
{
    if policy.dialect == Dialect::Kubernetes && policy.scope == Scope::ClusterWide {
        return Err(RemediationError::Unsupported {
            dialect: policy.dialect,
            scope: policy.scope.clone(),
        });
    }

    cluster.create_policy(policy).await?;
    info!(%policy, "Applied default deny-all policy");
    Ok(())
}
