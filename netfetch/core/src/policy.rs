use crate::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The policy resource families netfetch understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `networking.k8s.io/v1` `NetworkPolicy`.
    Kubernetes,

    /// `cilium.io/v2` `CiliumNetworkPolicy` and `CiliumClusterwideNetworkPolicy`.
    Cilium,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Namespaced(String),
    ClusterWide,
}

/// A single ingress or egress rule, reduced to whether it constrains anything.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    /// A rule entry with no fields set, e.g. `ingress: [{}]` in a Cilium policy.
    Vacuous,
    Populated,
}

/// A normalized policy of either dialect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub dialect: Dialect,
    pub scope: Scope,
    pub selector: Selector,

    /// Restricts the policy to pods in a single namespace.
    ///
    /// Set for Cilium policies that select on the `io.kubernetes.pod.namespace`
    /// pseudo-label.
    pub pod_namespace: Option<String>,

    pub ingress: Vec<Rule>,
    pub egress: Vec<Rule>,
}

// === impl Dialect ===

impl Dialect {
    pub const ALL: [Dialect; 2] = [Dialect::Kubernetes, Dialect::Cilium];

    /// Whether the dialect has a cluster-scoped policy kind.
    pub fn has_cluster_scope(&self) -> bool {
        matches!(self, Self::Cilium)
    }
}

impl std::str::FromStr for Dialect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "kubernetes" | "native" => Ok(Self::Kubernetes),
            "cilium" => Ok(Self::Cilium),
            s => Err(anyhow::anyhow!("invalid policy dialect: {:?}", s)),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kubernetes => "kubernetes".fmt(f),
            Self::Cilium => "cilium".fmt(f),
        }
    }
}

// === impl Scope ===

impl Scope {
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Namespaced(ns) => Some(ns.as_str()),
            Self::ClusterWide => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Namespaced(ns) => write!(f, "namespace {ns}"),
            Self::ClusterWide => "cluster".fmt(f),
        }
    }
}

// === impl Rule ===

/// True when a rule list blocks everything in its direction: it is empty, or
/// holds exactly one vacuous entry.
pub fn is_vacuous(rules: &[Rule]) -> bool {
    matches!(rules, [] | [Rule::Vacuous])
}

// === impl Policy ===

impl Policy {
    pub fn is_cluster_wide(&self) -> bool {
        self.scope == Scope::ClusterWide
    }

    /// Both rule lists are empty or only vacuously populated.
    pub fn is_default_deny_all(&self) -> bool {
        is_vacuous(&self.ingress) && is_vacuous(&self.egress)
    }

    /// The policy selects every pod in its scope.
    pub fn applies_to_all(&self) -> bool {
        self.selector.is_empty() && self.pod_namespace.is_none()
    }

    /// The policy selects every pod in `namespace`: it is namespaced there
    /// with an empty selector, or it only restricts on that pod namespace.
    pub fn applies_to_namespace(&self, namespace: &str) -> bool {
        if !self.selector.is_empty() {
            return false;
        }
        match (&self.scope, self.pod_namespace.as_deref()) {
            (_, Some(ns)) => ns == namespace,
            (Scope::Namespaced(ns), None) => ns == namespace,
            (Scope::ClusterWide, None) => false,
        }
    }

    /// At least one ingress or egress entry constrains traffic.
    pub fn has_populated_rule(&self) -> bool {
        self.ingress
            .iter()
            .chain(self.egress.iter())
            .any(|r| *r == Rule::Populated)
    }

    /// Whether the policy could apply to a pod in `namespace` at all.
    pub fn is_visible_in(&self, namespace: &str) -> bool {
        let scoped = match &self.scope {
            Scope::Namespaced(ns) => ns == namespace,
            Scope::ClusterWide => true,
        };
        scoped && self.pod_namespace.as_deref().map_or(true, |ns| ns == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::FromIterator;

    fn mk_policy(selector: Selector, ingress: Vec<Rule>, egress: Vec<Rule>) -> Policy {
        Policy {
            name: "policy-0".to_string(),
            dialect: Dialect::Cilium,
            scope: Scope::Namespaced("ns-0".to_string()),
            selector,
            pod_namespace: None,
            ingress,
            egress,
        }
    }

    #[test]
    fn default_deny_all() {
        for (ingress, egress, deny_all, msg) in [
            (vec![], vec![], true, "empty rule lists"),
            (vec![Rule::Vacuous], vec![], true, "single vacuous ingress"),
            (
                vec![Rule::Vacuous],
                vec![Rule::Vacuous],
                true,
                "single vacuous in both directions",
            ),
            (vec![Rule::Populated], vec![], false, "populated ingress"),
            (vec![], vec![Rule::Populated], false, "populated egress"),
            (
                vec![Rule::Vacuous, Rule::Vacuous],
                vec![],
                false,
                "more than one vacuous entry",
            ),
        ] {
            let policy = mk_policy(Selector::default(), ingress, egress);
            assert_eq!(policy.is_default_deny_all(), deny_all, "{}", msg);
        }
    }

    #[test]
    fn applies_to_namespace() {
        let policy = mk_policy(Selector::default(), vec![], vec![]);
        assert!(policy.applies_to_all());
        assert!(policy.applies_to_namespace("ns-0"));
        assert!(!policy.applies_to_namespace("ns-1"));

        let policy = mk_policy(Selector::from_iter(Some(("app", "web"))), vec![], vec![]);
        assert!(!policy.applies_to_all());
        assert!(!policy.applies_to_namespace("ns-0"));

        let policy = Policy {
            scope: Scope::ClusterWide,
            pod_namespace: Some("shop".to_string()),
            ..mk_policy(Selector::default(), vec![], vec![])
        };
        assert!(!policy.applies_to_all());
        assert!(policy.applies_to_namespace("shop"));
        assert!(policy.is_visible_in("shop"));
        assert!(!policy.is_visible_in("pay"));
    }

    #[test]
    fn parse_dialect() {
        assert_eq!("native".parse::<Dialect>().unwrap(), Dialect::Kubernetes);
        assert_eq!("cilium".parse::<Dialect>().unwrap(), Dialect::Cilium);
        assert!("calico".parse::<Dialect>().is_err());
    }
}
