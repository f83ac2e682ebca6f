//! The subset of the `cilium.io/v2` policy resources that coverage depends on.
//!
//! Fields that the Cilium API types strictly (e.g. label values) are kept as
//! raw JSON here so that a malformed object can be reported and skipped by
//! the caller rather than failing a whole listing.

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single ingress or egress entry. Only its emptiness is inspected.
pub type RuleEntry = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "cilium.io",
    version = "v2",
    kind = "CiliumNetworkPolicy",
    namespaced,
    schema = "disabled"
)]
pub struct CiliumNetworkPolicySpec {
    #[serde(flatten)]
    pub rule: PolicyRule,
}

#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "cilium.io",
    version = "v2",
    kind = "CiliumClusterwideNetworkPolicy",
    schema = "disabled"
)]
pub struct CiliumClusterwideNetworkPolicySpec {
    #[serde(flatten)]
    pub rule: PolicyRule,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_selector: Option<EndpointSelector>,

    /// Selects nodes rather than endpoints. Mutually exclusive with
    /// `endpoint_selector`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<Vec<RuleEntry>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_deny: Option<Vec<RuleEntry>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress: Option<Vec<RuleEntry>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_deny: Option<Vec<RuleEntry>>,
}

/// A Cilium endpoint selector. Keys may carry a label source prefix such as
/// `k8s:`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<Requirement>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Requirement {
    pub key: String,
    pub operator: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

// === impl PolicyRule ===

impl PolicyRule {
    /// A rule with an empty endpoint selector and empty rule lists, blocking
    /// all traffic for every endpoint in its scope.
    pub fn deny_all() -> Self {
        Self {
            endpoint_selector: Some(EndpointSelector {
                match_labels: Some(BTreeMap::new()),
                match_expressions: None,
            }),
            ingress: Some(vec![]),
            egress: Some(vec![]),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn decodes_namespaced_policy() {
        let policy = serde_json::from_value::<CiliumNetworkPolicy>(serde_json::json!({
            "apiVersion": "cilium.io/v2",
            "kind": "CiliumNetworkPolicy",
            "metadata": { "name": "allow-web", "namespace": "shop" },
            "spec": {
                "endpointSelector": {
                    "matchLabels": { "k8s:app": "web" },
                    "matchExpressions": [
                        { "key": "tier", "operator": "Exists" }
                    ]
                },
                "ingress": [{ "fromEndpoints": [{}] }],
                "egressDeny": [{}]
            }
        }))
        .expect("policy must decode");

        let rule = policy.spec.rule;
        assert_eq!(
            rule.endpoint_selector
                .as_ref()
                .and_then(|s| s.match_labels.clone()),
            Some(btreemap! { "k8s:app".to_string() => serde_json::json!("web") })
        );
        assert_eq!(
            rule.endpoint_selector.and_then(|s| s.match_expressions),
            Some(vec![Requirement {
                key: "tier".to_string(),
                operator: "Exists".to_string(),
                values: None,
            }])
        );
        assert_eq!(rule.ingress.map(|r| r.len()), Some(1));
        assert_eq!(rule.egress_deny.map(|r| r[0].is_empty()), Some(true));
        assert!(rule.egress.is_none());
    }

    #[test]
    fn deny_all_shape() {
        let spec = CiliumClusterwideNetworkPolicySpec {
            rule: PolicyRule::deny_all(),
        };
        assert_eq!(
            serde_json::to_value(&spec).expect("spec must serialize"),
            serde_json::json!({
                "endpointSelector": { "matchLabels": {} },
                "ingress": [],
                "egress": []
            })
        );
    }
}
