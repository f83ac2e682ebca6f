//! Default deny-all objects created by remediation.

use netfetch_core::DenyAll;
use netfetch_k8s_api::{
    policy::{
        CiliumClusterwideNetworkPolicy, CiliumClusterwideNetworkPolicySpec, CiliumNetworkPolicy,
        CiliumNetworkPolicySpec, PolicyRule,
    },
    LabelSelector, NetworkPolicy, NetworkPolicySpec, ObjectMeta,
};

/// Selects every pod in `policy`'s namespace and allows no traffic in either
/// direction.
pub fn network_policy(policy: &DenyAll, namespace: &str) -> NetworkPolicy {
    NetworkPolicy {
        metadata: ObjectMeta {
            name: Some(policy.name()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(NetworkPolicySpec {
            pod_selector: LabelSelector::default().into(),
            policy_types: Some(vec!["Ingress".to_string(), "Egress".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn cilium_network_policy(policy: &DenyAll, namespace: &str) -> CiliumNetworkPolicy {
    let mut cnp = CiliumNetworkPolicy::new(
        &policy.name(),
        CiliumNetworkPolicySpec {
            rule: PolicyRule::deny_all(),
        },
    );
    cnp.metadata.namespace = Some(namespace.to_string());
    cnp
}

pub fn cilium_clusterwide_network_policy(policy: &DenyAll) -> CiliumClusterwideNetworkPolicy {
    CiliumClusterwideNetworkPolicy::new(
        &policy.name(),
        CiliumClusterwideNetworkPolicySpec {
            rule: PolicyRule::deny_all(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cilium, network_policy};
    use netfetch_core::{Dialect, Scope};
    use serde_json::json;

    #[test]
    fn network_policy_is_deny_all() {
        let np = network_policy(&DenyAll::namespaced(Dialect::Kubernetes, "shop"), "shop");
        assert_eq!(np.metadata.name.as_deref(), Some("shop-default-deny-all"));

        let policy = network_policy::classify(&np).expect("template must classify");
        assert!(policy.is_default_deny_all());
        assert!(policy.applies_to_namespace("shop"));
    }

    #[test]
    fn cilium_policies_are_deny_all() {
        let cnp = cilium_network_policy(&DenyAll::namespaced(Dialect::Cilium, "shop"), "shop");
        assert_eq!(
            serde_json::to_value(&cnp).expect("policy must serialize"),
            json!({
                "apiVersion": "cilium.io/v2",
                "kind": "CiliumNetworkPolicy",
                "metadata": { "name": "shop-cilium-default-deny-all", "namespace": "shop" },
                "spec": {
                    "endpointSelector": { "matchLabels": {} },
                    "ingress": [],
                    "egress": [],
                },
            })
        );

        let ccnp = cilium_clusterwide_network_policy(&DenyAll::cluster_wide(Dialect::Cilium));
        let policy = cilium::classify(
            ccnp.metadata.name.clone().unwrap_or_default(),
            Scope::ClusterWide,
            &ccnp.spec.rule,
        )
        .expect("template must classify");
        assert_eq!(policy.name, "clusterwide-default-deny-all");
        assert!(policy.is_cluster_wide());
        assert!(policy.applies_to_all());
        assert!(policy.is_default_deny_all());
    }
}
