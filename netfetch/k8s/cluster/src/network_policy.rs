use crate::{selector, ClassifyError};
use netfetch_core::{Dialect, Policy, Rule, Scope};
use netfetch_k8s_api::{LabelSelector, NetworkPolicy, ResourceExt};

/// Classifies a `networking.k8s.io/v1` `NetworkPolicy`.
///
/// Every ingress and egress entry counts as a populated rule, so a policy is a
/// default deny-all exactly when both lists are empty. `policyTypes` is not
/// consulted.
pub fn classify(policy: &NetworkPolicy) -> Result<Policy, ClassifyError> {
    let name = policy.name_any();
    let namespace = policy
        .namespace()
        .ok_or_else(|| ClassifyError::decode(&name, anyhow::anyhow!("missing namespace")))?;
    let spec = policy
        .spec
        .as_ref()
        .ok_or_else(|| ClassifyError::MissingSpec(name.clone()))?;

    let pod_selector: Option<LabelSelector> = spec.pod_selector.clone().into();
    let selector = selector::label_selector(&name, pod_selector)?;

    let populated = |n: usize| vec![Rule::Populated; n];
    Ok(Policy {
        dialect: Dialect::Kubernetes,
        scope: Scope::Namespaced(namespace),
        selector,
        pod_namespace: None,
        ingress: populated(spec.ingress.as_ref().map_or(0, Vec::len)),
        egress: populated(spec.egress.as_ref().map_or(0, Vec::len)),
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::{btreemap, convert_args};
    use netfetch_k8s_api::{api::networking::v1::NetworkPolicyIngressRule, NetworkPolicySpec, ObjectMeta};

    fn mk_policy(spec: Option<NetworkPolicySpec>) -> NetworkPolicy {
        NetworkPolicy {
            metadata: ObjectMeta {
                namespace: Some("shop".to_string()),
                name: Some("policy-0".to_string()),
                ..Default::default()
            },
            spec,
            ..Default::default()
        }
    }

    #[test]
    fn empty_policy_is_deny_all() {
        let policy = classify(&mk_policy(Some(NetworkPolicySpec {
            policy_types: Some(vec!["Ingress".to_string()]),
            ..Default::default()
        })))
        .expect("policy must classify");

        assert_eq!(policy.name, "policy-0");
        assert_eq!(policy.scope, Scope::Namespaced("shop".to_string()));
        assert!(policy.selector.is_empty());
        // Directionality is ignored.
        assert!(policy.is_default_deny_all());
        assert!(policy.applies_to_namespace("shop"));
    }

    #[test]
    fn ingress_entries_are_populated() {
        let policy = classify(&mk_policy(Some(NetworkPolicySpec {
            pod_selector: LabelSelector {
                match_labels: Some(convert_args!(btreemap!("app" => "web"))),
                ..Default::default()
            }
            .into(),
            ingress: Some(vec![NetworkPolicyIngressRule::default()]),
            ..Default::default()
        })))
        .expect("policy must classify");

        assert!(!policy.is_default_deny_all());
        assert!(policy.has_populated_rule());
        assert!(!policy.applies_to_all());
    }

    #[test]
    fn missing_spec() {
        let error = classify(&mk_policy(None)).expect_err("policy must not classify");
        assert!(matches!(error, ClassifyError::MissingSpec(name) if name == "policy-0"));
    }
}
