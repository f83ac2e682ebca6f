//! Classifies `CiliumNetworkPolicy` and `CiliumClusterwideNetworkPolicy`
//! objects.
//!
//! Selector keys may carry a Cilium label source prefix (`k8s:` or `any:`),
//! which is stripped. Keys that are not plain label keys once stripped, such
//! as `reserved:host`, are skipped. The `io.kubernetes.pod.namespace`
//! pseudo-label restricts the policy to a single namespace rather than
//! matching a pod label.

use crate::{selector, ClassifyError};
use netfetch_core::{Dialect, Map, Policy, Rule, Scope, Selector};
use netfetch_k8s_api::{
    policy::{EndpointSelector, PolicyRule, RuleEntry},
    DynamicObject, ResourceExt,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

pub const POD_NAMESPACE_LABEL: &str = "io.kubernetes.pod.namespace";

const SOURCE_PREFIXES: [&str; 2] = ["k8s:", "any:"];

static LABEL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_./]*[A-Za-z0-9])?$")
        .expect("label key regex must be valid")
});

/// Classifies a Cilium policy listed as a dynamic object.
///
/// `scope` is the scope the object was listed from; a namespaced object's own
/// namespace takes precedence.
pub fn classify_object(obj: &DynamicObject, scope: Scope) -> Result<Policy, ClassifyError> {
    let name = obj.name_any();
    let spec = obj
        .data
        .get("spec")
        .ok_or_else(|| ClassifyError::MissingSpec(name.clone()))?;
    let rule = serde_json::from_value::<PolicyRule>(spec.clone())
        .map_err(|e| ClassifyError::decode(&name, e))?;

    let scope = match (scope, obj.namespace()) {
        (Scope::Namespaced(_), Some(ns)) => Scope::Namespaced(ns),
        (scope, _) => scope,
    };
    classify(name, scope, &rule)
}

pub fn classify(name: String, scope: Scope, rule: &PolicyRule) -> Result<Policy, ClassifyError> {
    let (selector, pod_namespace) = match (&rule.endpoint_selector, &rule.node_selector) {
        (Some(selector), _) => endpoint_selector(&name, selector)?,
        (None, Some(_)) => {
            return Err(ClassifyError::decode(
                &name,
                anyhow::anyhow!("policy selects nodes, not endpoints"),
            ));
        }
        (None, None) => (Selector::default(), None),
    };

    Ok(Policy {
        dialect: Dialect::Cilium,
        scope,
        selector,
        pod_namespace,
        ingress: rules(rule.ingress.as_deref(), rule.ingress_deny.as_deref()),
        egress: rules(rule.egress.as_deref(), rule.egress_deny.as_deref()),
        name,
    })
}

fn endpoint_selector(
    policy: &str,
    selector: &EndpointSelector,
) -> Result<(Selector, Option<String>), ClassifyError> {
    let mut labels = Map::new();
    let mut pod_namespace = None;
    for (raw_key, value) in selector.match_labels.iter().flatten() {
        let key = match label_key(policy, raw_key) {
            Some(key) => key,
            None => continue,
        };
        let value = match value.as_str() {
            Some(value) => value.to_string(),
            None => {
                return Err(ClassifyError::selector(
                    policy,
                    raw_key,
                    format_args!("label value must be a string, got {value}"),
                ));
            }
        };
        if key == POD_NAMESPACE_LABEL {
            pod_namespace = Some(value);
        } else {
            labels.insert(key, value);
        }
    }

    let mut expressions = vec![];
    for req in selector.match_expressions.iter().flatten() {
        let key = match label_key(policy, &req.key) {
            Some(key) => key,
            None => continue,
        };
        expressions.push(selector::expression(
            policy,
            key,
            &req.operator,
            req.values.clone(),
        )?);
    }

    Ok((Selector::new(labels, expressions), pod_namespace))
}

/// Strips a label source prefix, returning `None` (with a diagnostic) when
/// the remainder is not a valid label key.
fn label_key(policy: &str, key: &str) -> Option<String> {
    let stripped = SOURCE_PREFIXES
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix))
        .unwrap_or(key);
    if !LABEL_KEY.is_match(stripped) {
        warn!(%policy, %key, "Skipping unsupported selector key");
        return None;
    }
    Some(stripped.to_string())
}

fn rules(allow: Option<&[RuleEntry]>, deny: Option<&[RuleEntry]>) -> Vec<Rule> {
    allow
        .into_iter()
        .flatten()
        .map(|entry| {
            if entry.is_empty() {
                Rule::Vacuous
            } else {
                Rule::Populated
            }
        })
        .chain(deny.into_iter().flatten().map(|_| Rule::Populated))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use netfetch_core::{Expression, Labels, Operator};
    use serde_json::json;

    fn mk_object(namespace: Option<&str>, spec: serde_json::Value) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "cilium.io/v2",
            "kind": "CiliumNetworkPolicy",
            "metadata": { "name": "policy-0", "namespace": namespace },
            "spec": spec,
        }))
        .expect("object must decode")
    }

    fn shop() -> Scope {
        Scope::Namespaced("shop".to_string())
    }

    #[test]
    fn empty_rules_are_deny_all() {
        for (spec, msg) in [
            (json!({ "endpointSelector": {} }), "no rules"),
            (
                json!({ "endpointSelector": { "matchLabels": {} }, "ingress": [], "egress": [] }),
                "empty rule lists",
            ),
            (json!({ "endpointSelector": {}, "ingress": [{}] }), "single vacuous entry"),
            (json!({}), "no selector"),
        ] {
            let policy = classify_object(&mk_object(Some("shop"), spec), shop())
                .unwrap_or_else(|e| panic!("{}: {}", msg, e));
            assert!(policy.is_default_deny_all(), "{}", msg);
            assert!(policy.applies_to_namespace("shop"), "{}", msg);
        }
    }

    #[test]
    fn deny_rules_are_populated() {
        let policy = classify_object(
            &mk_object(
                Some("shop"),
                json!({ "endpointSelector": {}, "ingressDeny": [{}] }),
            ),
            shop(),
        )
        .expect("policy must classify");
        assert!(!policy.is_default_deny_all());
        assert!(policy.has_populated_rule());
    }

    #[test]
    fn strips_source_prefixes() {
        let policy = classify_object(
            &mk_object(
                Some("shop"),
                json!({
                    "endpointSelector": {
                        "matchLabels": { "k8s:app": "web", "reserved:host": "" },
                        "matchExpressions": [{ "key": "any:tier", "operator": "Exists" }],
                    },
                    "ingress": [{ "fromEndpoints": [{}] }],
                }),
            ),
            shop(),
        )
        .expect("policy must classify");

        assert_eq!(
            policy.selector,
            Selector::new(
                Some(("app".to_string(), "web".to_string())).into_iter().collect(),
                vec![Expression::new("tier", Operator::Exists, None::<String>)],
            )
        );
        let labels = Labels::from_iter(vec![("app", "web"), ("tier", "frontend")]);
        assert!(policy.selector.matches(&labels));
    }

    #[test]
    fn skipped_keys_ignore_value_types() {
        let policy = classify_object(
            &mk_object(
                Some("shop"),
                json!({
                    "endpointSelector": {
                        "matchLabels": { "reserved:host": true, "app": "web" },
                    },
                    "ingress": [{ "fromEntities": ["cluster"] }],
                }),
            ),
            shop(),
        )
        .expect("policy must classify");
        assert_eq!(
            policy.selector,
            Selector::new(
                Some(("app".to_string(), "web".to_string())).into_iter().collect(),
                vec![],
            )
        );
    }

    #[test]
    fn pod_namespace_restricts_cluster_policy() {
        let policy = classify_object(
            &mk_object(
                None,
                json!({
                    "endpointSelector": {
                        "matchLabels": { "k8s:io.kubernetes.pod.namespace": "shop" },
                    },
                    "egress": [{ "toEntities": ["world"] }],
                }),
            ),
            Scope::ClusterWide,
        )
        .expect("policy must classify");

        assert_eq!(policy.scope, Scope::ClusterWide);
        assert_eq!(policy.pod_namespace.as_deref(), Some("shop"));
        assert!(policy.selector.is_empty());
        assert!(!policy.applies_to_all());
        assert!(policy.applies_to_namespace("shop"));
        assert!(!policy.is_visible_in("pay"));
    }

    #[test]
    fn invalid_policies() {
        let error = classify_object(
            &mk_object(Some("shop"), json!({ "nodeSelector": {} })),
            shop(),
        )
        .expect_err("node policies must be skipped");
        assert!(matches!(error, ClassifyError::Decode { .. }));

        let error = classify_object(
            &mk_object(
                Some("shop"),
                json!({ "endpointSelector": { "matchLabels": { "app": 7 } } }),
            ),
            shop(),
        )
        .expect_err("label values must be strings");
        assert!(matches!(error, ClassifyError::SelectorParse { .. }));

        let error = classify_object(
            &mk_object(
                Some("shop"),
                json!({
                    "endpointSelector": {
                        "matchExpressions": [{ "key": "app", "operator": "In", "values": [] }],
                    },
                }),
            ),
            shop(),
        )
        .expect_err("in requires values");
        assert!(matches!(error, ClassifyError::SelectorParse { .. }));

        let mut obj = mk_object(Some("shop"), json!({}));
        obj.data = json!({});
        let error = classify_object(&obj, shop()).expect_err("spec is required");
        assert!(matches!(error, ClassifyError::MissingSpec(_)));
    }
}
