//! Decides whether a pod is covered by at least one applicable policy.
//!
//! A pod is protected when, in order:
//!
//! 1. it is already in the [`ProtectionCache`];
//! 2. a cluster-wide deny-all policy with an empty selector exists;
//! 3. a policy selects every pod in the pod's namespace;
//! 4. a policy's selector matches the pod's labels and the policy is either a
//!    deny-all or carries at least one populated rule.
//!
//! Step 4 only checks for the *presence* of a rule. Whether the rule actually
//! restricts the traffic the workload sees is not evaluated.

use crate::{cache::Lookup, Pod, PodId, Policy, ProtectionCache, UnprotectedPod};
use tracing::{debug, trace};

/// Why a pod was considered protected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Protection {
    /// A previous evaluation in this session proved the pod protected.
    Cached,
    ClusterDenyAll { policy: String },
    NamespaceWide { policy: String },
    Selected { policy: String, deny_all: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Protected(Protection),
    Unprotected,
}

/// The partition of a set of pods into protected and unprotected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Coverage {
    pub protected: Vec<PodId>,
    pub unprotected: Vec<UnprotectedPod>,
}

// === impl Verdict ===

impl Verdict {
    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Protected(_))
    }
}

/// Evaluates a single pod against the policies visible to it, consulting and
/// updating `cache`.
///
/// `policies` may include policies that are not visible in the pod's
/// namespace; those are ignored.
pub fn evaluate(pod: &Pod, policies: &[Policy], cache: &ProtectionCache) -> Verdict {
    match cache.check_or_insert_with(&pod.id, || protection(pod, policies)) {
        Lookup::Cached => {
            trace!(pod = %pod.id, "Cached");
            Verdict::Protected(Protection::Cached)
        }
        Lookup::Inserted(protection) => {
            debug!(pod = %pod.id, ?protection, "Protected");
            Verdict::Protected(protection)
        }
        Lookup::Absent => {
            debug!(pod = %pod.id, "Unprotected");
            Verdict::Unprotected
        }
    }
}

/// Evaluates every running pod in `pods`. Pods in any other phase are
/// ignored entirely.
pub fn evaluate_all<'p>(
    pods: impl IntoIterator<Item = &'p Pod>,
    policies: &[Policy],
    cache: &ProtectionCache,
) -> Coverage {
    let mut coverage = Coverage::default();
    for pod in pods.into_iter().filter(|p| p.is_running()) {
        match evaluate(pod, policies, cache) {
            Verdict::Protected(_) => coverage.protected.push(pod.id.clone()),
            Verdict::Unprotected => coverage.unprotected.push(pod.into()),
        }
    }
    coverage
}

/// Returns whether the policy's selector targets the pod.
pub fn selects(policy: &Policy, pod: &Pod) -> bool {
    policy.is_visible_in(pod.namespace()) && policy.selector.matches(&pod.labels)
}

fn protection(pod: &Pod, policies: &[Policy]) -> Option<Protection> {
    let ns = pod.namespace();
    let visible = || policies.iter().filter(move |p| p.is_visible_in(ns));

    if let Some(policy) = visible()
        .find(|p| p.is_cluster_wide() && p.applies_to_all() && p.is_default_deny_all())
    {
        return Some(Protection::ClusterDenyAll {
            policy: policy.name.clone(),
        });
    }

    if let Some(policy) = visible().find(|p| p.applies_to_namespace(ns)) {
        return Some(Protection::NamespaceWide {
            policy: policy.name.clone(),
        });
    }

    visible()
        .filter(|p| p.selector.matches(&pod.labels))
        .find_map(|p| {
            let deny_all = p.is_default_deny_all();
            if deny_all || p.has_populated_rule() {
                Some(Protection::Selected {
                    policy: p.name.clone(),
                    deny_all,
                })
            } else {
                None
            }
        })
}
