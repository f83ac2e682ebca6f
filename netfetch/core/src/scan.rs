//! Sequences namespace selection, policy classification and coverage
//! evaluation into a [`ScanResult`].
//!
//! For dialects with a cluster-scoped policy kind, an unscoped scan first
//! evaluates every pod against cluster-wide policies alone. When a
//! cluster-wide default deny-all selects every pod, the namespaced pass is
//! skipped and the scan scores [`MAX_SCORE`].

use crate::{
    coverage, namespace, remediation, score, visualize, Cluster, DenyAll, Dialect, Error, Pod,
    Policy, Prompt, ProtectionCache, UnprotectedPod, MAX_SCORE,
};
use anyhow::Context;
use futures::prelude::*;
use serde::Serialize;
use std::{collections::HashSet, fmt, sync::Arc};
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

/// Recorded in place of a namespace for findings about cluster-scoped policy.
pub const CLUSTER_WIDE: &str = "cluster-wide";

const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Controls whether findings lead to remediation.
#[derive(Clone, Default)]
pub enum Mode {
    /// Findings are only returned to the caller. Never prompts.
    #[default]
    Report,

    /// Findings are evaluated and reported; remediation is never offered.
    DryRun,

    /// Each finding prompts the operator, and accepted prompts create a
    /// default deny-all policy.
    Interactive(Arc<dyn Prompt>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub dialect: Dialect,
    pub namespaces_scanned: Vec<String>,

    /// Namespaces for which the operator declined remediation.
    pub denied_namespaces: Vec<String>,

    /// Namespaces skipped because their policies or pods could not be listed.
    pub failed_namespaces: Vec<String>,

    /// Namespaces (or [`CLUSTER_WIDE`]) with default deny-all coverage.
    pub has_deny_all: Vec<String>,

    pub unprotected_pods: Vec<UnprotectedPod>,
    pub policy_changes_made: bool,
    pub user_denied_policies: bool,

    /// Deny-all policies that were accepted but could not be created.
    pub remediation_failures: Vec<String>,

    pub all_pods_protected: bool,
    pub cancelled: bool,
    pub score: u8,
}

/// Drives scans against a [`Cluster`].
pub struct Scanner<C> {
    cluster: C,
    cache: ProtectionCache,
    mode: Mode,
    fetch_concurrency: usize,
    cancel: Option<watch::Receiver<bool>>,
}

/// The inputs that namespaced coverage is evaluated from.
type Fetched = anyhow::Result<(Vec<Policy>, Vec<Pod>)>;

// === impl Mode ===

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Report => f.write_str("Report"),
            Self::DryRun => f.write_str("DryRun"),
            Self::Interactive(_) => f.write_str("Interactive"),
        }
    }
}

// === impl ScanResult ===

impl ScanResult {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            namespaces_scanned: vec![],
            denied_namespaces: vec![],
            failed_namespaces: vec![],
            has_deny_all: vec![],
            unprotected_pods: vec![],
            policy_changes_made: false,
            user_denied_policies: false,
            remediation_failures: vec![],
            all_pods_protected: false,
            cancelled: false,
            score: MAX_SCORE,
        }
    }
}

// === impl Scanner ===

impl<C: Cluster> Scanner<C> {
    pub fn new(cluster: C, cache: ProtectionCache) -> Self {
        Self {
            cluster,
            cache,
            mode: Mode::default(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            cancel: None,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Limits how many namespaces' policies and pods are fetched at once.
    /// Evaluation always proceeds one namespace at a time, in order.
    pub fn with_fetch_concurrency(mut self, n: usize) -> Self {
        self.fetch_concurrency = n.max(1);
        self
    }

    /// Stops the scan before the next namespace once `true` is published.
    pub fn with_cancel(mut self, rx: watch::Receiver<bool>) -> Self {
        self.cancel = Some(rx);
        self
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    pub fn cache(&self) -> &ProtectionCache {
        &self.cache
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Scans `namespace`, or every non-system namespace, for pods that no
    /// `dialect` policy covers.
    ///
    /// Fails without a partial result when the namespace does not exist or a
    /// cluster-scoped listing fails. Namespace-local listing failures only
    /// skip that namespace.
    #[instrument(skip(self))]
    pub async fn scan(
        &self,
        dialect: Dialect,
        namespace: Option<&str>,
    ) -> Result<ScanResult, Error> {
        let namespaces = namespace::select(&self.cluster, namespace).await?;
        debug!(?namespaces);

        let cluster_policies = self
            .cluster
            .list_cluster_policies(dialect)
            .await
            .map_err(Error::fetch("cluster-wide policies"))?;

        let mut result = ScanResult::new(dialect);
        if dialect.has_cluster_scope() && namespace.is_none() {
            let protected = self
                .scan_cluster(dialect, &cluster_policies, &mut result)
                .instrument(info_span!("cluster"))
                .await?;
            if protected {
                info!("All pods are protected by cluster-wide policies");
                result.namespaces_scanned = vec![CLUSTER_WIDE.to_string()];
                result.all_pods_protected = true;
                result.score = MAX_SCORE;
                return Ok(result);
            }
        }

        self.scan_namespaces(dialect, namespaces, &cluster_policies, &mut result)
            .await;
        Ok(result)
    }

    /// Evaluates every non-system pod against cluster-wide policies alone.
    ///
    /// Only a cluster-wide, empty-selector deny-all proves every pod
    /// protected. Pods that are cached or selected by narrower policies are
    /// still scanned namespace by namespace.
    async fn scan_cluster(
        &self,
        dialect: Dialect,
        policies: &[Policy],
        result: &mut ScanResult,
    ) -> Result<bool, Error> {
        let deny_all = policies
            .iter()
            .find(|p| p.applies_to_all() && p.is_default_deny_all());
        let partial = policies
            .iter()
            .filter(|p| !p.applies_to_all() && p.is_default_deny_all())
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>();

        if let Some(policy) = deny_all {
            info!(policy = %policy.name, "Cluster-wide default deny-all policy detected");
            result.has_deny_all.push(CLUSTER_WIDE.to_string());
            return Ok(true);
        }

        if !partial.is_empty() {
            info!(
                policies = ?partial,
                "Deny-all policies detected, but none applies to the entire cluster"
            );
        } else {
            info!("No cluster-wide default deny-all policy detected");
            self.offer_remediation(DenyAll::cluster_wide(dialect), result)
                .await;
        }

        let pods = self
            .cluster
            .list_pods(None)
            .await
            .map_err(Error::fetch("pods"))?;
        let coverage = coverage::evaluate_all(
            pods.iter().filter(|p| !namespace::is_system(p.namespace())),
            policies,
            &self.cache,
        );
        info!(
            unprotected = coverage.unprotected.len(),
            "Pods not targeted by a cluster-wide policy; scanning namespaces"
        );
        Ok(false)
    }

    async fn scan_namespaces(
        &self,
        dialect: Dialect,
        namespaces: Vec<String>,
        cluster_policies: &[Policy],
        result: &mut ScanResult,
    ) {
        let cluster_deny_all = cluster_policies
            .iter()
            .any(|p| p.is_cluster_wide() && p.applies_to_all() && p.is_default_deny_all());
        let mut has_any_policies = !cluster_policies.is_empty();
        let mut deny_all_everywhere = true;
        let mut reported = HashSet::new();

        let mut fetches = stream::iter(namespaces)
            .map(|ns| async move {
                let fetched = self.fetch_namespace(dialect, &ns).await;
                (ns, fetched)
            })
            .buffered(self.fetch_concurrency);

        while let Some((ns, fetched)) = fetches.next().await {
            if self.is_cancelled() {
                info!("Scan cancelled");
                result.cancelled = true;
                break;
            }

            let (policies, pods) = match fetched {
                Ok(fetched) => fetched,
                Err(error) => {
                    warn!(%ns, error = format_args!("{:#}", error), "Skipping namespace");
                    result.failed_namespaces.push(ns);
                    continue;
                }
            };

            has_any_policies |= !policies.is_empty();
            let visible = cluster_policies
                .iter()
                .cloned()
                .chain(policies)
                .collect::<Vec<_>>();
            for policy in &visible {
                debug!(
                    %ns,
                    policy = %policy.name,
                    pods = ?visualize::target_pods(policy, &pods),
                    "Policy coverage"
                );
            }

            let covered = cluster_deny_all
                || visible
                    .iter()
                    .any(|p| p.applies_to_namespace(&ns) && p.is_default_deny_all());
            if covered {
                result.has_deny_all.push(ns.clone());
            } else {
                deny_all_everywhere = false;
            }

            let unprotected = coverage::evaluate_all(&pods, &visible, &self.cache)
                .unprotected
                .into_iter()
                .filter(|pod| reported.insert((pod.namespace.clone(), pod.name.clone())))
                .collect::<Vec<_>>();
            result.namespaces_scanned.push(ns.clone());

            if !unprotected.is_empty() {
                info!(%ns, unprotected = unprotected.len(), "Unprotected pods found");
                result.unprotected_pods.extend(unprotected);
                self.offer_remediation(DenyAll::namespaced(dialect, ns), result)
                    .await;
            }
        }

        let has_deny_all_coverage = !result.namespaces_scanned.is_empty() && deny_all_everywhere;
        result.score = score(
            has_any_policies,
            has_deny_all_coverage,
            result.unprotected_pods.len(),
        );
    }

    async fn fetch_namespace(&self, dialect: Dialect, ns: &str) -> Fetched {
        let policies = self
            .cluster
            .list_policies(dialect, ns)
            .await
            .with_context(|| format!("failed to list {dialect} policies"))?;
        let pods = self
            .cluster
            .list_pods(Some(ns))
            .await
            .context("failed to list pods")?;
        Ok((policies, pods))
    }

    /// Asks whether to create `policy` in interactive mode and records the
    /// outcome.
    async fn offer_remediation(&self, policy: DenyAll, result: &mut ScanResult) {
        let prompt = match &self.mode {
            Mode::Interactive(prompt) => prompt,
            Mode::Report | Mode::DryRun => return,
        };
        if self.is_cancelled() {
            debug!(%policy, "Scan cancelled; not offering remediation");
            return;
        }

        if !prompt.confirm(&policy.prompt()).await {
            result.user_denied_policies = true;
            if let Some(ns) = policy.scope.namespace() {
                result.denied_namespaces.push(ns.to_string());
            }
            return;
        }

        match remediation::apply(&self.cluster, &policy).await {
            Ok(()) => result.policy_changes_made = true,
            Err(error) => {
                error!(%error, "Failed to apply default deny-all policy");
                result.remediation_failures.push(policy.to_string());
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |rx| *rx.borrow())
    }
}
