#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cache;
mod cluster;
pub mod coverage;
mod error;
mod labels;
pub mod namespace;
mod pod;
mod policy;
pub mod remediation;
mod scan;
mod score;
pub mod target;
pub mod visualize;


pub use self::{
    cache::{Lookup, ProtectionCache, Retention},
    cluster::{Cluster, Prompt},
    coverage::{Coverage, Protection, Verdict},
    error::{Error, RemediationError},
    labels::{Expression, Expressions, Labels, Map, Operator, Selector},
    pod::{ContainerPort, Phase, Pod, PodId, PodInfo, UnprotectedPod},
    policy::{is_vacuous, Dialect, Policy, Rule, Scope},
    remediation::DenyAll,
    scan::{Mode, ScanResult, Scanner, CLUSTER_WIDE},
    score::{score, MAX_SCORE, MIN_SCORE},
    target::TargetedPod,
    visualize::{PolicyVisualization, VisualizationData},
};
