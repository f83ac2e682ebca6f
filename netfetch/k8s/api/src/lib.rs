#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod policy;

pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Namespace, Pod, PodSpec, PodStatus},
        networking::v1::{NetworkPolicy, NetworkPolicySpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement},
};
pub use kube::{
    api::{Api, DynamicObject, ListParams, ObjectMeta, PostParams, ResourceExt},
    core::ApiResource,
    Client,
};
