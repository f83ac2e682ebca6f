//! Reads and remediates netfetch's view of a Kubernetes cluster.
//!
//! Raw API objects never leave this crate: policies are decoded and validated
//! into [`netfetch_core::Policy`] values at the boundary, and policies that
//! cannot be classified are skipped with a diagnostic so that a single
//! malformed object does not fail a whole listing.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cilium;
mod client;
mod error;
pub mod network_policy;
pub mod pod;
mod selector;
pub mod template;

pub use self::{client::KubeCluster, error::ClassifyError};

/// The field manager recorded on objects netfetch creates.
pub const FIELD_MANAGER: &str = "netfetch";
