use crate::{Dialect, Scope};
use thiserror::Error;

/// Errors that abort a scan.
#[derive(Debug, Error)]
pub enum Error {
    #[error("namespace {0} does not exist")]
    NamespaceNotFound(String),

    #[error("failed to list {resource}: {source}")]
    Fetch {
        resource: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Remediation(#[from] RemediationError),
}

/// Errors creating a default deny-all policy.
///
/// A failed remediation never changes the result of the scan that offered it.
#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("{dialect} policies cannot be created at {scope} scope")]
    Unsupported { dialect: Dialect, scope: Scope },

    #[error("failed to create default deny-all {dialect} policy in {scope}: {source}")]
    Create {
        dialect: Dialect,
        scope: Scope,
        #[source]
        source: anyhow::Error,
    },
}

// === impl Error ===

impl Error {
    pub(crate) fn fetch(resource: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Fetch { resource, source }
    }

    /// Indicates the error should be reported as a missing resource (e.g. an
    /// HTTP 404) rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NamespaceNotFound(_))
    }
}
