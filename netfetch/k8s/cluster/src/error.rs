/// Reasons a policy object could not be classified. The offending policy is
/// skipped; the listing continues.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("policy {policy}: invalid selector on {key:?}: {reason}")]
    SelectorParse {
        policy: String,
        key: String,
        reason: String,
    },

    #[error("policy {policy}: failed to decode: {source}")]
    Decode {
        policy: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("policy {0} has no spec")]
    MissingSpec(String),
}

// === impl ClassifyError ===

impl ClassifyError {
    pub(crate) fn selector(
        policy: &str,
        key: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::SelectorParse {
            policy: policy.to_string(),
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(policy: &str, source: impl Into<anyhow::Error>) -> Self {
        Self::Decode {
            policy: policy.to_string(),
            source: source.into(),
        }
    }
}
