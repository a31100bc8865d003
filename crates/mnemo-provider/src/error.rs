//! Error types for provider calls.

use thiserror::Error;

/// Outcome classes for remote provider calls.
///
/// `CapabilityAbsent` is terminal for the whole process: the provider does
/// not implement the semantic-store API at all, so no amount of retrying
/// helps. Everything else that can heal on its own is `Transient` (or
/// `Timeout`, which callers treat the same way).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider does not expose the semantic-store capability.
    #[error("provider capability absent")]
    CapabilityAbsent,

    /// Network, auth, rate-limit, or server-side error; safe to retry.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Remote call exceeded its deadline.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Response arrived but did not match the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether a bounded retry with backoff is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Transient("503".into()).is_transient());
        assert!(ProviderError::Timeout(30_000).is_transient());
        assert!(!ProviderError::CapabilityAbsent.is_transient());
        assert!(!ProviderError::InvalidResponse("bad json".into()).is_transient());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ProviderError::CapabilityAbsent.to_string(),
            "provider capability absent"
        );
        assert_eq!(
            ProviderError::Timeout(500).to_string(),
            "timeout after 500ms"
        );
    }
}
