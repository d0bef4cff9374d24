//! Error Types
//!
//! Every failure the hydration core can observe is a diagnostic, never a
//! crash. Errors are either returned from arming (configuration problems) or
//! collected into reports (cleanup and readiness failures) while the
//! hydration transition carries on.

use thiserror::Error;

/// Boxed error produced by a fallible cleanup callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the lazy hydration core.
#[derive(Debug, Error)]
pub enum HydrationError {
    /// A strategy that needs observation targets was armed on a region that
    /// rendered no elements.
    #[error("cannot arm `{strategy}` strategy: region rendered no root elements")]
    EmptyRootSet {
        /// Name of the strategy that refused to arm.
        strategy: &'static str,
    },

    /// A cleanup callback failed. The remaining cleanups still ran.
    #[error("cleanup callback #{index} failed: {source}")]
    Cleanup {
        /// Registration index of the failing callback.
        index: usize,
        /// The underlying failure.
        #[source]
        source: BoxError,
    },

    /// An async descendant rejected or was dropped before settling.
    #[error("async descendant `{descendant}` did not resolve: {reason}")]
    Readiness {
        /// Name the descendant registered under.
        descendant: String,
        /// Why it did not resolve.
        reason: String,
    },

    /// Region props or strategy options are malformed.
    #[error("invalid lazy hydration config: {0}")]
    InvalidConfig(String),

    /// Work had to be scheduled but no tokio runtime was running.
    #[error("no tokio runtime available to schedule hydration work")]
    NoRuntime,
}

impl HydrationError {
    /// Returns true for errors that indicate a mistake by the integrator
    /// rather than a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::EmptyRootSet { .. } | Self::InvalidConfig(_))
    }
}

impl From<serde_json::Error> for HydrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_flagged() {
        assert!(HydrationError::EmptyRootSet { strategy: "visible" }.is_configuration());
        assert!(HydrationError::InvalidConfig("bad".into()).is_configuration());
        assert!(!HydrationError::NoRuntime.is_configuration());
    }

    #[test]
    fn cleanup_error_keeps_source() {
        use std::error::Error as _;

        let err = HydrationError::Cleanup {
            index: 2,
            source: "listener already gone".into(),
        };
        assert_eq!(
            err.to_string(),
            "cleanup callback #2 failed: listener already gone"
        );
        assert!(err.source().is_some());
    }
}
