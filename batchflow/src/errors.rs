//! Error types for the batchflow pipeline.
//!
//! Every failure in the pipeline core surfaces as a [`BatchflowError`];
//! nothing is silently swallowed. The only place data is intentionally
//! dropped without an error is the distinct sink's capacity overflow,
//! which is a documented design choice rather than a failure.

use thiserror::Error;

/// The main error type for batchflow operations.
#[derive(Debug, Error)]
pub enum BatchflowError {
    /// Invalid configuration, rejected at construction time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A document fetch failed inside a crawl round.
    #[error("Fetch failed for '{link}': {reason}")]
    Fetch {
        /// The link being fetched.
        link: String,
        /// Why the fetch failed.
        reason: String,
    },

    /// A sink's `receive` call failed, aborting the run.
    #[error("Sink '{sink}' failed: {reason}")]
    Sink {
        /// The sink that failed.
        sink: String,
        /// Why the sink failed.
        reason: String,
    },

    /// A user-supplied combinator function failed during batch resolution.
    #[error("Transform error: {0}")]
    Transform(String),

    /// The run was cancelled.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// A builder sink's output was requested before the run completed.
    #[error("Builder output not ready: {0}")]
    OutputNotReady(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchflowError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a fetch error for a link.
    #[must_use]
    pub fn fetch(link: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            link: link.into(),
            reason: reason.into(),
        }
    }

    /// Creates a sink error.
    #[must_use]
    pub fn sink(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Sink {
            sink: sink.into(),
            reason: reason.into(),
        }
    }

    /// Creates a transform error.
    #[must_use]
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform(message.into())
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    /// Creates an output-not-ready error.
    #[must_use]
    pub fn output_not_ready(message: impl Into<String>) -> Self {
        Self::OutputNotReady(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error represents a cancellation.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = BatchflowError::fetch("https://example.com", "connection refused");
        assert_eq!(
            err.to_string(),
            "Fetch failed for 'https://example.com': connection refused"
        );
    }

    #[test]
    fn test_sink_error_display() {
        let err = BatchflowError::sink("collector", "buffer poisoned");
        assert_eq!(err.to_string(), "Sink 'collector' failed: buffer poisoned");
    }

    #[test]
    fn test_is_cancellation() {
        assert!(BatchflowError::cancelled("user requested").is_cancellation());
        assert!(!BatchflowError::transform("bad item").is_cancellation());
    }
}
