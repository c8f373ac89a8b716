//! Cooperative cancellation for pipeline runs.
//!
//! A single [`CancellationToken`] is threaded through the pipe driver,
//! every sink's `receive` call, and every crawl fetch. The driver checks
//! it between rounds; in-flight work is never forcibly aborted.

use crate::errors::BatchflowError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct TokenState {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

/// Token for coordinating cancellation across a pipeline run.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Creates a new, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason if cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state.reason.lock().clone()
    }

    /// Requests cancellation with a reason.
    ///
    /// Idempotent: only the first reason is stored.
    pub fn cancel(&self, reason: impl Into<String>) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            *self.state.reason.lock() = Some(reason.into());
        }
    }

    /// Returns an error if cancellation has been requested.
    ///
    /// Convenience for long-running user code that wants to bail out
    /// cooperatively with `?`.
    pub fn ensure_active(&self) -> Result<(), BatchflowError> {
        if self.is_cancelled() {
            Err(BatchflowError::cancelled(
                self.reason().unwrap_or_else(|| "cancelled".to_string()),
            ))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_initial_state() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
        assert!(token.ensure_active().is_ok());
    }

    #[test]
    fn test_token_cancel() {
        let token = CancellationToken::new();
        token.cancel("user requested");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("user requested".to_string()));
        assert!(token.ensure_active().is_err());
    }

    #[test]
    fn test_token_idempotent() {
        let token = CancellationToken::new();
        token.cancel("first reason");
        token.cancel("second reason");

        // First reason wins
        assert_eq!(token.reason(), Some("first reason".to_string()));
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();

        clone.cancel("via clone");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("via clone".to_string()));
    }
}
