//! Cooperative cancellation for conversion runs.
//!
//! A run never gets preempted. Instead it holds a [`CancellationToken`] and
//! calls [`CancellationToken::check`] after every suspension point (file
//! read, document load, each page render). Starting a new run cancels the
//! previous token, so stale work unwinds with [`PdfPagesError::Cancelled`]
//! at its next check.

use crate::error::PdfPagesError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Shared cancellation flag for one run. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    run_id: u64,
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            run_id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Process-unique identifier of the run this token belongs to.
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the token has been cancelled.
    pub fn check(&self) -> Result<(), PdfPagesError> {
        if self.is_cancelled() {
            Err(PdfPagesError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(clone.check().is_ok());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.check(), Err(PdfPagesError::Cancelled)));
    }

    #[test]
    fn run_ids_are_unique() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.run_id(), a.clone().run_id());
    }
}
