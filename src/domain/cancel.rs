//! Cooperative cancellation for long-running engine calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::StratlabError;

/// Shared flag the caller flips to abort an in-flight run.
///
/// The engine polls it at safe points (once per simulated bar, between
/// permutation trials). On cancellation every partial product — trades,
/// equity points, null-distribution samples — is dropped; no partial
/// result ever reaches the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Err(Cancelled) once the token has been tripped.
    pub fn check(&self) -> Result<(), StratlabError> {
        if self.is_cancelled() {
            Err(StratlabError::Cancelled)
        } else {
            Ok(())
        }
    }
}
