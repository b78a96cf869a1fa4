//! Cooperative cancellation
//!
//! A [`CancelToken`] is cheap to clone and shared between the caller and a
//! running analysis. Long loops call [`CancelToken::check`] at iteration
//! boundaries and stop with [`AnalysisError::Cancelled`].

use crate::error::AnalysisError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag with an optional wall-clock deadline
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Token that is never cancelled unless [`cancel`](Self::cancel) is called
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also expires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Request cancellation; visible to all clones
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once cancelled or past the deadline
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    /// Fail with `Cancelled` when cancelled or past the deadline
    pub fn check(&self, context: &str) -> Result<(), AnalysisError> {
        if self.flag.load(Ordering::Relaxed) {
            return Err(AnalysisError::Cancelled(format!("{} cancelled", context)));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(AnalysisError::Cancelled(format!(
                    "{} exceeded its deadline",
                    context
                )));
            }
        }
        Ok(())
    }
}
