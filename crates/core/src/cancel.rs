use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Why a job stopped at a cancellation checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation flag shared between a job and whoever supervises it.
///
/// Long blocking steps poll the flag (gix does so during fetch); the
/// pipeline calls [`Cancellation::check`] between steps. Clones share the
/// same flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same flag, but [`check`](Self::check) also fails once `timeout` has elapsed.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The raw flag, for APIs that poll an `AtomicBool` themselves.
    pub fn flag(&self) -> &AtomicBool {
        &self.flag
    }

    /// An elapsed deadline is reported as such even when a watchdog has
    /// already raised the flag for it.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Interrupted::DeadlineExceeded);
        }
        if self.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        Ok(())
    }
}
