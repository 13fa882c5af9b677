//! Per-invocation retry state handed to retry callbacks

/// Mutable state owned by a single retry invocation
///
/// A fresh context is created for every call and passed by `&mut` into each
/// retry callback. Calling [`cancel`](Self::cancel) stops the loop after the
/// callback returns and propagates the failure that triggered it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    attempt: u32,
    cancelled: bool,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current 1-based attempt number; 0 before the first failure
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Request that no further attempts are made. Idempotent.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub(crate) fn set_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }
}
