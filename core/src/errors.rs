//! Error types for retry and circuit breaker operations

use std::fmt;
use thiserror::Error;

/// Why an invocation ended without a successful result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The action failed with an error no rule selects; it was never retried
    Unmatched,
    /// Matched failures persisted through the whole attempt budget
    Exhausted,
    /// A retry callback cut the loop short via `ExecutionContext::cancel`
    Cancelled,
    /// The retry deadline passed; reported through the failure callback
    DeadlineExceeded,
    /// The circuit was open, the action was not attempted
    CircuitOpen,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Unmatched => "unmatched",
            FailureReason::Exhausted => "exhausted",
            FailureReason::Cancelled => "cancelled",
            FailureReason::DeadlineExceeded => "deadline_exceeded",
            FailureReason::CircuitOpen => "circuit_open",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a retry invocation, wrapping the last error seen
#[derive(Debug, Error)]
#[error("retry {reason} after {attempts} attempt(s)")]
pub struct RetryError<E> {
    /// How the loop ended
    pub reason: FailureReason,
    /// Number of retry attempts consumed (0 for an unmatched first failure)
    pub attempts: u32,
    /// The latest failure produced by the action
    #[source]
    pub error: E,
}

impl<E> RetryError<E> {
    pub(crate) fn new(reason: FailureReason, attempts: u32, error: E) -> Self {
        Self {
            reason,
            attempts,
            error,
        }
    }

    /// Unwrap the original error, discarding retry metadata
    pub fn into_inner(self) -> E {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug, Error)]
    #[error("connection refused")]
    struct Refused;

    #[test]
    fn test_retry_error_display_and_source() {
        let err = RetryError::new(FailureReason::Exhausted, 3, Refused);

        assert_eq!(err.to_string(), "retry exhausted after 3 attempt(s)");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("connection refused".to_string())
        );
    }

    #[test]
    fn test_into_inner_returns_original_error() {
        let err = RetryError::new(FailureReason::Unmatched, 0, "boom");
        assert_eq!(err.into_inner(), "boom");
    }

    #[test]
    fn test_reason_names() {
        assert_eq!(FailureReason::DeadlineExceeded.to_string(), "deadline_exceeded");
        assert_eq!(FailureReason::CircuitOpen.as_str(), "circuit_open");
    }
}
