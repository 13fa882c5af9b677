//! Callback system for retries, terminal failures and circuit transitions

use crate::context::ExecutionContext;
use std::sync::Arc;

pub type RetryCallback<E> = Arc<dyn Fn(&E, &mut ExecutionContext) + Send + Sync>;
pub type FailureCallback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Callbacks fired by the retry loop
pub struct RetryCallbacks<E> {
    /// Fired after every matched failure, before sleeping
    pub on_retry: Option<RetryCallback<E>>,
    /// Fired once when the loop gives up and no recovery was supplied
    pub on_failure: Option<FailureCallback<E>>,
}

impl<E> RetryCallbacks<E> {
    pub fn new() -> Self {
        Self {
            on_retry: None,
            on_failure: None,
        }
    }

    pub fn trigger_retry(&self, error: &E, ctx: &mut ExecutionContext) {
        if let Some(ref callback) = self.on_retry {
            callback(error, ctx);
        }
    }

    pub fn trigger_failure(&self, error: &E) {
        if let Some(ref callback) = self.on_failure {
            callback(error);
        }
    }
}

impl<E> Default for RetryCallbacks<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for RetryCallbacks<E> {
    fn clone(&self) -> Self {
        Self {
            on_retry: self.on_retry.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<E> std::fmt::Debug for RetryCallbacks<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryCallbacks")
            .field("on_retry", &self.on_retry.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Callbacks for circuit breaker state transitions
#[derive(Clone)]
pub struct Callbacks {
    pub on_open: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub on_close: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self {
            on_open: None,
            on_close: None,
        }
    }

    pub fn trigger_open(&self, circuit: &str) {
        if let Some(ref callback) = self.on_open {
            callback(circuit);
        }
    }

    pub fn trigger_close(&self, circuit: &str) {
        if let Some(ref callback) = self.on_close {
            callback(circuit);
        }
    }
}

impl Default for Callbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_callbacks_are_noops() {
        let callbacks = RetryCallbacks::<&str>::new();
        let mut ctx = ExecutionContext::new();

        callbacks.trigger_retry(&"error", &mut ctx);
        callbacks.trigger_failure(&"error");

        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_retry_callback_can_cancel() {
        let callbacks = RetryCallbacks::<&str> {
            on_retry: Some(Arc::new(|_error: &&str, ctx: &mut ExecutionContext| {
                ctx.cancel()
            })),
            on_failure: None,
        };
        let mut ctx = ExecutionContext::new();

        callbacks.trigger_retry(&"error", &mut ctx);

        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_transition_callbacks_receive_circuit_name() {
        let opened = Arc::new(AtomicUsize::new(0));
        let opened_clone = opened.clone();

        let callbacks = Callbacks {
            on_open: Some(Arc::new(move |name: &str| {
                assert_eq!(name, "payments");
                opened_clone.fetch_add(1, Ordering::SeqCst);
            })),
            on_close: None,
        };

        callbacks.trigger_open("payments");
        callbacks.trigger_close("payments");

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(format!("{:?}", callbacks), "Callbacks { on_open: true, on_close: false }");
    }
}
