//! Retry engine: fixed-count, unbounded and deadline-bounded retry loops
//!
//! Every invocation runs the same loop:
//! 1. run the action, return on success
//! 2. stop immediately if no rule handles the failure
//! 3. fire the retry callback with a fresh `ExecutionContext`; stop if it cancelled
//! 4. sleep per the `SleepPolicy`, then try again until the limit is reached
//!
//! When the loop gives up, a recovery function (if supplied) provides the
//! result and the failure callback stays silent. Without recovery the failure
//! callback fires once and the last error is returned unchanged.

use crate::{
    builder::RetryBuilder,
    callbacks::RetryCallbacks,
    classifier::FailureMatcher,
    clock::{Clock, MonotonicClock},
    context::ExecutionContext,
    errors::{FailureReason, RetryError},
    sleep::SleepPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// When a retry loop stops trying
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryLimit {
    /// Give up after this many handled failures (at least 1)
    Attempts(u32),
    /// Keep going until success, cancellation or an unhandled failure
    Unbounded,
    /// Keep going until `secs` have passed since the invocation started
    ///
    /// Only the decision to try again is gated; a running action is never
    /// interrupted.
    Deadline { secs: f64 },
}

impl Default for RetryLimit {
    fn default() -> Self {
        RetryLimit::Attempts(3)
    }
}

/// Immutable retry configuration, reusable across threads and invocations
pub struct RetryPolicy<E> {
    matcher: FailureMatcher<E>,
    callbacks: RetryCallbacks<E>,
    sleep: SleepPolicy,
    limit: RetryLimit,
    clock: Arc<dyn Clock>,
}

impl<E> RetryPolicy<E> {
    /// Create a new retry policy builder
    pub fn builder() -> RetryBuilder<E> {
        RetryBuilder::new()
    }

    pub(crate) fn from_parts(
        matcher: FailureMatcher<E>,
        callbacks: RetryCallbacks<E>,
        sleep: SleepPolicy,
        limit: RetryLimit,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            matcher,
            callbacks,
            sleep,
            limit,
            clock,
        }
    }

    /// Run `action` under this policy, returning the last error unchanged on give-up
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_machines::RetryPolicy;
    ///
    /// let policy = RetryPolicy::builder().max_attempts(3).build();
    ///
    /// let mut calls = 0;
    /// let result = policy.call(|| {
    ///     calls += 1;
    ///     if calls < 3 { Err("flaky") } else { Ok(calls) }
    /// });
    ///
    /// assert_eq!(result, Ok(3));
    /// ```
    pub fn call<T, A>(&self, action: A) -> Result<T, E>
    where
        A: FnMut() -> Result<T, E>,
    {
        self.execute(action).map_err(RetryError::into_inner)
    }

    /// Like [`call`](Self::call), keeping the reason and attempt count
    pub fn execute<T, A>(&self, action: A) -> Result<T, RetryError<E>>
    where
        A: FnMut() -> Result<T, E>,
    {
        self.run(action, |_, _| {}).inspect_err(|err| match err.reason {
            FailureReason::Unmatched | FailureReason::Exhausted => {
                self.callbacks.trigger_failure(&err.error)
            }
            // cancellation bypasses the failure callback; the deadline
            // wrapper already fired it
            _ => {}
        })
    }

    /// Run `action`, replacing any terminal failure with `recover`'s value
    ///
    /// The failure callback is not fired (except on deadline expiry); a
    /// recovery that also wants the notification receives the error and can
    /// report it itself.
    pub fn call_or_recover<T, A, R>(&self, action: A, recover: R) -> T
    where
        A: FnMut() -> Result<T, E>,
        R: FnOnce(RetryError<E>) -> T,
    {
        match self.run(action, |_, _| {}) {
            Ok(value) => value,
            Err(err) => recover(err),
        }
    }

    /// Core loop; `hook` runs after the retry callback on every handled failure
    pub(crate) fn run<T, A, H>(&self, mut action: A, mut hook: H) -> Result<T, RetryError<E>>
    where
        A: FnMut() -> Result<T, E>,
        H: FnMut(&E, &mut ExecutionContext),
    {
        let mut ctx = ExecutionContext::new();
        let (max_attempts, deadline) = match self.limit {
            RetryLimit::Attempts(max) => (Some(max.max(1)), None),
            RetryLimit::Unbounded => (None, None),
            RetryLimit::Deadline { secs } => (None, Some(self.clock.monotonic_time() + secs)),
        };
        let mut wait = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            let error = match action() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !self.matcher.matches(&error) {
                debug!(attempt, "failure not handled by retry policy");
                return Err(RetryError::new(FailureReason::Unmatched, attempt, error));
            }

            attempt = attempt.saturating_add(1);
            ctx.set_attempt(attempt);
            self.callbacks.trigger_retry(&error, &mut ctx);
            hook(&error, &mut ctx);

            let mut reason = FailureReason::Cancelled;
            if deadline.is_some_and(|deadline| self.clock.monotonic_time() >= deadline) {
                self.callbacks.trigger_failure(&error);
                reason = FailureReason::DeadlineExceeded;
                ctx.cancel();
            }
            if ctx.is_cancelled() {
                debug!(attempt, %reason, "retry loop cancelled");
                return Err(RetryError::new(reason, attempt, error));
            }

            wait = self.sleep.next_wait(attempt, wait);
            debug!(attempt, wait_ms = wait.as_millis() as u64, "retrying after handled failure");
            if !wait.is_zero() {
                self.clock.sleep(wait);
            }

            if max_attempts.is_some_and(|max| attempt >= max) {
                debug!(attempt, "retry attempts exhausted");
                return Err(RetryError::new(FailureReason::Exhausted, attempt, error));
            }
        }
    }

    pub fn limit(&self) -> RetryLimit {
        self.limit
    }

    pub fn matcher(&self) -> &FailureMatcher<E> {
        &self.matcher
    }

    pub fn sleep_policy(&self) -> &SleepPolicy {
        &self.sleep
    }
}

impl<E> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::from_parts(
            FailureMatcher::any(),
            RetryCallbacks::new(),
            SleepPolicy::none(),
            RetryLimit::default(),
            Arc::new(MonotonicClock::new()),
        )
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            matcher: self.matcher.clone(),
            callbacks: self.callbacks.clone(),
            sleep: self.sleep.clone(),
            limit: self.limit,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("matcher", &self.matcher)
            .field("callbacks", &self.callbacks)
            .field("sleep", &self.sleep)
            .field("limit", &self.limit)
            .field("clock", &self.clock)
            .finish()
    }
}
