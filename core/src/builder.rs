//! Builder API for ergonomic retry and circuit breaker configuration

use crate::{
    callbacks::{Callbacks, RetryCallbacks},
    circuit::{CircuitBreaker, CircuitContext, Config},
    classifier::{Categorized, FailureMatcher, FailureRule},
    clock::{Clock, MonotonicClock},
    context::ExecutionContext,
    retry::{RetryLimit, RetryPolicy},
    sleep::SleepPolicy,
    strategy::BreakerStrategy,
};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating retry policies with fluent API
pub struct RetryBuilder<E> {
    rules: Vec<FailureRule<E>>,
    callbacks: RetryCallbacks<E>,
    sleep: SleepPolicy,
    limit: RetryLimit,
    clock: Option<Arc<dyn Clock>>,
}

impl<E> RetryBuilder<E> {
    /// Create a builder: retry any failure up to 3 times without waiting
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            callbacks: RetryCallbacks::new(),
            sleep: SleepPolicy::none(),
            limit: RetryLimit::default(),
            clock: None,
        }
    }

    /// Add a failure rule; rules are OR-combined
    ///
    /// Without any rule the policy handles every failure.
    pub fn handle(mut self, rule: FailureRule<E>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Handle failures accepted by `predicate`
    pub fn handle_if<F>(self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.handle(FailureRule::matching(predicate))
    }

    /// Set callback fired after every handled failure
    ///
    /// The callback may call [`ExecutionContext::cancel`] to stop retrying.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&E, &mut ExecutionContext) + Send + Sync + 'static,
    {
        self.callbacks.on_retry = Some(Arc::new(f));
        self
    }

    /// Set callback fired once when retries give up without a recovery
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.callbacks.on_failure = Some(Arc::new(f));
        self
    }

    /// Set the wait schedule between attempts
    pub fn sleep(mut self, policy: SleepPolicy) -> Self {
        self.sleep = policy;
        self
    }

    /// Wait according to a fixed schedule, repeating its last entry
    pub fn sleep_sequence<I>(self, waits: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
    {
        self.sleep(SleepPolicy::sequence(waits))
    }

    /// Wait `f(attempt, previous_wait)` before each retry
    pub fn sleep_fn<F>(self, f: F) -> Self
    where
        F: Fn(u32, Duration) -> Duration + Send + Sync + 'static,
    {
        self.sleep(SleepPolicy::function(f))
    }

    /// Exponential backoff computed by chrono-machines
    pub fn exponential_backoff(
        self,
        base_delay_ms: u64,
        multiplier: f64,
        max_delay_ms: u64,
        jitter: f64,
    ) -> Self {
        self.sleep(SleepPolicy::exponential(
            base_delay_ms,
            multiplier,
            max_delay_ms,
            jitter,
        ))
    }

    /// Give up after `attempts` handled failures (minimum 1)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.limit = RetryLimit::Attempts(attempts.max(1));
        self
    }

    /// Retry until success, cancellation or an unhandled failure
    pub fn unbounded(mut self) -> Self {
        self.limit = RetryLimit::Unbounded;
        self
    }

    /// Stop retrying once `seconds` have elapsed since the call started
    pub fn retry_for_secs(mut self, seconds: f64) -> Self {
        self.limit = RetryLimit::Deadline { secs: seconds };
        self
    }

    /// Set custom clock (defaults to a monotonic wall clock)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the retry policy
    pub fn build(self) -> RetryPolicy<E> {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        RetryPolicy::from_parts(
            FailureMatcher::new(self.rules),
            self.callbacks,
            self.sleep,
            self.limit,
            clock,
        )
    }
}

impl<E> RetryBuilder<E>
where
    E: Categorized + 'static,
{
    /// Handle failures of `category` and its sub-categories
    pub fn handle_category(self, category: E::Category) -> Self {
        self.handle(FailureRule::of(category))
    }
}

impl<E> Default for RetryBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating circuit breakers with fluent API
///
/// The breaker retries without an attempt limit until its strategy opens the
/// circuit, so failure rules and sleep settings apply to that inner loop.
pub struct CircuitBuilder<E> {
    name: String,
    config: Config,
    strategy: BreakerStrategy,
    retry: RetryBuilder<E>,
    callbacks: Callbacks,
}

impl<E> CircuitBuilder<E> {
    /// Create a new builder for a circuit with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            strategy: BreakerStrategy::default(),
            retry: RetryBuilder::new(),
            callbacks: Callbacks::new(),
        }
    }

    /// Set the cooldown in seconds before an open circuit closes again
    pub fn cooldown_secs(mut self, seconds: f64) -> Self {
        self.config.cooldown_secs = seconds;
        self
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: cooldown * (1 - jitter + rand * jitter)
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.config.jitter_factor = factor;
        self
    }

    /// Set the failure counting strategy
    pub fn strategy(mut self, strategy: BreakerStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Open after `threshold` failures; a success forgives earlier failures
    pub fn threshold(self, threshold: usize) -> Self {
        self.strategy(BreakerStrategy::threshold(threshold))
    }

    /// Open after `threshold` failures in a row
    pub fn consecutive_threshold(self, threshold: usize) -> Self {
        self.strategy(BreakerStrategy::consecutive(threshold))
    }

    /// Open after `threshold` failures within one `bucket_secs` time bucket
    pub fn bucket_threshold(self, bucket_secs: f64, threshold: usize) -> Self {
        self.strategy(BreakerStrategy::time_bucket(bucket_secs, threshold))
    }

    /// Add a failure rule; unhandled failures neither retry nor count
    pub fn handle(mut self, rule: FailureRule<E>) -> Self {
        self.retry = self.retry.handle(rule);
        self
    }

    /// Handle failures accepted by `predicate`
    pub fn handle_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry = self.retry.handle_if(predicate);
        self
    }

    /// Set callback fired after every handled failure, before the strategy
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&E, &mut ExecutionContext) + Send + Sync + 'static,
    {
        self.retry = self.retry.on_retry(f);
        self
    }

    /// Set the wait schedule between attempts
    pub fn sleep(mut self, policy: SleepPolicy) -> Self {
        self.retry = self.retry.sleep(policy);
        self
    }

    /// Wait according to a fixed schedule, repeating its last entry
    pub fn sleep_sequence<I>(mut self, waits: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
    {
        self.retry = self.retry.sleep_sequence(waits);
        self
    }

    /// Wait `f(attempt, previous_wait)` before each retry
    pub fn sleep_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) -> Duration + Send + Sync + 'static,
    {
        self.retry = self.retry.sleep_fn(f);
        self
    }

    /// Exponential backoff between retries while the circuit stays closed
    pub fn exponential_backoff(
        mut self,
        base_delay_ms: u64,
        multiplier: f64,
        max_delay_ms: u64,
        jitter: f64,
    ) -> Self {
        self.retry = self
            .retry
            .exponential_backoff(base_delay_ms, multiplier, max_delay_ms, jitter);
        self
    }

    /// Set custom clock shared by retries and cooldown tracking
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.retry = self.retry.clock(clock);
        self
    }

    /// Set callback for when circuit opens
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker<E> {
        let clock = self
            .retry
            .clock
            .clone()
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let policy = self.retry.clock(clock.clone()).unbounded().build();

        let context = CircuitContext {
            name: self.name,
            config: self.config,
            clock,
        };

        CircuitBreaker::with_parts(context, policy, self.strategy, self.callbacks)
    }
}

impl<E> CircuitBuilder<E>
where
    E: Categorized + 'static,
{
    /// Handle failures of `category` and its sub-categories
    pub fn handle_category(mut self, category: E::Category) -> Self {
        self.retry = self.retry.handle_category(category);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::{ApiError, Kind};

    #[test]
    fn test_retry_builder_defaults() {
        let policy = RetryBuilder::<&str>::new().build();

        assert_eq!(policy.limit(), RetryLimit::Attempts(3));
        assert_eq!(policy.matcher().rules().len(), 1);
        assert!(policy.matcher().matches(&"anything"));
        assert_eq!(
            policy.sleep_policy().next_wait(1, Duration::ZERO),
            Duration::ZERO
        );
    }

    #[test]
    fn test_retry_builder_limits() {
        assert_eq!(
            RetryBuilder::<&str>::new().max_attempts(0).build().limit(),
            RetryLimit::Attempts(1)
        );
        assert_eq!(
            RetryBuilder::<&str>::new().unbounded().build().limit(),
            RetryLimit::Unbounded
        );
        assert_eq!(
            RetryBuilder::<&str>::new().retry_for_secs(2.5).build().limit(),
            RetryLimit::Deadline { secs: 2.5 }
        );
    }

    #[test]
    fn test_retry_builder_collects_rules() {
        let policy = RetryBuilder::<ApiError>::new()
            .handle_category(Kind::Timeout)
            .handle_if(|e| e.status == 503)
            .build();

        assert_eq!(policy.matcher().rules().len(), 2);
        assert!(policy.matcher().matches(&ApiError::new(Kind::Timeout, 0)));
        assert!(policy.matcher().matches(&ApiError::new(Kind::Validation, 503)));
        assert!(!policy.matcher().matches(&ApiError::new(Kind::Refused, 0)));
    }

    #[test]
    fn test_circuit_builder_defaults() {
        let circuit = CircuitBuilder::<&str>::new("test").build();

        assert_eq!(circuit.state_name(), "Closed");
        assert!(circuit.is_closed());
        assert_eq!(circuit.name(), "test");
        assert_eq!(circuit.strategy(), &BreakerStrategy::threshold(5));
    }

    #[test]
    fn test_circuit_builder_custom_config() {
        let circuit = CircuitBuilder::<&str>::new("test")
            .cooldown_secs(60.0)
            .jitter_factor(0.2)
            .bucket_threshold(30.0, 4)
            .build();

        assert!(circuit.is_closed());
        assert_eq!(circuit.config().cooldown_secs, 60.0);
        assert_eq!(circuit.config().jitter_factor, 0.2);
        assert_eq!(circuit.strategy(), &BreakerStrategy::time_bucket(30.0, 4));
    }

    #[test]
    fn test_circuit_builder_exponential_backoff() {
        use crate::clock::ManualClock;

        let clock = Arc::new(ManualClock::new());
        let mut circuit = CircuitBuilder::<&str>::new("test")
            .threshold(3)
            .exponential_backoff(100, 2.0, 1000, 0.0)
            .clock(clock.clone())
            .build();

        let _ = circuit.call(|_ctx| (), || Err::<(), _>("down"));

        // waits of 100ms and 200ms before the tripping failure
        assert!(circuit.is_open());
        let opened_at = circuit.opened_at().expect("open");
        assert!((opened_at - 0.3).abs() < 1e-9, "opened at {}", opened_at);
    }

    #[test]
    fn test_circuit_builder_with_callbacks() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let opened = Arc::new(AtomicBool::new(false));
        let opened_clone = opened.clone();

        let mut circuit = CircuitBuilder::new("test")
            .threshold(2)
            .on_open(move |_name| {
                opened_clone.store(true, Ordering::SeqCst);
            })
            .build();

        let value = circuit.call(|_ctx| "fallback", || Err::<&str, _>("error"));

        assert_eq!(value, "fallback");
        assert!(opened.load(Ordering::SeqCst));
    }
}
