//! Circuit breaker implementation using state machines
//!
//! The breaker wraps an unbounded retry loop. Every handled failure is fed to
//! the `BreakerStrategy`; once it signals, the circuit opens and the running
//! loop is cancelled. While open, calls go straight to the recovery function
//! until the cooldown has elapsed, at which point the circuit closes again
//! with fresh counters. There is no half-open probing state.

use crate::{
    builder::CircuitBuilder,
    callbacks::Callbacks,
    clock::{Clock, MonotonicClock},
    errors::FailureReason,
    retry::{RetryLimit, RetryPolicy},
    strategy::BreakerStrategy,
};
use state_machines::state_machine;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds an open circuit waits before closing again
    pub cooldown_secs: f64,

    /// Jitter factor for cooldown_secs (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: cooldown * (1 - jitter + rand * jitter)
    pub jitter_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cooldown_secs: 30.0,
            jitter_factor: 0.0,
        }
    }
}

/// Context provided to recovery closures
#[derive(Debug, Clone)]
pub struct FallbackContext {
    /// Circuit name
    pub circuit_name: String,
    /// Why the action did not produce a value
    pub reason: FailureReason,
    /// Retry attempts consumed by this call (0 when short-circuited)
    pub attempts: u32,
    /// Timestamp when circuit opened, if it is open
    pub opened_at: Option<f64>,
    /// Current circuit state
    pub state: &'static str,
}

/// Circuit breaker context - shared data across all states
#[derive(Clone)]
pub struct CircuitContext {
    pub name: String,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
}

impl Default for CircuitContext {
    fn default() -> Self {
        Self {
            name: String::new(),
            config: Config::default(),
            clock: Arc::new(MonotonicClock::new()),
        }
    }
}

impl std::fmt::Debug for CircuitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitContext")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish()
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    pub opened_at: f64,
}

// Two-state lifecycle: Closed -> Open on trip, Open -> Closed after cooldown
state_machine! {
    name: Circuit,
    context: CircuitContext,
    dynamic: true,

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
    ],
    events {
        trip {
            transition: { from: Closed, to: Open }
        }
        close {
            guards: [cooldown_elapsed],
            transition: { from: Open, to: Closed }
        }
    }
}

impl Circuit<Open> {
    /// Check if the cooldown has elapsed for Open -> Closed transition
    fn cooldown_elapsed(&self, ctx: &CircuitContext) -> bool {
        let Some(data) = self.state_data_open() else {
            return false;
        };
        let elapsed = ctx.clock.monotonic_time() - data.opened_at;

        let cooldown_secs = if ctx.config.jitter_factor > 0.0 {
            let policy = chrono_machines::Policy {
                max_attempts: 1,
                base_delay_ms: (ctx.config.cooldown_secs * 1000.0) as u64,
                multiplier: 1.0,
                max_delay_ms: (ctx.config.cooldown_secs * 1000.0) as u64,
            };
            let cooldown_ms = policy.calculate_delay(1, ctx.config.jitter_factor);
            (cooldown_ms as f64) / 1000.0
        } else {
            ctx.config.cooldown_secs
        };

        elapsed >= cooldown_secs
    }
}

/// Circuit breaker public API
///
/// Shared state (status, `opened_at`, strategy counters) is mutated through
/// `&mut self`; wrap the breaker in a `Mutex` to share it between threads.
pub struct CircuitBreaker<E> {
    machine: DynamicCircuit,
    context: CircuitContext,
    policy: RetryPolicy<E>,
    strategy: BreakerStrategy,
    callbacks: Callbacks,
}

impl<E> CircuitBreaker<E> {
    /// Create a breaker that handles every failure without waiting between
    /// attempts (use builder() for more options)
    pub fn new(name: impl Into<String>, config: Config, strategy: BreakerStrategy) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let policy = RetryPolicy::builder()
            .clock(clock.clone())
            .unbounded()
            .build();
        let context = CircuitContext {
            name: name.into(),
            config,
            clock,
        };

        Self::with_parts(context, policy, strategy, Callbacks::new())
    }

    /// Assemble a breaker from prepared parts (used by builder)
    pub(crate) fn with_parts(
        context: CircuitContext,
        policy: RetryPolicy<E>,
        strategy: BreakerStrategy,
        callbacks: Callbacks,
    ) -> Self {
        debug_assert_eq!(policy.limit(), RetryLimit::Unbounded);
        let machine = DynamicCircuit::new(context.clone());

        Self {
            machine,
            context,
            policy,
            strategy,
            callbacks,
        }
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> CircuitBuilder<E> {
        CircuitBuilder::new(name)
    }

    /// Execute `action` with retry and circuit breaker protection
    ///
    /// `recover` supplies the result whenever the action does not: the circuit
    /// is open, the failure is unhandled, or retries were cancelled because the
    /// circuit opened mid-loop.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_machines::CircuitBreaker;
    ///
    /// let mut circuit = CircuitBreaker::builder("inventory")
    ///     .threshold(3)
    ///     .cooldown_secs(30.0)
    ///     .build();
    ///
    /// let stock = circuit.call(|_ctx| 0, || Err::<u32, _>("timeout"));
    ///
    /// assert_eq!(stock, 0);
    /// assert!(circuit.is_open());
    /// ```
    pub fn call<T, A, R>(&mut self, recover: R, action: A) -> T
    where
        A: FnMut() -> Result<T, E>,
        R: FnOnce(&FallbackContext) -> T,
    {
        // Check for cooldown-based Open -> Closed transition
        if self.is_open() && self.machine.handle(CircuitEvent::Close).is_ok() {
            self.strategy.reset();
            info!(circuit = %self.context.name, "circuit closed after cooldown");
            self.callbacks.trigger_close(&self.context.name);
        }

        if self.is_open() {
            debug!(circuit = %self.context.name, "circuit open, short-circuiting call");
            return recover(&self.fallback_context(FailureReason::CircuitOpen, 0));
        }

        let Self {
            machine,
            context,
            policy,
            strategy,
            callbacks,
        } = self;

        let result = policy.run(action, |_error, ctx| {
            let now = context.clock.monotonic_time();
            if strategy.on_failure(now) && machine.handle(CircuitEvent::Trip).is_ok() {
                if let Some(data) = machine.open_data_mut() {
                    data.opened_at = now;
                }
                warn!(
                    circuit = %context.name,
                    opened_at = now,
                    strategy = strategy.name(),
                    "circuit opened"
                );
                callbacks.trigger_open(&context.name);
                ctx.cancel();
            }
        });

        match result {
            Ok(value) => {
                self.strategy.on_success();
                value
            }
            Err(err) => recover(&self.fallback_context(err.reason, err.attempts)),
        }
    }

    fn fallback_context(&self, reason: FailureReason, attempts: u32) -> FallbackContext {
        FallbackContext {
            circuit_name: self.context.name.clone(),
            reason,
            attempts,
            opened_at: self.opened_at(),
            state: self.state_name(),
        }
    }

    /// Check if circuit is open
    pub fn is_open(&self) -> bool {
        self.machine.current_state() == "Open"
    }

    /// Check if circuit is closed
    pub fn is_closed(&self) -> bool {
        self.machine.current_state() == "Closed"
    }

    /// Get current state name
    pub fn state_name(&self) -> &'static str {
        self.machine.current_state()
    }

    /// Monotonic timestamp of the last opening, while open
    pub fn opened_at(&self) -> Option<f64> {
        self.machine.open_data().map(|d| d.opened_at)
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// Current strategy, including its counters
    pub fn strategy(&self) -> &BreakerStrategy {
        &self.strategy
    }

    /// Reset strategy counters and return the circuit to Closed
    pub fn reset(&mut self) {
        self.strategy.reset();
        // Recreate machine in Closed state
        self.machine = DynamicCircuit::new(self.context.clone());
    }
}

impl<E> std::fmt::Debug for CircuitBreaker<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state_name())
            .field("context", &self.context)
            .field("policy", &self.policy)
            .field("strategy", &self.strategy)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
