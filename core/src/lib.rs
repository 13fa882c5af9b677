//! RetryMachines - Retry policies and circuit breaking for fallible operations
//!
//! This crate provides:
//! - Failure rules matching error categories (with sub-categories) and predicates
//! - Retry loops bounded by attempt count, unbounded, or by a wall-clock deadline
//! - Fixed wait schedules, custom backoff functions and exponential backoff
//! - Per-call execution context so retry callbacks can cancel remaining attempts
//! - A Closed ⇄ Open circuit breaker with threshold, consecutive and
//!   time-bucket failure strategies
//!
//! # Example
//!
//! ```rust
//! use retry_machines::{CircuitBreaker, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .sleep_sequence([Duration::from_millis(1), Duration::from_millis(2)])
//!     .on_retry(|error: &String, ctx| println!("attempt {} failed: {}", ctx.attempt(), error))
//!     .build();
//!
//! let result = policy.call(|| Ok::<_, String>("success"));
//! assert_eq!(result, Ok("success"));
//!
//! let mut circuit = CircuitBreaker::builder("payment_api")
//!     .threshold(5)
//!     .cooldown_secs(30.0)
//!     .on_open(|name| println!("Circuit {} opened!", name))
//!     .build();
//!
//! // Recovery runs whenever the action cannot produce a value
//! let receipt = circuit.call(
//!     |_ctx| "queued".to_string(),
//!     || Ok::<_, String>("charged".to_string()),
//! );
//! assert_eq!(receipt, "charged");
//!
//! if circuit.is_open() {
//!     println!("Circuit is open, skipping call");
//! }
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod classifier;
pub mod clock;
pub mod context;
pub mod errors;
pub mod retry;
pub mod sleep;
pub mod strategy;

pub use builder::{CircuitBuilder, RetryBuilder};
pub use circuit::{CircuitBreaker, Config, FallbackContext};
pub use classifier::{Categorized, FailureCategory, FailureMatcher, FailureRule};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use context::ExecutionContext;
pub use errors::{FailureReason, RetryError};
pub use retry::{RetryLimit, RetryPolicy};
pub use sleep::{SleepFn, SleepPolicy};
pub use strategy::{BreakerStrategy, ThresholdCounter, TimeBucket};
