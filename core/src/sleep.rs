//! Wait scheduling between retry attempts

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Backoff function: `(attempt, previous_wait) -> next_wait`
///
/// `attempt` is 1-based; `previous_wait` is the value this function returned
/// for the previous attempt, or zero before the first wait.
pub type SleepFn = Arc<dyn Fn(u32, Duration) -> Duration + Send + Sync>;

/// How long to wait before the next attempt
#[derive(Clone)]
pub enum SleepPolicy {
    /// Fixed schedule; the last entry repeats once the schedule runs out
    Sequence(Vec<Duration>),
    /// Computed fresh on every retry
    Function(SleepFn),
}

impl SleepPolicy {
    /// Never wait
    pub fn none() -> Self {
        Self::constant(Duration::ZERO)
    }

    /// Same wait before every attempt
    pub fn constant(wait: Duration) -> Self {
        Self::Sequence(vec![wait])
    }

    /// Fixed schedule of waits
    pub fn sequence<I>(waits: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
    {
        Self::Sequence(waits.into_iter().collect())
    }

    /// Wait computed from the attempt number and the previous wait
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retry_machines::SleepPolicy;
    /// use std::time::Duration;
    ///
    /// // double the previous wait, starting at 100ms, capped at 1s
    /// let policy = SleepPolicy::function(|_attempt, previous| {
    ///     if previous.is_zero() {
    ///         Duration::from_millis(100)
    ///     } else {
    ///         (previous * 2).min(Duration::from_secs(1))
    ///     }
    /// });
    ///
    /// assert_eq!(policy.next_wait(1, Duration::ZERO), Duration::from_millis(100));
    /// assert_eq!(policy.next_wait(2, Duration::from_millis(800)), Duration::from_secs(1));
    /// ```
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(u32, Duration) -> Duration + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    /// Exponential backoff: `base * multiplier^(attempt - 1)`, capped at `max`
    ///
    /// Jitter factor follows chrono-machines: `delay * (1 - jitter + rand * jitter)`
    pub fn exponential(base_delay_ms: u64, multiplier: f64, max_delay_ms: u64, jitter: f64) -> Self {
        let policy = chrono_machines::Policy {
            max_attempts: u8::MAX as _,
            base_delay_ms,
            multiplier,
            max_delay_ms,
        };

        Self::function(move |attempt, _previous| {
            let attempt = attempt.clamp(1, u8::MAX as u32);
            Duration::from_millis(policy.calculate_delay(attempt as _, jitter))
        })
    }

    /// Wait before the retry following failure number `attempt` (1-based)
    pub fn next_wait(&self, attempt: u32, previous: Duration) -> Duration {
        match self {
            SleepPolicy::Sequence(waits) => {
                let index = attempt.saturating_sub(1) as usize;
                waits
                    .get(index)
                    .or_else(|| waits.last())
                    .copied()
                    .unwrap_or(Duration::ZERO)
            }
            SleepPolicy::Function(f) => f(attempt, previous),
        }
    }
}

impl Default for SleepPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for SleepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepPolicy::Sequence(waits) => f.debug_tuple("Sequence").field(waits).finish(),
            SleepPolicy::Function(_) => f.debug_tuple("Function").field(&"<closure>").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_default_never_waits() {
        let policy = SleepPolicy::default();

        for attempt in 1..5 {
            assert_eq!(policy.next_wait(attempt, Duration::ZERO), Duration::ZERO);
        }
    }

    #[test]
    fn test_sequence_reuses_last_entry() {
        let policy = SleepPolicy::sequence([ms(10), ms(20), ms(50)]);

        assert_eq!(policy.next_wait(1, Duration::ZERO), ms(10));
        assert_eq!(policy.next_wait(2, ms(10)), ms(20));
        assert_eq!(policy.next_wait(3, ms(20)), ms(50));
        assert_eq!(policy.next_wait(4, ms(50)), ms(50));
        assert_eq!(policy.next_wait(40, ms(50)), ms(50));
    }

    #[test]
    fn test_empty_sequence_is_zero() {
        let policy = SleepPolicy::sequence(Vec::new());
        assert_eq!(policy.next_wait(1, Duration::ZERO), Duration::ZERO);
        assert_eq!(policy.next_wait(7, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_function_receives_attempt_and_previous() {
        let policy = SleepPolicy::function(|attempt, previous| previous + ms(attempt as u64));

        let mut wait = Duration::ZERO;
        for attempt in 1..=4 {
            wait = policy.next_wait(attempt, wait);
        }

        // 1 + 2 + 3 + 4
        assert_eq!(wait, ms(10));
    }

    #[test]
    fn test_exponential_grows_and_caps() {
        let policy = SleepPolicy::exponential(100, 2.0, 1000, 0.0);

        assert_eq!(policy.next_wait(1, Duration::ZERO), ms(100));
        assert_eq!(policy.next_wait(2, Duration::ZERO), ms(200));
        assert_eq!(policy.next_wait(3, Duration::ZERO), ms(400));
        assert_eq!(policy.next_wait(10, Duration::ZERO), ms(1000));
    }

    #[test]
    fn test_exponential_jitter_stays_below_delay() {
        let policy = SleepPolicy::exponential(1000, 1.0, 1000, 0.5);

        for _ in 0..20 {
            let wait = policy.next_wait(1, Duration::ZERO);
            assert!(wait >= ms(490), "wait {:?} below jitter floor", wait);
            assert!(wait <= ms(1000), "wait {:?} above base delay", wait);
        }
    }
}
