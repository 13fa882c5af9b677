//! Failure counting strategies that decide when a circuit opens
//!
//! - `Threshold`: opens after N failures, any success forgives them
//! - `Consecutive`: opens after N back-to-back failures
//! - `TimeBucket`: opens after N failures inside one fixed-length time bucket
//!
//! Because a success always clears the counter, `Threshold` and `Consecutive`
//! count identically; they are kept apart so configuration states its intent.

/// Plain failure counter shared by the two threshold strategies
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCounter {
    threshold: usize,
    error_count: usize,
}

impl ThresholdCounter {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            error_count: 0,
        }
    }

    fn on_failure(&mut self) -> bool {
        self.error_count += 1;
        if self.error_count >= self.threshold {
            self.error_count = 0;
            return true;
        }
        false
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }
}

/// Failure density over a bucket `[start, start + bucket_secs)`
///
/// A failure outside the active bucket discards it and starts a new bucket at
/// the failure's own timestamp; the bucket never slides forward gradually.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBucket {
    bucket_secs: f64,
    threshold: usize,
    bucket: Option<Bucket>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bucket {
    start: f64,
    end: f64,
    count: usize,
}

impl TimeBucket {
    pub fn new(bucket_secs: f64, threshold: usize) -> Self {
        Self {
            bucket_secs,
            threshold,
            bucket: None,
        }
    }

    fn on_failure(&mut self, now: f64) -> bool {
        let count = match self.bucket.as_mut() {
            Some(bucket) if now >= bucket.start && now < bucket.end => {
                bucket.count += 1;
                bucket.count
            }
            _ => {
                self.bucket = Some(Bucket {
                    start: now,
                    end: now + self.bucket_secs,
                    count: 1,
                });
                1
            }
        };
        count >= self.threshold
    }

    pub fn bucket_secs(&self) -> f64 {
        self.bucket_secs
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Failures counted in the active bucket
    pub fn count_in_bucket(&self) -> usize {
        self.bucket.map(|b| b.count).unwrap_or(0)
    }

    /// `(start, end)` of the active bucket
    pub fn bucket_bounds(&self) -> Option<(f64, f64)> {
        self.bucket.map(|b| (b.start, b.end))
    }
}

/// Decides from success/failure signals whether the circuit should open
#[derive(Debug, Clone, PartialEq)]
pub enum BreakerStrategy {
    Threshold(ThresholdCounter),
    Consecutive(ThresholdCounter),
    TimeBucket(TimeBucket),
}

impl BreakerStrategy {
    /// Open after `threshold` failures; any success resets the count
    pub fn threshold(threshold: usize) -> Self {
        Self::Threshold(ThresholdCounter::new(threshold))
    }

    /// Open after `threshold` failures in a row
    pub fn consecutive(threshold: usize) -> Self {
        Self::Consecutive(ThresholdCounter::new(threshold))
    }

    /// Open after `threshold` failures within one `bucket_secs` bucket
    pub fn time_bucket(bucket_secs: f64, threshold: usize) -> Self {
        Self::TimeBucket(TimeBucket::new(bucket_secs, threshold))
    }

    /// Record a failure observed at `now` (monotonic seconds)
    ///
    /// Returns `true` when the circuit should open.
    pub fn on_failure(&mut self, now: f64) -> bool {
        match self {
            BreakerStrategy::Threshold(counter) | BreakerStrategy::Consecutive(counter) => {
                counter.on_failure()
            }
            BreakerStrategy::TimeBucket(bucket) => bucket.on_failure(now),
        }
    }

    /// Record a success
    pub fn on_success(&mut self) {
        match self {
            BreakerStrategy::Threshold(counter) | BreakerStrategy::Consecutive(counter) => {
                counter.error_count = 0;
            }
            // successes do not dilute failure density
            BreakerStrategy::TimeBucket(_) => {}
        }
    }

    /// Return to the zero state, keeping configuration
    pub fn reset(&mut self) {
        match self {
            BreakerStrategy::Threshold(counter) | BreakerStrategy::Consecutive(counter) => {
                counter.error_count = 0;
            }
            BreakerStrategy::TimeBucket(bucket) => bucket.bucket = None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BreakerStrategy::Threshold(_) => "threshold",
            BreakerStrategy::Consecutive(_) => "consecutive",
            BreakerStrategy::TimeBucket(_) => "time_bucket",
        }
    }
}

impl Default for BreakerStrategy {
    fn default() -> Self {
        Self::threshold(5)
    }
}
