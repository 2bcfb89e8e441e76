//! Exponential backoff shared by the fetch and delivery stages
//!
//! `delay = base × multiplier^(attempt − 1)`. The policy only computes waits
//! and attempt limits; which failures are worth another attempt is decided
//! by the stage that owns the loop.

use std::time::Duration;

/// Backoff multiplier used by the market data fetch stage
pub const FETCH_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Backoff multiplier used by the email delivery stage
pub const DELIVERY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Base delay between delivery attempts
pub const DELIVERY_BASE_DELAY: Duration = Duration::from_secs(5);

/// Attempts for the report email
pub const DELIVERY_MAX_ATTEMPTS: u32 = 3;

/// Attempts for the failure alert (kept short so a failing run exits quickly)
pub const ALERT_MAX_ATTEMPTS: u32 = 2;

/// Upper bound on any single backoff
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Wall-clock wait substituted for every backoff in fast-retry mode
pub const FAST_RETRY_WAIT: Duration = Duration::from_millis(1);

/// Backoff delay in seconds before the attempt following `attempt` (1-based)
pub fn delay(attempt: u32, base_secs: f64, multiplier: f64) -> f64 {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    base_secs * multiplier.powi(exponent)
}

/// Whether another attempt may follow `attempt` (1-based)
pub fn should_retry(attempt: u32, max_attempts: u32) -> bool {
    attempt < max_attempts
}

/// Parametrised retry policy; one instance per call site
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    multiplier: f64,
    fast: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            multiplier,
            fast: false,
        }
    }

    /// Fetch stage policy: multiplier 1.5 over the configured base interval
    pub fn fetch(max_attempts: u32, base: Duration) -> Self {
        Self::new(max_attempts, base, FETCH_BACKOFF_MULTIPLIER)
    }

    /// Report email policy: 3 attempts, 5s base, multiplier 2 (5s, 10s, 20s)
    pub fn delivery() -> Self {
        Self::new(DELIVERY_MAX_ATTEMPTS, DELIVERY_BASE_DELAY, DELIVERY_BACKOFF_MULTIPLIER)
    }

    /// Failure alert policy: same backoff as delivery, fewer attempts
    pub fn alert() -> Self {
        Self::new(ALERT_MAX_ATTEMPTS, DELIVERY_BASE_DELAY, DELIVERY_BACKOFF_MULTIPLIER)
    }

    /// Shorten real waiting to [`FAST_RETRY_WAIT`] without touching anything else
    pub fn with_fast_retry(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn is_fast(&self) -> bool {
        self.fast
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        should_retry(attempt, self.max_attempts)
    }

    /// Nominal backoff after `attempt`, independent of fast mode, capped at
    /// [`MAX_BACKOFF`]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base.is_zero() {
            return Duration::ZERO;
        }
        let secs = delay(attempt, self.base.as_secs_f64(), self.multiplier);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// What the caller actually sleeps for after `attempt`
    pub fn wait_for(&self, attempt: u32) -> Duration {
        if self.fast {
            FAST_RETRY_WAIT
        } else {
            self.delay_for(attempt)
        }
    }

    /// Fresh counter for one stage invocation
    pub fn start(&self) -> RetryState {
        RetryState {
            attempts: 0,
            max_attempts: self.max_attempts,
            waits: Vec::new(),
        }
    }
}

/// Attempt bookkeeping for one stage invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
    waits: Vec<Duration>,
}

impl RetryState {
    /// Start the next attempt and return its 1-based number.
    /// Returns `None` once the maximum has been reached.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.attempts)
    }

    pub fn record_wait(&mut self, nominal: Duration) {
        self.waits.push(nominal);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Nominal delays waited between attempts, in order
    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
