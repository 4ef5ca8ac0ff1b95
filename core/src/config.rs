//! Runtime configuration.
//!
//! All timeouts derive from the calibrated clock rate. Nothing in the
//! scheduler hardcodes a tick count.

/// Default exponent cap for retry backoff.
pub const DEFAULT_BACKOFF_LIMIT: u32 = 5;

/// Ctrl-C as read from the console.
pub const KEY_CTRL_C: u8 = 0x03;

/// Retry timer backoff policy (all values in ticks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Base timeout, used for the first attempt.
    pub min_timeout: u64,
    /// Hard ceiling on any single timeout.
    pub max_timeout: u64,
    /// Exponent cap: timeouts stop doubling after this many retries.
    pub backoff_limit: u32,
}

impl RetryPolicy {
    pub const fn new(min_timeout: u64, max_timeout: u64, backoff_limit: u32) -> Self {
        Self {
            min_timeout,
            max_timeout,
            backoff_limit,
        }
    }

    /// Policy for a clock running at `ticks_per_sec`: 250ms base, 10s ceiling.
    pub const fn for_rate(ticks_per_sec: u64) -> Self {
        Self::new(ticks_per_sec / 4, ticks_per_sec * 10, DEFAULT_BACKOFF_LIMIT)
    }

    /// Timeout for the given retry count.
    ///
    /// `min(min_timeout * 2^min(retries, backoff_limit), max_timeout)`,
    /// saturating instead of overflowing.
    pub fn timeout(&self, retries: u32) -> u64 {
        let shift = retries.min(self.backoff_limit).min(63);
        let scaled = self
            .min_timeout
            .checked_mul(1u64 << shift)
            .unwrap_or(u64::MAX);
        scaled.min(self.max_timeout)
    }

    /// Largest timeout this policy can produce.
    pub fn ceiling(&self) -> u64 {
        self.timeout(self.backoff_limit)
    }

    pub fn min_timeout(mut self, ticks: u64) -> Self {
        self.min_timeout = ticks;
        self
    }

    pub fn max_timeout(mut self, ticks: u64) -> Self {
        self.max_timeout = ticks;
        self
    }

    pub fn backoff_limit(mut self, limit: u32) -> Self {
        self.backoff_limit = limit;
        self
    }
}

/// Foreground job (monojob) timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonojobConfig {
    /// How often to look for Ctrl-C and check the idle timeout.
    pub key_poll_interval: u64,
    /// How often to redraw the progress line.
    pub progress_interval: u64,
    /// Abort when progress has not changed for this long.
    pub idle_timeout: Option<u64>,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Clock rate the tick values below were computed for.
    pub ticks_per_sec: u64,
    /// Default policy for timers created through the scheduler.
    pub retry: RetryPolicy,
    pub monojob: MonojobConfig,
    /// Default bound for `pending_wait`.
    pub pending_timeout: u64,
}

impl RuntimeConfig {
    /// Create from clock rate.
    pub fn new(ticks_per_sec: u64) -> Self {
        let ticks_per_sec = ticks_per_sec.max(1);
        Self {
            ticks_per_sec,
            retry: RetryPolicy::for_rate(ticks_per_sec),
            monojob: MonojobConfig {
                key_poll_interval: (ticks_per_sec / 10).max(1),
                progress_interval: ticks_per_sec,
                idle_timeout: None,
            },
            pending_timeout: ticks_per_sec * 10,
        }
    }

    /// Convert milliseconds to ticks.
    #[inline]
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms.saturating_mul(self.ticks_per_sec) / 1_000
    }

    /// Convert seconds to ticks.
    #[inline]
    pub fn secs_to_ticks(&self, secs: u64) -> u64 {
        secs.saturating_mul(self.ticks_per_sec)
    }

    /// Convert ticks to milliseconds.
    #[inline]
    pub fn ticks_to_ms(&self, ticks: u64) -> u64 {
        ticks.saturating_mul(1_000) / self.ticks_per_sec
    }

    /// Set retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Abort foreground jobs that make no progress for `ticks`.
    pub fn idle_timeout(mut self, ticks: u64) -> Self {
        self.monojob.idle_timeout = Some(ticks);
        self
    }

    /// Set pending_wait bound.
    pub fn pending_timeout(mut self, ticks: u64) -> Self {
        self.pending_timeout = ticks;
        self
    }
}

impl Default for RuntimeConfig {
    /// Millisecond ticks.
    fn default() -> Self {
        Self::new(1_000)
    }
}
