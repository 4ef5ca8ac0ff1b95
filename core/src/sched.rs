//! Scheduler context.
//!
//! Owns everything a cooperative main loop needs: clock, run queue, retry
//! timers and the pending counter. There is no global state; layers get
//! their process and timer handles from the scheduler they run under.
//!
//! One pass (`step()`):
//!
//! ```text
//!   run queue snapshot ──► step each process (FIFO)
//!            │
//!            ▼
//!   timer list ──► fire every due timer (earliest first)
//! ```

use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::{RetryPolicy, RuntimeConfig};
use crate::error::{Error, Result};
use crate::pending::PendingOperations;
use crate::process::{Process, RunQueue, Step};
use crate::retry::{Expired, RetryTimer, TimerList};
use crate::time::{Clock, Timestamp};

pub struct Scheduler {
    clock: Arc<dyn Clock>,
    config: RuntimeConfig,
    queue: RunQueue,
    timers: TimerList,
    pending: PendingOperations,
    in_step: AtomicBool,
    passes: AtomicU64,
}

/// Clears the re-entry flag even if a step panics.
struct StepGuard<'a>(&'a AtomicBool);

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    /// Scheduler with configuration derived from the clock rate.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let config = RuntimeConfig::new(clock.ticks_per_sec());
        Self::with_config(clock, config)
    }

    pub fn with_config(clock: Arc<dyn Clock>, config: RuntimeConfig) -> Self {
        log::debug!(
            "[SCHED] init, {} ticks/s, retry {}..{}",
            config.ticks_per_sec,
            config.retry.min_timeout,
            config.retry.max_timeout
        );
        Self {
            timers: TimerList::new(clock.clone()),
            clock,
            config,
            queue: RunQueue::new(),
            pending: PendingOperations::new(),
            in_step: AtomicBool::new(false),
            passes: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn queue(&self) -> &RunQueue {
        &self.queue
    }

    pub fn timers(&self) -> &TimerList {
        &self.timers
    }

    pub fn pending(&self) -> &PendingOperations {
        &self.pending
    }

    /// Completed passes.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Acquire)
    }

    /// New process on this scheduler's queue.
    pub fn process<T: Step>(&self, label: &'static str, owner: &Weak<T>) -> Process {
        Process::new(&self.queue, label, owner)
    }

    /// New retry timer with the configured default policy.
    pub fn retry_timer<T: Expired>(&self, label: &'static str, owner: &Weak<T>) -> RetryTimer {
        self.retry_timer_with(label, self.config.retry, owner)
    }

    pub fn retry_timer_with<T: Expired>(
        &self,
        label: &'static str,
        policy: RetryPolicy,
        owner: &Weak<T>,
    ) -> RetryTimer {
        RetryTimer::new(&self.timers, label, policy, owner)
    }

    /// Run one pass: scheduled processes, then due timers.
    ///
    /// # Panics
    ///
    /// If called from inside a step or timer callback.
    pub fn step(&self) {
        assert!(
            !self.in_step.swap(true, Ordering::AcqRel),
            "scheduler step re-entered"
        );
        let _guard = StepGuard(&self.in_step);

        let stepped = self.queue.run_pass();
        let fired = self.timers.expire();
        let pass = self.passes.fetch_add(1, Ordering::AcqRel) + 1;
        if stepped + fired > 0 {
            log::trace!(
                "[SCHED] pass {}: {} steps, {} timers",
                pass,
                stepped,
                fired
            );
        }
    }

    /// Nothing queued and no timer running.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.timers.is_empty()
    }

    /// Step until `done()` holds.
    ///
    /// `Err(TimedOut)` after `timeout` ticks; `Err(Stalled)` if nothing is
    /// left that could change the outcome.
    pub fn run_until<F: FnMut() -> bool>(&self, mut done: F, timeout: u64) -> Result<()> {
        let start = Timestamp::new(self.now());
        loop {
            if done() {
                return Ok(());
            }
            if self.is_idle() {
                return Err(Error::Stalled);
            }
            if start.is_expired(self.now(), timeout) {
                return Err(Error::TimedOut);
            }
            self.step();
        }
    }

    /// Step until every pending operation has completed.
    ///
    /// `timeout` defaults to the configured `pending_timeout`.
    pub fn pending_wait(&self, timeout: Option<u64>) -> Result<()> {
        let timeout = timeout.unwrap_or(self.config.pending_timeout);
        let start = Timestamp::new(self.now());
        loop {
            if self.pending.is_idle() {
                log::debug!("[PENDING] all operations complete");
                return Ok(());
            }
            if self.is_idle() {
                log::warn!(
                    "[PENDING] {} outstanding with nothing scheduled",
                    self.pending.count()
                );
                return Err(Error::Stalled);
            }
            if start.is_expired(self.now(), timeout) {
                log::warn!(
                    "[PENDING] timed out with {} outstanding",
                    self.pending.count()
                );
                return Err(Error::TimedOut);
            }
            self.step();
        }
    }
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("passes", &self.passes())
            .field("queued", &self.queue.len())
            .field("timers", &self.timers.len())
            .field("pending", &self.pending.count())
            .finish()
    }
}
