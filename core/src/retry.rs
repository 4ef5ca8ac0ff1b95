//! Retry timers with exponential backoff.
//!
//! A layer arms its timer when it sends something that needs an answer and
//! stops it when the answer arrives. If the timer fires first, the owner's
//! `expired()` runs with `fail` set once the backoff has reached its
//! ceiling, which is usually the point to give up and close.

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::mem;

use spin::Mutex;

use crate::config::RetryPolicy;
use crate::time::Clock;

/// Timer callback.
pub trait Expired: Send + Sync + 'static {
    /// `timer` has fired and is no longer running. `fail` means the timeout
    /// that just elapsed was already the longest the policy allows.
    fn expired(&self, timer: &RetryTimer, fail: bool);
}

/// (expiry tick, registration sequence)
type Key = (u64, u64);

struct TimerState {
    key: Option<Key>,
    retries: u32,
    timeout: u64,
}

struct TimerCore {
    label: &'static str,
    policy: RetryPolicy,
    owner: Weak<dyn Expired>,
    state: Mutex<TimerState>,
}

struct ListInner {
    timers: BTreeMap<Key, Arc<TimerCore>>,
    next_seq: u64,
}

/// Running timers ordered by expiry.
#[derive(Clone)]
pub struct TimerList {
    inner: Arc<Mutex<ListInner>>,
    clock: Arc<dyn Clock>,
}

impl TimerList {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListInner {
                timers: BTreeMap::new(),
                next_seq: 0,
            })),
            clock,
        }
    }

    /// Number of running timers.
    pub fn len(&self) -> usize {
        self.inner.lock().timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().timers.is_empty()
    }

    /// Earliest expiry among running timers.
    pub fn next_expiry(&self) -> Option<u64> {
        self.inner.lock().timers.keys().next().map(|&(expiry, _)| expiry)
    }

    /// Fire every timer that is due, earliest first.
    ///
    /// Due timers are taken off the list up front. A callback that stops or
    /// re-arms a timer still waiting its turn in this batch cancels that
    /// firing. Returns the number of callbacks run.
    pub fn expire(&self) -> usize {
        let now = self.clock.now();
        let due = {
            let mut list = self.inner.lock();
            match now.checked_add(1) {
                Some(next) => {
                    let later = list.timers.split_off(&(next, 0));
                    mem::replace(&mut list.timers, later)
                }
                None => mem::take(&mut list.timers),
            }
        };

        let mut fired = 0;
        for (key, core) in due {
            let fail = {
                let mut state = core.state.lock();
                if state.key != Some(key) {
                    continue;
                }
                state.key = None;
                let fail = state.timeout >= core.policy.ceiling();
                state.retries = state.retries.saturating_add(1);
                fail
            };

            let Some(owner) = core.owner.upgrade() else {
                log::warn!("[RETRY] {} expired after its owner was dropped", core.label);
                continue;
            };
            log::debug!(
                "[RETRY] {} expired at {} (retry {}{})",
                core.label,
                now,
                core.state.lock().retries,
                if fail { ", giving up" } else { "" }
            );
            let timer = RetryTimer {
                core,
                list: self.clone(),
            };
            owner.expired(&timer, fail);
            fired += 1;
        }
        fired
    }

    /// Labels of running timers in expiry order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.inner.lock().timers.values().map(|t| t.label).collect()
    }
}

/// Handle to a retry timer. Clones refer to the same timer.
#[derive(Clone)]
pub struct RetryTimer {
    core: Arc<TimerCore>,
    list: TimerList,
}

impl RetryTimer {
    pub fn new<T: Expired>(
        list: &TimerList,
        label: &'static str,
        policy: RetryPolicy,
        owner: &Weak<T>,
    ) -> Self {
        let owner: Weak<dyn Expired> = owner.clone();
        Self {
            core: Arc::new(TimerCore {
                label,
                policy,
                owner,
                state: Mutex::new(TimerState {
                    key: None,
                    retries: 0,
                    timeout: policy.timeout(0),
                }),
            }),
            list: list.clone(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.core.label
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.core.policy
    }

    /// Arm with the backoff for the current retry count.
    ///
    /// Re-arms a running timer from now.
    pub fn start(&self) {
        let now = self.list.clock.now();
        let mut list = self.list.inner.lock();
        let mut state = self.core.state.lock();
        if let Some(old) = state.key.take() {
            list.timers.remove(&old);
        }
        let timeout = self.core.policy.timeout(state.retries);
        let key = (now.saturating_add(timeout), list.next_seq);
        list.next_seq += 1;
        state.key = Some(key);
        state.timeout = timeout;
        list.timers.insert(key, self.core.clone());
        log::trace!(
            "[RETRY] {} armed for {} ticks (retry {})",
            self.core.label,
            timeout,
            state.retries
        );
    }

    /// Disarm. The retry count is kept.
    pub fn stop(&self) {
        let mut list = self.list.inner.lock();
        let mut state = self.core.state.lock();
        if let Some(old) = state.key.take() {
            list.timers.remove(&old);
            log::trace!("[RETRY] {} stopped", self.core.label);
        }
    }

    /// Forget previous retries and arm with the base timeout.
    pub fn reset(&self) {
        self.core.state.lock().retries = 0;
        self.start();
    }

    pub fn is_running(&self) -> bool {
        self.core.state.lock().key.is_some()
    }

    /// Times this timer has fired since creation or the last `reset()`.
    pub fn retries(&self) -> u32 {
        self.core.state.lock().retries
    }

    /// Timeout the timer is armed with, or will be on the next `start()`.
    pub fn current_timeout(&self) -> u64 {
        let state = self.core.state.lock();
        match state.key {
            Some(_) => state.timeout,
            None => self.core.policy.timeout(state.retries),
        }
    }

    /// Tick at which a running timer fires.
    pub fn expiry(&self) -> Option<u64> {
        self.core.state.lock().key.map(|(expiry, _)| expiry)
    }
}

impl PartialEq for RetryTimer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl core::fmt::Debug for RetryTimer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RetryTimer")
            .field("label", &self.label())
            .field("expiry", &self.expiry())
            .field("retries", &self.retries())
            .finish()
    }
}
