//! Tick sources.
//!
//! The scheduler only ever asks "what tick is it". On hardware that is the
//! TSC; hosted runs and tests use a manually advanced clock.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

/// Monotonic tick source.
pub trait Clock: Send + Sync {
    /// Current tick.
    fn now(&self) -> u64;

    /// Ticks per second.
    fn ticks_per_sec(&self) -> u64;
}

/// TSC-backed clock. Frequency comes from platform calibration.
#[derive(Debug, Clone, Copy)]
pub struct TscClock {
    tsc_freq: u64,
}

impl TscClock {
    pub const fn new(tsc_freq: u64) -> Self {
        Self { tsc_freq }
    }
}

impl Clock for TscClock {
    #[inline]
    fn now(&self) -> u64 {
        read_tsc()
    }

    fn ticks_per_sec(&self) -> u64 {
        self.tsc_freq
    }
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn read_tsc() -> u64 {
    let lo: u32;
    let hi: u32;
    unsafe {
        core::arch::asm!(
            "rdtsc",
            out("eax") lo,
            out("edx") hi,
            options(nostack, nomem, preserves_flags)
        );
    }
    ((hi as u64) << 32) | (lo as u64)
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
fn read_tsc() -> u64 {
    0
}

/// Manually driven clock.
///
/// Cloning shares the underlying counter.
#[derive(Debug, Clone)]
pub struct ManualClock {
    ticks: Arc<AtomicU64>,
    rate: u64,
}

impl ManualClock {
    pub fn new(ticks_per_sec: u64) -> Self {
        Self {
            ticks: Arc::new(AtomicU64::new(0)),
            rate: ticks_per_sec,
        }
    }

    /// Move time forward.
    pub fn advance(&self, ticks: u64) {
        self.ticks.fetch_add(ticks, Ordering::SeqCst);
    }

    pub fn set(&self, tick: u64) {
        self.ticks.store(tick, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn ticks_per_sec(&self) -> u64 {
        self.rate
    }
}

/// Start point of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn new(tick: u64) -> Self {
        Self(tick)
    }

    pub const fn tick(&self) -> u64 {
        self.0
    }

    /// Ticks since this timestamp. Tolerates counter wrap.
    #[inline]
    pub fn elapsed(&self, now: u64) -> u64 {
        now.wrapping_sub(self.0)
    }

    #[inline]
    pub fn is_expired(&self, now: u64, timeout: u64) -> bool {
        self.elapsed(now) >= timeout
    }
}
