// Global logging backend for Morpheus
//
// Records are formatted into a fixed-size ring so the boot UI can dump the
// tail after a failure. Oldest entries are overwritten when full.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

pub const MAX_LOG_ENTRIES: usize = 512;

struct Ring {
    entries: VecDeque<String>,
    total: usize,
}

pub struct RingLogger {
    ring: Mutex<Ring>,
}

impl RingLogger {
    pub const fn new() -> Self {
        Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::new(),
                total: 0,
            }),
        }
    }

    pub fn push(&self, message: String) {
        let mut ring = self.ring.lock();
        if ring.entries.len() == MAX_LOG_ENTRIES {
            ring.entries.pop_front();
        }
        ring.entries.push_back(message);
        ring.total += 1;
    }

    /// All retained entries, oldest first.
    pub fn iter(&self) -> Vec<String> {
        self.ring.lock().entries.iter().cloned().collect()
    }

    /// Last `n` entries, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<String> {
        let ring = self.ring.lock();
        let skip = ring.entries.len().saturating_sub(n);
        ring.entries.iter().skip(skip).cloned().collect()
    }

    /// Entries currently retained.
    pub fn count(&self) -> usize {
        self.ring.lock().entries.len()
    }

    /// Entries ever written.
    pub fn total_count(&self) -> usize {
        self.ring.lock().total
    }

    pub fn clear(&self) {
        self.ring.lock().entries.clear();
    }
}

impl Default for RingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut line = String::new();
        let _ = write!(line, "{:<5} {}", record.level(), record.args());
        self.push(line);
    }

    fn flush(&self) {}
}

static LOGGER: RingLogger = RingLogger::new();

/// Install the ring logger as the global `log` backend.
///
/// Only the first call installs; later calls just adjust the level.
pub fn init(level: LevelFilter) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

/// The global ring.
pub fn global() -> &'static RingLogger {
    &LOGGER
}
