//! Job progress reporting.

use alloc::string::String;

/// Progress of a long-running job.
///
/// Layers add what they know; a layer with nothing to say leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobProgress {
    /// Units done so far.
    pub completed: u64,
    /// Units expected in total, zero if unknown.
    pub total: u64,
    /// Short status text ("connecting", "waiting for lease").
    pub message: String,
}

impl JobProgress {
    /// Completion percentage, if the total is known.
    pub fn percentage(&self) -> Option<u64> {
        if self.total == 0 {
            return None;
        }
        Some((self.completed as u128 * 100 / self.total as u128) as u64)
    }
}
