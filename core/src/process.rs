//! Cooperative processes.
//!
//! A process is a unit of background work that gets one `step()` per
//! scheduler pass while it is scheduled. Steps must be short and must not
//! block; there is no preemption.
//!
//! # Queue discipline
//!
//! Each `schedule()` hands out a fresh ticket and appends `(process,
//! ticket)` to the run queue. A pass takes the whole queue and only steps
//! entries whose ticket is still current, so:
//!
//! - a process cancelled before its turn in the pass is skipped,
//! - one cancelled and re-scheduled before its turn runs next pass,
//! - anything scheduled during the pass runs next pass.

use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};
use core::mem;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

/// Outcome of one process step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// More work to do, step again next pass.
    Continue,
    /// Nothing more for now. The process stays unscheduled unless it
    /// re-scheduled itself during the step.
    Done,
}

/// Background work driven by the scheduler.
pub trait Step: Send + Sync + 'static {
    fn step(&self, process: &Process) -> StepResult;
}

struct ProcessState {
    label: &'static str,
    // 0 = not queued
    ticket: AtomicU64,
    owner: Weak<dyn Step>,
}

struct QueueInner {
    entries: VecDeque<(Arc<ProcessState>, u64)>,
    next_ticket: u64,
}

/// FIFO of scheduled processes.
#[derive(Clone)]
pub struct RunQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                entries: VecDeque::new(),
                next_ticket: 1,
            })),
        }
    }

    /// Entries waiting for the next pass (stale ones included).
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Step every process that was scheduled when the pass began.
    ///
    /// Returns the number of processes stepped.
    pub fn run_pass(&self) -> usize {
        let batch = mem::take(&mut self.inner.lock().entries);
        let mut stepped = 0;

        for (state, ticket) in batch {
            if state
                .ticket
                .compare_exchange(ticket, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            let Some(owner) = state.owner.upgrade() else {
                log::warn!("[PROC] {} dropped while scheduled", state.label);
                continue;
            };
            let process = Process {
                state,
                queue: self.clone(),
            };
            log::trace!("[PROC] step {}", process.label());
            if owner.step(&process) == StepResult::Continue {
                process.schedule();
            }
            stepped += 1;
        }

        stepped
    }
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a process. Clones refer to the same process.
#[derive(Clone)]
pub struct Process {
    state: Arc<ProcessState>,
    queue: RunQueue,
}

impl Process {
    /// Create an unscheduled process stepping `owner`.
    pub fn new<T: Step>(queue: &RunQueue, label: &'static str, owner: &Weak<T>) -> Self {
        let owner: Weak<dyn Step> = owner.clone();
        Self {
            state: Arc::new(ProcessState {
                label,
                ticket: AtomicU64::new(0),
                owner,
            }),
            queue: queue.clone(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.state.label
    }

    /// Queue for the next pass. No-op if already queued.
    pub fn schedule(&self) {
        let mut queue = self.queue.inner.lock();
        if self.state.ticket.load(Ordering::Acquire) != 0 {
            return;
        }
        let ticket = queue.next_ticket;
        queue.next_ticket += 1;
        self.state.ticket.store(ticket, Ordering::Release);
        queue.entries.push_back((self.state.clone(), ticket));
    }

    /// Remove from the queue. No-op if not queued.
    pub fn cancel(&self) {
        let mut queue = self.queue.inner.lock();
        if self.state.ticket.swap(0, Ordering::AcqRel) == 0 {
            return;
        }
        queue
            .entries
            .retain(|(state, _)| !Arc::ptr_eq(state, &self.state));
    }

    pub fn is_scheduled(&self) -> bool {
        self.state.ticket.load(Ordering::Acquire) != 0
    }
}

impl core::fmt::Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("label", &self.label())
            .field("scheduled", &self.is_scheduled())
            .finish()
    }
}
