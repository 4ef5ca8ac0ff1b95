//! Download job.
//!
//! Pulls a location into memory:
//!
//! ```text
//!   consumer (monojob) ◄═job═► Downloader ◄═xfer═► source (opened by Opener)
//! ```
//!
//! The source is opened on the first scheduler pass after creation, so the
//! consumer can attach to `job()` before any data or close arrives.

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::error::{describe, Error, Result, Status};
use crate::intf::{shutdown_all, Interface, JobProgress, Location, Metadata, Operations};
use crate::iobuf::IoBuffer;
use crate::process::{Process, Step, StepResult};
use crate::sched::Scheduler;
use crate::time::{Clock, Timestamp};
use crate::xferbuf::XferBuffer;

/// Opens data sources by location.
pub trait Opener: Send + Sync + 'static {
    /// Create a source for `location` and connect it to `xfer`.
    fn open(&self, xfer: &Interface, location: &Location) -> Result<()>;
}

pub struct Downloader {
    job: Interface,
    xfer: Interface,
    process: Process,
    opener: Arc<dyn Opener>,
    location: Mutex<Location>,
    buffer: Mutex<XferBuffer>,
    result: Mutex<Option<Status>>,
    clock: Arc<dyn Clock>,
    started: Timestamp,
}

impl Downloader {
    /// Start downloading `location`.
    ///
    /// Attach the consumer to `job()`; the source is opened on the next
    /// scheduler pass.
    pub fn open(sched: &Scheduler, opener: Arc<dyn Opener>, location: &Location) -> Arc<Self> {
        log::debug!("[DOWNLOAD] {}", location);
        let downloader = Arc::new_cyclic(|me| Self {
            job: Interface::new("download-job", me),
            xfer: Interface::new("download-xfer", me),
            process: sched.process("download-open", me),
            opener,
            location: Mutex::new(location.clone()),
            buffer: Mutex::new(XferBuffer::new()),
            result: Mutex::new(None),
            clock: sched.clock().clone(),
            started: Timestamp::new(sched.now()),
        });
        downloader.process.schedule();
        downloader
    }

    /// Endpoint for the consumer.
    pub fn job(&self) -> &Interface {
        &self.job
    }

    pub fn location(&self) -> Location {
        self.location.lock().clone()
    }

    /// Final status, `Err(InProgress)` until finished.
    pub fn status(&self) -> Status {
        (*self.result.lock()).unwrap_or(Err(Error::InProgress))
    }

    pub fn is_finished(&self) -> bool {
        self.result.lock().is_some()
    }

    /// Bytes received so far.
    pub fn received(&self) -> u64 {
        self.buffer.lock().pos()
    }

    /// Downloaded contents once finished successfully.
    pub fn image(&self) -> Result<Vec<u8>> {
        self.status()?;
        Ok(self.buffer.lock().data().to_vec())
    }

    fn finish(&self, status: Status) {
        {
            let mut result = self.result.lock();
            if result.is_some() {
                return;
            }
            *result = Some(status);
        }
        self.process.cancel();
        log::debug!(
            "[DOWNLOAD] {} finished after {} ticks, {} bytes: {}",
            self.location(),
            self.started.elapsed(self.clock.now()),
            self.buffer.lock().len(),
            describe(&status)
        );
        shutdown_all(status, &[&self.xfer, &self.job]);
    }

    fn reopen(&self, location: &Location) -> Result<()> {
        *self.location.lock() = location.clone();
        self.opener.open(&self.xfer, location)
    }
}

impl Step for Downloader {
    fn step(&self, _process: &Process) -> StepResult {
        let location = self.location();
        if let Err(e) = self.reopen(&location) {
            log::warn!("[DOWNLOAD] cannot open {}: {}", location, e);
            self.finish(Err(e));
        }
        StepResult::Done
    }
}

impl Operations for Downloader {
    fn close(&self, _intf: &Interface, status: Status) {
        self.finish(status);
    }

    fn deliver(&self, _intf: &Interface, buf: IoBuffer, meta: &Metadata) -> Result<()> {
        let rc = self.buffer.lock().deliver(buf, meta);
        if let Err(e) = rc {
            self.finish(Err(e));
        }
        rc
    }

    fn progress(&self, _intf: &Interface, progress: &mut JobProgress) -> Result<()> {
        // The source may add a message; position and size are ours.
        let _ = self.xfer.progress(progress);
        let buffer = self.buffer.lock();
        progress.completed = buffer.pos();
        progress.total = buffer.len() as u64;
        Ok(())
    }

    fn redirect(&self, _intf: &Interface, location: &Location) -> Result<()> {
        log::debug!("[DOWNLOAD] redirected to {}", location);
        self.xfer.restart(Ok(()));
        let rc = self.reopen(location);
        if let Err(e) = rc {
            self.finish(Err(e));
        }
        rc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    struct Refuse;

    impl Opener for Refuse {
        fn open(&self, _xfer: &Interface, _location: &Location) -> Result<()> {
            Err(Error::Code(0x2e))
        }
    }

    #[test]
    fn test_open_failure_finishes() {
        let sched = Scheduler::new(Arc::new(ManualClock::new(1000)));
        let dl = Downloader::open(&sched, Arc::new(Refuse), &Location::uri("nfs://x/y"));
        assert_eq!(dl.status(), Err(Error::InProgress));
        sched.step();
        assert_eq!(dl.status(), Err(Error::Code(0x2e)));
        assert_eq!(dl.image(), Err(Error::Code(0x2e)));
        assert!(sched.is_idle());
    }
}
