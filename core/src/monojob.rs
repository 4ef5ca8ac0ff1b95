//! Single foreground job.
//!
//! The interactive shell runs one job at a time (a download, a DHCP
//! exchange) and blocks in `wait()` until it closes, drawing progress and
//! watching for Ctrl-C meanwhile.

use alloc::sync::Arc;
use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::config::{MonojobConfig, KEY_CTRL_C};
use crate::console::{Console, ERASE_EOL};
use crate::error::{describe, Error, Result, Status};
use crate::intf::{connect, Interface, JobProgress, Operations};
use crate::sched::Scheduler;
use crate::time::Timestamp;

pub struct Monojob {
    intf: Interface,
    config: MonojobConfig,
    // None while the attached job is still running.
    rc: Mutex<Option<Status>>,
    waiting: AtomicBool,
}

struct WaitGuard<'a>(&'a AtomicBool);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Monojob {
    pub fn new(config: MonojobConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            intf: Interface::new("monojob", me),
            config,
            rc: Mutex::new(None),
            waiting: AtomicBool::new(false),
        })
    }

    /// The foreground endpoint.
    pub fn interface(&self) -> &Interface {
        &self.intf
    }

    /// Connect `job` to the foreground slot.
    ///
    /// `Err(Busy)` if another job is attached; that job is left alone.
    pub fn attach(&self, job: &Interface) -> Result<()> {
        if self.intf.is_connected() {
            log::warn!(
                "[MONOJOB] cannot attach {}: slot busy",
                job.label()
            );
            return Err(Error::Busy);
        }
        *self.rc.lock() = None;
        connect(&self.intf, job);
        log::debug!("[MONOJOB] attached {}", job.label());
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.intf.is_connected()
    }

    /// Final status of the last job, `Err(InProgress)` while it runs.
    pub fn status(&self) -> Status {
        (*self.rc.lock()).unwrap_or(Err(Error::InProgress))
    }

    /// Attach `job` and run the scheduler until it closes.
    ///
    /// Ctrl-C cancels the job. With an idle timeout configured, a job whose
    /// progress stops moving is closed with `TimedOut`. The outcome is
    /// printed as `"<description>: ok"` or `"<description>: <error>"`.
    ///
    /// # Panics
    ///
    /// If called while another `wait()` on this monojob is running.
    pub fn wait(
        &self,
        sched: &Scheduler,
        console: &mut dyn Console,
        job: &Interface,
        description: &str,
    ) -> Status {
        assert!(
            !self.waiting.swap(true, Ordering::AcqRel),
            "monojob wait re-entered"
        );
        let _guard = WaitGuard(&self.waiting);

        self.attach(job)?;

        let now = sched.now();
        let mut last_keycheck = Timestamp::new(now);
        let mut last_display = Timestamp::new(now);
        let mut last_change = Timestamp::new(now);
        let mut last_completed = 0;

        let rc = loop {
            if let Some(rc) = *self.rc.lock() {
                break rc;
            }

            sched.step();
            if self.rc.lock().is_some() {
                continue;
            }
            let now = sched.now();

            if last_keycheck.is_expired(now, self.config.key_poll_interval) {
                last_keycheck = Timestamp::new(now);

                if Self::cancel_requested(console) {
                    log::debug!("[MONOJOB] {} cancelled from console", description);
                    break self.abort(Err(Error::Canceled));
                }

                if let Some(idle) = self.config.idle_timeout {
                    let completed = self.query().completed;
                    if completed != last_completed {
                        last_completed = completed;
                        last_change = Timestamp::new(now);
                    } else if last_change.is_expired(now, idle) {
                        log::warn!(
                            "[MONOJOB] {} idle for {} ticks",
                            description,
                            last_change.elapsed(now)
                        );
                        break self.abort(Err(Error::TimedOut));
                    }
                }
            }

            if last_display.is_expired(now, self.config.progress_interval) {
                last_display = Timestamp::new(now);
                let progress = self.query();
                let _ = write!(console, "\r{}: ", description);
                if !progress.message.is_empty() {
                    let _ = write!(console, "{} ", progress.message);
                }
                let _ = match progress.percentage() {
                    Some(pct) => write!(console, "{}%{}", pct, ERASE_EOL),
                    None => write!(console, "{} bytes{}", progress.completed, ERASE_EOL),
                };
            }
        };

        let _ = writeln!(console, "\r{}: {}{}", description, describe(&rc), ERASE_EOL);
        log::debug!("[MONOJOB] {} finished: {}", description, describe(&rc));
        rc
    }

    fn query(&self) -> JobProgress {
        let mut progress = JobProgress::default();
        // Progress is advisory.
        let _ = self.intf.progress(&mut progress);
        progress
    }

    /// Drain pending keys, looking for Ctrl-C.
    fn cancel_requested(console: &mut dyn Console) -> bool {
        while let Some(key) = console.read_key() {
            if key == KEY_CTRL_C {
                return true;
            }
        }
        false
    }

    fn abort(&self, rc: Status) -> Status {
        *self.rc.lock() = Some(rc);
        self.intf.restart(rc);
        rc
    }
}

impl Operations for Monojob {
    fn close(&self, intf: &Interface, status: Status) {
        *self.rc.lock() = Some(status);
        intf.restart(status);
    }
}
