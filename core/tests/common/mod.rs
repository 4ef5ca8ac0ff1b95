//! Common test layers: recording endpoints, in-memory sources, a stalling
//! retrying layer and a scripted opener.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use morpheus_core::config::{RetryPolicy, RuntimeConfig};
use morpheus_core::downloader::Opener;
use morpheus_core::intf::{connect, Interface, JobProgress, Location, Metadata, Operations};
use morpheus_core::iobuf::IoBuffer;
use morpheus_core::process::{Process, RunQueue, Step, StepResult};
use morpheus_core::retry::{Expired, RetryTimer};
use morpheus_core::time::{Clock, ManualClock};
use morpheus_core::{Error, Result, Scheduler, Status};

/// Millisecond clock and a scheduler running on it.
pub fn scheduler(config: RuntimeConfig) -> (ManualClock, Arc<Scheduler>) {
    let clock = ManualClock::new(config.ticks_per_sec);
    let sched = Scheduler::with_config(Arc::new(clock.clone()), config);
    (clock, Arc::new(sched))
}

/// Moves the clock forward by a fixed amount every pass.
pub struct Ticker {
    clock: ManualClock,
    ticks: u64,
    pub process: Process,
}

impl Ticker {
    pub fn start(sched: &Scheduler, clock: &ManualClock, ticks: u64) -> Arc<Self> {
        let ticker = Arc::new_cyclic(|me| Self {
            clock: clock.clone(),
            ticks,
            process: sched.process("ticker", me),
        });
        ticker.process.schedule();
        ticker
    }
}

impl Step for Ticker {
    fn step(&self, _process: &Process) -> StepResult {
        self.clock.advance(self.ticks);
        StepResult::Continue
    }
}

/// Endpoint that records everything it receives.
pub struct Recorder {
    pub intf: Interface,
    closes: Mutex<Vec<Status>>,
    data: Mutex<Vec<u8>>,
    window: usize,
}

impl Recorder {
    pub fn new(label: &'static str) -> Arc<Self> {
        Self::with_window(label, usize::MAX)
    }

    pub fn with_window(label: &'static str, window: usize) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            intf: Interface::new(label, me),
            closes: Mutex::new(Vec::new()),
            data: Mutex::new(Vec::new()),
            window,
        })
    }

    pub fn closes(&self) -> Vec<Status> {
        self.closes.lock().unwrap().clone()
    }

    pub fn data(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Operations for Recorder {
    fn close(&self, intf: &Interface, status: Status) {
        self.closes.lock().unwrap().push(status);
        intf.close(status);
    }

    fn deliver(&self, _intf: &Interface, buf: IoBuffer, _meta: &Metadata) -> Result<()> {
        self.data.lock().unwrap().extend_from_slice(buf.as_slice());
        Ok(())
    }

    fn window(&self, _intf: &Interface) -> usize {
        self.window
    }
}

/// Data source feeding one chunk per scheduler pass, then closing.
pub struct MemorySource {
    pub xfer: Interface,
    process: Process,
    chunks: Mutex<VecDeque<Vec<u8>>>,
    announce: Mutex<Option<u64>>,
    redirect: Mutex<Option<Location>>,
    message: Option<&'static str>,
    finish: Status,
    closes: Mutex<Vec<Status>>,
}

impl MemorySource {
    fn build(
        queue: &RunQueue,
        chunks: Vec<Vec<u8>>,
        announce: bool,
        redirect: Option<Location>,
        message: Option<&'static str>,
        finish: Status,
    ) -> Arc<Self> {
        let total: u64 = chunks.iter().map(|c| c.len() as u64).sum();
        Arc::new_cyclic(|me| Self {
            xfer: Interface::new("memory-source", me),
            process: Process::new(queue, "memory-source", me),
            chunks: Mutex::new(chunks.into()),
            announce: Mutex::new(announce.then_some(total)),
            redirect: Mutex::new(redirect),
            message,
            finish,
            closes: Mutex::new(Vec::new()),
        })
    }

    /// Delivers `chunks`, announcing the total size up front if asked.
    pub fn new(queue: &RunQueue, chunks: Vec<Vec<u8>>, announce: bool) -> Arc<Self> {
        Self::build(queue, chunks, announce, None, None, Ok(()))
    }

    /// Like `new` with announcement, reporting `message` as its progress.
    pub fn describing(queue: &RunQueue, chunks: Vec<Vec<u8>>, message: &'static str) -> Arc<Self> {
        Self::build(queue, chunks, true, None, Some(message), Ok(()))
    }

    /// Delivers `chunks`, then closes with `status` instead of success.
    pub fn failing(queue: &RunQueue, chunks: Vec<Vec<u8>>, status: Status) -> Arc<Self> {
        Self::build(queue, chunks, false, None, None, status)
    }

    /// Asks to be replaced by `location` on its first step.
    pub fn redirecting(queue: &RunQueue, location: Location) -> Arc<Self> {
        Self::build(queue, Vec::new(), false, Some(location), None, Ok(()))
    }

    pub fn start(&self) {
        self.process.schedule();
    }

    /// Statuses this source was closed with from downstream.
    pub fn closes(&self) -> Vec<Status> {
        self.closes.lock().unwrap().clone()
    }

    fn shutdown(&self, status: Status) {
        self.process.cancel();
        self.xfer.close(status);
    }
}

impl Step for MemorySource {
    fn step(&self, _process: &Process) -> StepResult {
        let redirect = self.redirect.lock().unwrap().take();
        if let Some(location) = redirect {
            if let Err(e) = self.xfer.redirect(&location) {
                self.shutdown(Err(e));
            }
            return StepResult::Done;
        }

        let announce = self.announce.lock().unwrap().take();
        if let Some(total) = announce {
            if let Err(e) = self.xfer.seek(total).and_then(|_| self.xfer.seek(0)) {
                self.shutdown(Err(e));
                return StepResult::Done;
            }
        }

        let chunk = self.chunks.lock().unwrap().pop_front();
        if let Some(chunk) = chunk {
            if let Err(e) = self.xfer.deliver_raw(&chunk) {
                self.shutdown(Err(e));
                return StepResult::Done;
            }
        }

        if self.chunks.lock().unwrap().is_empty() {
            self.shutdown(self.finish);
            StepResult::Done
        } else {
            StepResult::Continue
        }
    }
}

impl Operations for MemorySource {
    fn close(&self, intf: &Interface, status: Status) {
        self.closes.lock().unwrap().push(status);
        self.process.cancel();
        intf.close(status);
    }

    fn progress(&self, _intf: &Interface, progress: &mut JobProgress) -> Result<()> {
        if let Some(message) = self.message {
            progress.message = message.to_string();
        }
        Ok(())
    }
}

/// Sends requests nobody answers, backing off on every expiry and giving
/// up after `max_attempts`.
pub struct StallingLayer {
    pub xfer: Interface,
    pub timer: RetryTimer,
    clock: ManualClock,
    last_start: Mutex<u64>,
    attempts: Mutex<Vec<(u64, bool)>>,
    max_attempts: usize,
    closes: Mutex<Vec<Status>>,
}

impl StallingLayer {
    pub fn new(
        sched: &Scheduler,
        clock: &ManualClock,
        policy: RetryPolicy,
        max_attempts: usize,
    ) -> Arc<Self> {
        let layer = Arc::new_cyclic(|me| Self {
            xfer: Interface::new("stalling", me),
            timer: sched.retry_timer_with("stalling", policy, me),
            clock: clock.clone(),
            last_start: Mutex::new(clock.now()),
            attempts: Mutex::new(Vec::new()),
            max_attempts,
            closes: Mutex::new(Vec::new()),
        });
        layer.timer.start();
        layer
    }

    /// (elapsed timeout, fail flag) per expiry.
    pub fn attempts(&self) -> Vec<(u64, bool)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn closes(&self) -> Vec<Status> {
        self.closes.lock().unwrap().clone()
    }
}

impl Expired for StallingLayer {
    fn expired(&self, timer: &RetryTimer, fail: bool) {
        let now = self.clock.now();
        let attempts = {
            let mut last = self.last_start.lock().unwrap();
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push((now - *last, fail));
            *last = now;
            attempts.len()
        };
        if attempts >= self.max_attempts {
            self.xfer.close(Err(Error::TimedOut));
        } else {
            timer.start();
        }
    }
}

impl Operations for StallingLayer {
    fn close(&self, intf: &Interface, status: Status) {
        self.closes.lock().unwrap().push(status);
        self.timer.stop();
        intf.close(status);
    }
}

pub enum Route {
    Data { chunks: Vec<Vec<u8>>, announce: bool },
    Fail { chunks: Vec<Vec<u8>>, status: Status },
    Described { chunks: Vec<Vec<u8>>, message: &'static str },
    Redirect(&'static str),
}

/// Opener answering from a fixed table of URIs.
pub struct ScriptedOpener {
    queue: RunQueue,
    routes: HashMap<&'static str, Route>,
    opened: Mutex<Vec<String>>,
    sources: Mutex<Vec<Arc<MemorySource>>>,
}

impl ScriptedOpener {
    pub fn new(sched: &Scheduler, routes: Vec<(&'static str, Route)>) -> Arc<Self> {
        Arc::new(Self {
            queue: sched.queue().clone(),
            routes: routes.into_iter().collect(),
            opened: Mutex::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
        })
    }

    /// URIs opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn sources(&self) -> Vec<Arc<MemorySource>> {
        self.sources.lock().unwrap().clone()
    }
}

impl Opener for ScriptedOpener {
    fn open(&self, xfer: &Interface, location: &Location) -> Result<()> {
        let Location::Uri(uri) = location;
        self.opened.lock().unwrap().push(uri.clone());
        let source = match self.routes.get(uri.as_str()) {
            Some(Route::Data { chunks, announce }) => {
                MemorySource::new(&self.queue, chunks.clone(), *announce)
            }
            Some(Route::Fail { chunks, status }) => {
                MemorySource::failing(&self.queue, chunks.clone(), *status)
            }
            Some(Route::Described { chunks, message }) => {
                MemorySource::describing(&self.queue, chunks.clone(), *message)
            }
            Some(Route::Redirect(target)) => {
                MemorySource::redirecting(&self.queue, Location::uri(target))
            }
            None => return Err(Error::Code(0x2d)),
        };
        connect(xfer, &source.xfer);
        source.start();
        self.sources.lock().unwrap().push(source);
        Ok(())
    }
}
