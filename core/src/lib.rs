//! Morpheus Core Library
//!
//! Cooperative runtime for the pre-OS network boot path: reference-counted
//! object interfaces, a run-to-completion process scheduler, retry timers
//! with exponential backoff, pending-operation accounting and the single
//! foreground job the shell waits on.
//!
//! Everything runs on one CPU with no preemption. A main loop calls
//! [`sched::Scheduler::step`] repeatedly; layers get work done only inside
//! their own process steps, timer callbacks and interface operations.

#![cfg_attr(not(test), no_std)]
#![allow(clippy::new_without_default)]
#![allow(clippy::len_without_is_empty)]

extern crate alloc;

pub mod config;
pub mod console;
pub mod downloader;
pub mod error;
pub mod intf;
pub mod iobuf;
pub mod logger;
pub mod monojob;
pub mod pending;
pub mod process;
pub mod retry;
pub mod sched;
pub mod time;
pub mod xferbuf;

pub use config::{RetryPolicy, RuntimeConfig};
pub use error::{Error, Result, Status};
pub use intf::{connect, Interface, Operations};
pub use process::{Process, Step, StepResult};
pub use retry::{Expired, RetryTimer};
pub use sched::Scheduler;
