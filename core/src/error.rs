//! Error and close-status types.
//!
//! Every cross-layer failure travels as the status of a `close()`. A clean
//! finish is `Ok(())`; anything else is one of the variants below.

use thiserror::Error;

/// Close status carried along an interface chain.
pub type Status = core::result::Result<(), Error>;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Operation cancelled by the user or the owning layer.
    #[error("Operation canceled")]
    Canceled,
    /// Retry limit exhausted or idle timeout reached.
    #[error("Connection timed out")]
    TimedOut,
    /// No peer on the other end of the interface.
    #[error("Not connected")]
    NotConnected,
    /// Job has not finished yet.
    #[error("Operation in progress")]
    InProgress,
    /// Foreground job slot already occupied.
    #[error("Device or resource busy")]
    Busy,
    /// Peer does not implement the requested operation.
    #[error("Operation not supported")]
    NotSupported,
    /// Delivery did not start at the current stream position.
    #[error("Out-of-order delivery")]
    OutOfOrder,
    #[error("Out of memory")]
    NoMemory,
    /// Work is outstanding but nothing is scheduled to progress it.
    #[error("No runnable work")]
    Stalled,
    /// Layer-specific status code.
    #[error("Error {0:#x}")]
    Code(i32),
}

impl Error {
    /// Integer status code, errno style.
    ///
    /// `Code(n)` returns `n` untouched so layer codes survive a cascade.
    pub const fn code(&self) -> i32 {
        match self {
            Self::Canceled => -125,
            Self::TimedOut => -110,
            Self::NotConnected => -32,
            Self::InProgress => -115,
            Self::Busy => -16,
            Self::NotSupported => -95,
            Self::OutOfOrder => -71,
            Self::NoMemory => -12,
            Self::Stalled => -11,
            Self::Code(n) => *n,
        }
    }
}

/// Render a close status for the console.
pub fn describe(status: &Status) -> StatusDisplay<'_> {
    StatusDisplay(status)
}

pub struct StatusDisplay<'a>(&'a Status);

impl core::fmt::Display for StatusDisplay<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Ok(()) => f.write_str("ok"),
            Err(e) => write!(f, "{}", e),
        }
    }
}
