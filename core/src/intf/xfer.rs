//! Data transfer metadata and helpers.

use alloc::string::String;
use core::fmt;

use crate::error::{Error, Result};

/// Where a delivery belongs in the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Offset, relative to the current position unless `absolute`.
    pub offset: u64,
    /// `offset` counts from the start of the stream.
    pub absolute: bool,
}

impl Metadata {
    /// Absolute position.
    pub const fn at(offset: u64) -> Self {
        Self {
            offset,
            absolute: true,
        }
    }

    /// Skip `offset` bytes past the current position.
    pub const fn relative(offset: u64) -> Self {
        Self {
            offset,
            absolute: false,
        }
    }
}

/// Out-of-band control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Sender's window has changed; a blocked writer may retry.
    WindowChanged,
    /// Layer-defined.
    User(u32),
}

/// Target of an open or redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Uri(String),
}

impl Location {
    pub fn uri(uri: &str) -> Self {
        Self::Uri(String::from(uri))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uri(uri) => f.write_str(uri),
        }
    }
}

/// Enforce in-order delivery.
///
/// A non-empty delivery must start exactly at `*pos`; on success `*pos`
/// advances by `len`. Zero-length deliveries always pass.
pub fn check_order(meta: &Metadata, pos: &mut u64, len: usize) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    let base = if meta.absolute { 0 } else { *pos };
    if base.wrapping_add(meta.offset) != *pos {
        log::debug!(
            "[INTF] out of order delivery: {}+{} expected at {}",
            base,
            meta.offset,
            pos
        );
        return Err(Error::OutOfOrder);
    }
    *pos += len as u64;
    Ok(())
}
