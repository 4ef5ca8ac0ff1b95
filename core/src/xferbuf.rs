//! In-memory download target.

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::intf::Metadata;
use crate::iobuf::IoBuffer;

/// Growable buffer written through transfer deliveries.
///
/// Writing past the end zero-fills the gap, so a zero-length write (a seek)
/// past the end grows the buffer to that size.
#[derive(Debug, Clone, Default)]
pub struct XferBuffer {
    data: Vec<u8>,
    pos: u64,
}

impl XferBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `bytes` at `offset`, growing as needed.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let start = usize::try_from(offset).map_err(|_| Error::NoMemory)?;
        let end = start.checked_add(bytes.len()).ok_or(Error::NoMemory)?;
        if end > self.data.len() {
            self.data
                .try_reserve(end - self.data.len())
                .map_err(|_| Error::NoMemory)?;
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Apply a delivery: position from `meta`, then write and advance.
    pub fn deliver(&mut self, buf: IoBuffer, meta: &Metadata) -> Result<()> {
        let base = if meta.absolute { 0 } else { self.pos };
        let offset = base.checked_add(meta.offset).ok_or(Error::NoMemory)?;
        self.write(offset, buf.as_slice())?;
        self.pos = offset + buf.len() as u64;
        Ok(())
    }

    /// Size of the buffer (highest offset written or sought to).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current write position.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the contents, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        self.pos = 0;
        core::mem::take(&mut self.data)
    }
}
