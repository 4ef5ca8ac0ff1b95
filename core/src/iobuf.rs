//! I/O buffers passed along transfer interfaces.

use alloc::vec::Vec;

/// Owned byte buffer with headroom for lower layers to prepend headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoBuffer {
    data: Vec<u8>,
    head: usize,
}

impl IoBuffer {
    /// Empty buffer able to take `len` bytes without reallocating.
    pub fn with_capacity(len: usize) -> Self {
        Self {
            data: Vec::with_capacity(len),
            head: 0,
        }
    }

    /// Empty buffer with `headroom` bytes reserved in front.
    pub fn with_headroom(headroom: usize, len: usize) -> Self {
        let mut data = Vec::with_capacity(headroom + len);
        data.resize(headroom, 0);
        Self {
            data,
            head: headroom,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            head: 0,
        }
    }

    /// Append payload.
    pub fn put(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Prepend into headroom. Returns false if there is not enough room.
    pub fn push(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.head {
            return false;
        }
        let start = self.head - bytes.len();
        self.data[start..self.head].copy_from_slice(bytes);
        self.head = start;
        true
    }

    /// Strip `len` bytes from the front.
    pub fn pull(&mut self, len: usize) -> &[u8] {
        let len = len.min(self.len());
        let start = self.head;
        self.head += len;
        &self.data[start..self.head]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn headroom(&self) -> usize {
        self.head
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.head..]
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.drain(..self.head);
        self.data
    }
}

impl From<Vec<u8>> for IoBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data, head: 0 }
    }
}
