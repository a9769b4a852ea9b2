//! Growable receive buffer for a single connection.
//!
//! # Responsibilities
//! - Allocate the base region lazily on the first receive
//! - Double capacity (up to the limit) when the offered region has been filled
//! - Keep every received byte at its original offset (append, never overwrite)
//! - Reset to empty between receive/send cycles
//!
//! # Design Decisions
//! - `len` (bytes in use) is tracked separately from the allocation so a
//!   short read never leaves a gap of unwritten bytes inside the used range
//! - Growth is capped by a configured limit; exceeding it is an error the
//!   dispatcher turns into a forced shutdown

use std::ops::Range;

/// Base allocation for a fresh buffer.
pub const BASE_SIZE: usize = 1024;

/// Error returned when the buffer would have to grow past its limit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("receive buffer would grow to {requested} bytes, limit is {limit}")]
    LimitExceeded { requested: usize, limit: usize },
}

/// A connection's receive buffer.
#[derive(Debug)]
pub struct ReceiveBuffer {
    data: Vec<u8>,
    len: usize,
    initial_size: usize,
    max_size: usize,
}

impl ReceiveBuffer {
    /// Create an empty buffer. Nothing is allocated until [`grow`](Self::grow).
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        Self {
            data: Vec::new(),
            len: 0,
            initial_size: initial_size.max(1),
            max_size,
        }
    }

    /// Reset to zero length and release the allocation.
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.len = 0;
    }

    /// Make room for the next receive and return the region to read into.
    ///
    /// An empty buffer gets the base allocation and offers all of it. A
    /// buffer whose allocation is completely filled doubles in size, clamped
    /// to the limit, and offers only the newly added tail, so data from
    /// earlier receives stays in place and the next read appends after it.
    pub fn grow(&mut self) -> Result<Range<usize>, BufferError> {
        if self.data.is_empty() {
            if self.initial_size > self.max_size {
                return Err(BufferError::LimitExceeded {
                    requested: self.initial_size,
                    limit: self.max_size,
                });
            }
            self.data = vec![0; self.initial_size];
            self.len = 0;
            return Ok(0..self.data.len());
        }

        if self.len < self.data.len() {
            return Ok(self.len..self.data.len());
        }

        let capacity = self.data.len();
        let doubled = capacity.saturating_mul(2);
        if capacity >= self.max_size {
            return Err(BufferError::LimitExceeded {
                requested: doubled,
                limit: self.max_size,
            });
        }
        let new_len = doubled.min(self.max_size);
        self.data.resize(new_len, 0);
        Ok(self.len..new_len)
    }

    /// Mutable view of a region previously returned by [`grow`](Self::grow).
    pub fn region_mut(&mut self, region: Range<usize>) -> &mut [u8] {
        &mut self.data[region]
    }

    /// Record that `n` bytes were written at the end of the used range.
    /// Returns the range those bytes now occupy.
    pub fn commit(&mut self, n: usize) -> Range<usize> {
        let start = self.len;
        self.len = (self.len + n).min(self.data.len());
        start..self.len
    }

    /// Replace the contents wholesale, e.g. with a response built by a handler.
    pub fn replace(&mut self, bytes: Vec<u8>) {
        self.len = bytes.len();
        self.data = bytes;
    }

    /// Bytes currently in use.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the current allocation.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}
