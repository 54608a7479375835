//! Growable byte accumulator for inbound bodies.
//!
//! Capacity is always a power of two. When an append would overflow it, the
//! buffer is regrown to the next power of two at or above the new length,
//! so collecting `n` bytes costs O(n) copying and O(log(n / initial))
//! reallocations. The size limit is checked before any byte of a chunk is
//! copied; once it trips, the accumulation is abandoned for good.

use crate::error::{StreamError, StreamResult};
use bytes::Bytes;

/// Capacity allocated before the first append.
pub const DEFAULT_INITIAL_CAPACITY: usize = 4096;

/// Collects byte chunks into one contiguous buffer.
#[derive(Debug)]
pub struct ByteAccumulator {
    buf: Vec<u8>,
    capacity: usize,
    max_size: usize,
    reallocations: usize,
    abandoned: bool,
}

impl ByteAccumulator {
    /// Accumulator with the default initial capacity.
    pub fn new(max_size: usize) -> Self {
        Self::with_initial_capacity(DEFAULT_INITIAL_CAPACITY, max_size)
    }

    /// Accumulator whose initial capacity is `initial` rounded up to a power of two.
    pub fn with_initial_capacity(initial: usize, max_size: usize) -> Self {
        let capacity = initial.max(1).next_power_of_two();
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            max_size,
            reallocations: 0,
            abandoned: false,
        }
    }

    /// Append `chunk`, failing if the running total would exceed the limit.
    ///
    /// On failure the buffered bytes are released and every later call,
    /// including [`finish`](Self::finish), fails.
    pub fn append(&mut self, chunk: &[u8]) -> StreamResult<()> {
        if self.abandoned {
            return Err(StreamError::Abandoned);
        }
        let new_len = match self.buf.len().checked_add(chunk.len()) {
            Some(n) if n <= self.max_size => n,
            _ => {
                let attempted = self.buf.len().saturating_add(chunk.len());
                self.abandon();
                return Err(StreamError::Oversize {
                    limit: self.max_size,
                    attempted,
                });
            }
        };
        if new_len > self.capacity {
            self.grow(new_len);
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Fail early when the sender announced a length above the limit.
    pub fn check_declared_length(&mut self, declared: u64) -> StreamResult<()> {
        if self.abandoned {
            return Err(StreamError::Abandoned);
        }
        match usize::try_from(declared) {
            Ok(n) if n <= self.max_size => Ok(()),
            _ => {
                self.abandon();
                Err(StreamError::Oversize {
                    limit: self.max_size,
                    attempted: usize::try_from(declared).unwrap_or(usize::MAX),
                })
            }
        }
    }

    /// The exact concatenation of every appended chunk, in order.
    pub fn finish(self) -> StreamResult<Bytes> {
        if self.abandoned {
            return Err(StreamError::Abandoned);
        }
        Ok(Bytes::from(self.buf))
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True before any byte was appended.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current logical capacity (a power of two).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of times the buffer was regrown.
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// Configured size limit.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn grow(&mut self, needed: usize) {
        let target = needed.checked_next_power_of_two().unwrap_or(needed);
        self.buf.reserve_exact(target - self.buf.len());
        log::trace!("Accumulator grew from {} to {target} bytes", self.capacity);
        self.capacity = target;
        self.reallocations += 1;
    }

    fn abandon(&mut self) {
        self.abandoned = true;
        self.buf = Vec::new();
    }
}

#[cfg(test)]
#[path = "accumulator_test.rs"]
mod tests;
