//! Session modifications-buffer tracker
//!
//! The card holds every in-session modification in a bounded buffer until
//! the session closes; overflowing it aborts the session card-side. The
//! terminal mirrors the consumption so an overflow is caught before the
//! command is ever transmitted.

use tracing::trace;

use crate::error::{Error, Result};

/// Terminal-side mirror of the card's modifications buffer
#[derive(Debug)]
pub struct SessionBuffer {
    capacity: usize,
    consumed: usize,
}

impl SessionBuffer {
    /// An empty buffer with the card's declared capacity
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            consumed: 0,
        }
    }

    /// Total capacity in bytes
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes consumed so far
    pub const fn consumed(&self) -> usize {
        self.consumed
    }

    /// Bytes still available
    pub const fn available(&self) -> usize {
        self.capacity - self.consumed
    }

    /// Reserve `cost` bytes, all or nothing
    ///
    /// On overflow the tracker is left unchanged; the caller must not
    /// transmit the rejected command.
    pub fn reserve(&mut self, cost: usize) -> Result<()> {
        if cost > self.available() {
            return Err(Error::SessionBufferOverflow {
                requested: cost,
                available: self.available(),
            });
        }
        self.consumed += cost;
        trace!(
            cost,
            consumed = self.consumed,
            capacity = self.capacity,
            "session buffer reserved"
        );
        Ok(())
    }
}
