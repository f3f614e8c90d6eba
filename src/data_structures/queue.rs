//! # Fixed-Capacity Ring Queue
//!
//! Backing store lives inline, so a queue placed in a `static` never touches
//! the allocator. This is the only channel between interrupt handlers and the
//! main loop.
//!
//! ```text
//!   read_pos              write_pos
//!      │                      │
//!      ▼                      ▼
//! ┌────┬────┬────┬────┬────┬────┬────┬────┐
//! │    │ m0 │ m1 │ m2 │ m3 │    │    │    │   count = 4
//! └────┴────┴────┴────┴────┴────┴────┴────┘
//! ```
//!
//! `read_pos` points at the oldest element, `write_pos` at the next free
//! slot; both wrap at the capacity.
//!
//! ## Sharing With Interrupt Context
//!
//! The queue itself is not synchronized. Wrap it in a `spin::Mutex` and only
//! take the lock from the main loop while interrupts are disabled; a handler
//! then never finds the lock held.

use crate::error::{Code, Error, Result};

pub struct ArrayQueue<T: Copy, const N: usize> {
    data: [T; N],
    read_pos: usize,
    write_pos: usize,
    count: usize,
}

impl<T: Copy, const N: usize> ArrayQueue<T, N> {
    /// Creates an empty queue. `fill` only initializes the unused slots.
    pub const fn new(fill: T) -> Self {
        Self {
            data: [fill; N],
            read_pos: 0,
            write_pos: 0,
            count: 0,
        }
    }

    /// Appends `value`. A full queue is left untouched.
    pub fn push(&mut self, value: T) -> Result<()> {
        if self.count == N {
            return Err(Error::new(Code::Full));
        }

        self.data[self.write_pos] = value;
        self.count += 1;
        self.write_pos += 1;
        if self.write_pos == N {
            self.write_pos = 0;
        }
        Ok(())
    }

    /// Discards the oldest element.
    pub fn pop(&mut self) -> Result<()> {
        if self.count == 0 {
            return Err(Error::new(Code::Empty));
        }

        self.count -= 1;
        self.read_pos += 1;
        if self.read_pos == N {
            self.read_pos = 0;
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Oldest element. Meaningless when `count() == 0`: the slot under the
    /// read cursor is returned as-is.
    pub fn front(&self) -> &T {
        &self.data[self.read_pos]
    }
}
