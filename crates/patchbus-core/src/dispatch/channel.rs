//! Double-buffered lock-free message ring
//!
//! Producers (the engine's audio or scheduler threads) push into the
//! *active* buffer. Once per UI refresh the consumer flips which buffer is
//! active and drains the one producers just left.
//!
//! ```text
//!   producers ──push──► [ active  ]      consumer flips `active`
//!                       [ standby ] ──►  then drains the old buffer
//! ```
//!
//! # Real-Time Safety
//!
//! - **No allocations**: both buffers are `ArrayQueue`s sized at startup
//! - **Producers never wait**: a push is one atomic slot claim plus two
//!   counter updates. A producer that races a flip retries against the new
//!   active buffer instead of waiting for the consumer.
//! - **Consumer waits, briefly**: after a flip the consumer spins until the
//!   handful of producers still inside a push on the old buffer have left,
//!   so records from one producer thread keep their order across a flip.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::queue::ArrayQueue;

use super::message::Message;

/// Default per-buffer capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 65536;

/// Spins before the consumer starts yielding while waiting out producers
const SPINS_BEFORE_YIELD: u32 = 64;

struct Buffer {
    queue: ArrayQueue<Message>,
    /// Producers currently inside `push` on this buffer
    writers: AtomicUsize,
}

impl Buffer {
    fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            writers: AtomicUsize::new(0),
        }
    }
}

/// Fixed-capacity, multi-producer, single-consumer message channel
pub struct BoundedChannel {
    buffers: [Buffer; 2],
    /// Index of the buffer producers write into (0 or 1)
    active: AtomicUsize,
}

impl BoundedChannel {
    /// Create a channel whose buffers each hold `capacity` messages
    ///
    /// # Panics
    /// Panics if `capacity` is zero. Validate through
    /// [`DispatcherConfig`](crate::config::DispatcherConfig) first.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: [Buffer::new(capacity), Buffer::new(capacity)],
            active: AtomicUsize::new(0),
        }
    }

    /// Per-buffer capacity
    pub fn capacity(&self) -> usize {
        self.buffers[0].queue.capacity()
    }

    /// Approximate number of queued messages across both buffers
    pub fn len(&self) -> usize {
        self.buffers[0].queue.len() + self.buffers[1].queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push a message into the active buffer
    ///
    /// Returns `false` without side effects if the active buffer is full;
    /// the caller is expected to fall back to the overflow channel.
    /// Safe to call from any number of threads at once.
    #[inline]
    pub fn push(&self, message: Message) -> bool {
        loop {
            let index = self.active.load(Ordering::SeqCst);
            let buffer = &self.buffers[index];

            buffer.writers.fetch_add(1, Ordering::SeqCst);
            if self.active.load(Ordering::SeqCst) != index {
                // Flipped under us: the consumer may already be past its
                // writer check on this buffer, so don't write into it
                buffer.writers.fetch_sub(1, Ordering::SeqCst);
                continue;
            }

            let accepted = buffer.queue.push(message).is_ok();
            buffer.writers.fetch_sub(1, Ordering::SeqCst);
            return accepted;
        }
    }

    /// Flip the buffers and drain everything producers wrote before the flip
    ///
    /// Single consumer only: two overlapping calls would hand the same
    /// buffer to both. The returned iterator is lazy and finite; messages it
    /// does not yield stay queued and come out in a later drain.
    pub fn swap_and_drain(&self) -> Drain<'_> {
        let previous = self.active.fetch_xor(1, Ordering::SeqCst);
        let standby = &self.buffers[previous];

        let mut spins = 0u32;
        while standby.writers.load(Ordering::SeqCst) != 0 {
            if spins < SPINS_BEFORE_YIELD {
                std::hint::spin_loop();
                spins += 1;
            } else {
                std::thread::yield_now();
            }
        }

        Drain {
            queue: &standby.queue,
            remaining: standby.queue.len(),
        }
    }

    /// Discard everything in both buffers (consumer side)
    ///
    /// Returns the number of messages discarded.
    pub fn clear(&self) -> usize {
        self.swap_and_drain().count() + self.swap_and_drain().count()
    }
}

/// Draining iterator returned by [`BoundedChannel::swap_and_drain`]
pub struct Drain<'a> {
    queue: &'a ArrayQueue<Message>,
    remaining: usize,
}

impl Iterator for Drain<'_> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.queue.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
