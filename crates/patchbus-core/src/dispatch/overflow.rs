//! Unbounded fallback queue for bursts the ring cannot absorb
//!
//! Only used when the active ring buffer is full. Pushing here may allocate
//! (a new `SegQueue` block every 31 messages), which is why it is a backstop
//! and not the primary path. Anything landing here means producers are
//! outrunning the UI refresh rate.

use crossbeam::queue::SegQueue;

use super::message::Message;

/// Unbounded multi-producer, multi-consumer overflow queue
#[derive(Default)]
pub struct OverflowChannel {
    queue: SegQueue<Message>,
}

impl OverflowChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message. Always succeeds.
    #[inline]
    pub fn push(&self, message: Message) {
        self.queue.push(message);
    }

    /// Remove and return everything currently queued
    ///
    /// Messages pushed while draining may or may not be included.
    pub fn drain(&self) -> impl Iterator<Item = Message> + '_ {
        let queued = self.queue.len();
        (0..queued).map_while(move |_| self.queue.pop())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Discard everything queued, returning how many messages were dropped
    pub fn clear(&self) -> usize {
        self.drain().count()
    }
}
