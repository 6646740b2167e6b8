//! MessageDispatcher - engine-to-UI message relay
//!
//! The engine calls [`MessageDispatcher::enqueue`] from its audio or
//! scheduler thread; the UI calls [`MessageDispatcher::drain`] once per
//! display refresh. In between, messages sit in the lock-free ring (or, under
//! overload, the overflow queue).
//!
//! # Drain cycle
//!
//! 1. Flip the ring and pull everything from it, then from the overflow queue
//! 2. Keep only the first message per `(source, symbol)`, in arrival order
//! 3. Deliver each survivor to the live listeners of its source, noting
//!    listeners that have been dropped
//! 4. Prune the dropped listeners from the registry
//!
//! Coalescing is first-wins: if a value changes three times between two
//! refreshes, the UI sees the first change this frame and nothing for the
//! other two. This caps UI work per frame regardless of engine message rate.
//!
//! # Blocking
//!
//! The dispatcher starts blocked. While blocked, `enqueue` is a no-op. Both
//! transitions flush the channels, so nothing enqueued before a detach can be
//! delivered after the next attach.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::channel::{BoundedChannel, DEFAULT_CHANNEL_CAPACITY};
use super::error::DispatchResult;
use super::message::Message;
use super::overflow::OverflowChannel;
use super::registry::{ListenerKey, ListenerRegistry, MessageListener, WeakListener};
use super::stats::{DispatchStats, DrainReport, StatsSnapshot};
use crate::config::DispatcherConfig;
use crate::symbol::Symbol;
use crate::types::{Atom, SourceId};

/// Consumer-side working buffers, reused across drains
#[derive(Default)]
struct DrainScratch {
    seen: HashSet<(SourceId, Symbol)>,
    batch: Vec<Message>,
    listeners: Vec<(ListenerKey, WeakListener)>,
    /// Expired registrations plus a weak handle that keeps the listener's
    /// address from being reused until the prune has run
    expired: Vec<(SourceId, ListenerKey, WeakListener)>,
    /// Whether the previous drain saw overflow traffic
    overflowing: bool,
}

impl DrainScratch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            batch: Vec::with_capacity(capacity),
            listeners: Vec::new(),
            expired: Vec::new(),
            overflowing: false,
        }
    }

    /// Keep `message` unless its `(source, symbol)` was already seen this cycle
    #[inline]
    fn accept(&mut self, message: Message, report: &mut DrainReport) {
        report.drained += 1;
        if self.seen.insert(message.key()) {
            self.batch.push(message);
        } else {
            report.coalesced += 1;
        }
    }

    fn reset(&mut self) {
        self.seen.clear();
        self.batch.clear();
        self.listeners.clear();
        self.expired.clear();
    }
}

/// Relays engine messages to UI listeners
///
/// Shared between the engine and the UI as an `Arc<MessageDispatcher>`.
/// Any number of threads may `enqueue`; only one thread at a time should
/// `drain`.
pub struct MessageDispatcher {
    channel: BoundedChannel,
    overflow: OverflowChannel,
    registry: ListenerRegistry,
    blocked: AtomicBool,
    stats: DispatchStats,
    scratch: Mutex<DrainScratch>,
}

impl MessageDispatcher {
    /// Create a blocked dispatcher with the default ring capacity
    pub fn new() -> Self {
        Self::build(DEFAULT_CHANNEL_CAPACITY, true)
    }

    /// Create a dispatcher from configuration
    pub fn with_config(config: &DispatcherConfig) -> DispatchResult<Self> {
        config.validate()?;
        Ok(Self::build(config.channel_capacity, config.start_blocked))
    }

    fn build(capacity: usize, start_blocked: bool) -> Self {
        log::info!(
            "MessageDispatcher created: {} slots per buffer, {}",
            capacity,
            if start_blocked { "blocked" } else { "active" }
        );

        Self {
            channel: BoundedChannel::new(capacity),
            overflow: OverflowChannel::new(),
            registry: ListenerRegistry::new(),
            blocked: AtomicBool::new(start_blocked),
            stats: DispatchStats::new(),
            scratch: Mutex::new(DrainScratch::with_capacity(capacity.min(4096))),
        }
    }

    fn lock_scratch(&self) -> MutexGuard<'_, DrainScratch> {
        self.scratch.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ─────────────────────────────────────────────────────────────
    // Producer side
    // ─────────────────────────────────────────────────────────────

    /// Queue a message for the UI (real-time safe)
    ///
    /// At most [`MAX_ATOMS`](crate::MAX_ATOMS) atoms are kept. Never blocks,
    /// and only allocates when the ring is full and the overflow queue has to
    /// grow.
    #[inline]
    pub fn enqueue(&self, source: SourceId, symbol: Symbol, atoms: &[Atom]) {
        self.enqueue_message(Message::new(source, symbol, atoms));
    }

    /// Queue a prebuilt message (real-time safe)
    #[inline]
    pub fn enqueue_message(&self, message: Message) {
        if self.blocked.load(Ordering::Acquire) {
            self.stats.record_dropped_blocked();
            return;
        }

        let overflowed = !self.channel.push(message);
        if overflowed {
            self.overflow.push(message);
        }
        self.stats.record_enqueued(overflowed);
    }

    // ─────────────────────────────────────────────────────────────
    // Consumer side
    // ─────────────────────────────────────────────────────────────

    /// Block or unblock message delivery
    ///
    /// Call with `true` when the UI surface goes away (no editor open,
    /// shutdown) and `false` when it comes back. Changing state flushes all
    /// queued messages.
    pub fn set_blocked(&self, blocked: bool) {
        let was_blocked = self.blocked.load(Ordering::Acquire);
        if was_blocked == blocked {
            return;
        }

        if blocked {
            // Stop producers first, then throw away what they left behind
            self.blocked.store(true, Ordering::Release);
            let flushed = self.flush();
            log::debug!("MessageDispatcher blocked, flushed {} messages", flushed);
        } else {
            // Anything still queued raced the block and is stale
            let flushed = self.flush();
            self.blocked.store(false, Ordering::Release);
            log::debug!("MessageDispatcher unblocked, discarded {} stale messages", flushed);
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::Acquire)
    }

    fn flush(&self) -> usize {
        let _scratch = self.lock_scratch();
        let flushed = self.channel.clear() + self.overflow.clear();
        self.stats.record_flushed(flushed);
        flushed
    }

    /// Deliver everything queued since the last drain
    ///
    /// Call once per UI refresh from the UI thread. Listener callbacks run
    /// synchronously on the calling thread with no dispatcher lock held; a
    /// panicking listener unwinds out of this call.
    ///
    /// While blocked nothing is delivered. Records that slipped in after the
    /// block's flush are discarded and counted as flushed.
    pub fn drain(&self) -> DrainReport {
        if self.blocked.load(Ordering::Acquire) {
            let flushed = self.flush();
            if flushed > 0 {
                log::debug!("Drain while blocked discarded {} late messages", flushed);
            }
            return DrainReport::default();
        }

        let mut report = DrainReport::default();

        let mut scratch = {
            let mut guard = self.lock_scratch();
            let mut scratch = std::mem::take(&mut *guard);
            self.collect_batch(&mut scratch, &mut report);
            scratch
        };

        self.deliver(&mut scratch, &mut report);

        if !scratch.expired.is_empty() {
            report.pruned = self
                .registry
                .prune(scratch.expired.iter().map(|(source, key, _)| (*source, *key)));
            log::debug!("Pruned {} expired message listeners", report.pruned);
        }

        self.log_overflow(&mut scratch, &report);
        self.stats.record_drain(&report);

        scratch.reset();
        *self.lock_scratch() = scratch;

        report
    }

    /// Pull this cycle's messages and apply first-wins coalescing
    fn collect_batch(&self, scratch: &mut DrainScratch, report: &mut DrainReport) {
        for message in self.channel.swap_and_drain() {
            scratch.accept(message, report);
        }

        let from_ring = report.drained;
        for message in self.overflow.drain() {
            scratch.accept(message, report);
        }
        report.overflowed = report.drained - from_ring;
    }

    fn deliver(&self, scratch: &mut DrainScratch, report: &mut DrainReport) {
        let DrainScratch {
            batch,
            listeners,
            expired,
            ..
        } = scratch;

        for message in batch.iter() {
            listeners.clear();
            self.registry.listeners_for(message.source, listeners);

            for (key, weak) in listeners.iter() {
                match weak.upgrade() {
                    Some(listener) => {
                        listener.receive_message(message.symbol, &message.atoms);
                        report.delivered += 1;
                    }
                    None => {
                        if !expired
                            .iter()
                            .any(|(source, k, _)| *source == message.source && k == key)
                        {
                            expired.push((message.source, *key, weak.clone()));
                        }
                    }
                }
            }
        }
    }

    fn log_overflow(&self, scratch: &mut DrainScratch, report: &DrainReport) {
        if report.overflowed > 0 {
            if !scratch.overflowing {
                log::warn!(
                    "Message ring saturated ({} slots): {} messages went through the overflow queue",
                    self.channel.capacity(),
                    report.overflowed
                );
            } else {
                log::debug!("{} messages drained from overflow queue", report.overflowed);
            }
            scratch.overflowing = true;
        } else if scratch.overflowing {
            log::info!("Message ring recovered from overflow");
            scratch.overflowing = false;
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────

    /// Register `listener` for messages from `source` (idempotent)
    pub fn add_listener<L>(&self, source: SourceId, listener: &Arc<L>) -> bool
    where
        L: MessageListener + 'static,
    {
        self.registry.add_listener(source, listener)
    }

    /// Deregister `listener` from `source`
    ///
    /// Takes effect from the next drain; a callback already running is not
    /// interrupted.
    pub fn remove_listener<L: ?Sized>(&self, source: SourceId, listener: &Arc<L>) -> bool {
        self.registry.remove_listener(source, listener)
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    // ─────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Approximate number of queued messages
    pub fn pending(&self) -> usize {
        self.channel.len() + self.overflow.len()
    }

    /// Per-buffer ring capacity
    pub fn capacity(&self) -> usize {
        self.channel.capacity()
    }
}

impl Default for MessageDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;
    use crate::types::AtomList;
    use std::thread;
    use std::time::{Duration, Instant};

    /// Records every message it receives
    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<(Symbol, AtomList)>>,
    }

    impl Recorder {
        fn received(&self) -> Vec<(Symbol, AtomList)> {
            self.received.lock().unwrap().clone()
        }

        fn count(&self) -> usize {
            self.received.lock().unwrap().len()
        }
    }

    impl MessageListener for Recorder {
        fn receive_message(&self, symbol: Symbol, atoms: &AtomList) {
            self.received.lock().unwrap().push((symbol, *atoms));
        }
    }

    fn active_dispatcher(capacity: usize) -> MessageDispatcher {
        let config = DispatcherConfig {
            channel_capacity: capacity,
            start_blocked: false,
            ..DispatcherConfig::default()
        };
        MessageDispatcher::with_config(&config).unwrap()
    }

    fn float(atoms: &AtomList) -> f32 {
        atoms[0].as_float().unwrap()
    }

    #[test]
    fn test_starts_blocked_and_ignores_enqueue() {
        let dispatcher = MessageDispatcher::new();
        let listener = Arc::new(Recorder::default());
        let source = SourceId::new(1);
        dispatcher.add_listener(source, &listener);

        assert!(dispatcher.is_blocked());
        dispatcher.enqueue(source, Symbol::EMPTY, &[Atom::Float(1.0)]);
        assert_eq!(dispatcher.pending(), 0);

        dispatcher.drain();
        assert_eq!(listener.count(), 0);
        assert_eq!(dispatcher.stats().dropped_blocked, 1);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = DispatcherConfig {
            channel_capacity: 0,
            ..DispatcherConfig::default()
        };
        assert!(MessageDispatcher::with_config(&config).is_err());
    }

    #[test]
    fn test_distinct_pairs_delivered_in_order() {
        let dispatcher = active_dispatcher(64);
        let symbols = SymbolTable::new();
        let float_sym = symbols.intern("float");
        let set_sym = symbols.intern("set");

        let source = SourceId::new(1);
        let listener = Arc::new(Recorder::default());
        dispatcher.add_listener(source, &listener);

        dispatcher.enqueue(source, float_sym, &[Atom::Float(1.0)]);
        dispatcher.enqueue(source, set_sym, &[Atom::Float(2.0)]);
        dispatcher.enqueue(source, Symbol::EMPTY, &[]);

        let report = dispatcher.drain();
        assert_eq!(report.delivered, 3);

        let received = listener.received();
        let order: Vec<Symbol> = received.iter().map(|(s, _)| *s).collect();
        assert_eq!(order, vec![float_sym, set_sym, Symbol::EMPTY]);
        assert!(received[2].1.is_empty());
    }

    #[test]
    fn test_many_sources_each_get_their_own() {
        let dispatcher = active_dispatcher(64);
        let listeners: Vec<Arc<Recorder>> = (0..4).map(|_| Arc::new(Recorder::default())).collect();
        for (i, listener) in listeners.iter().enumerate() {
            dispatcher.add_listener(SourceId::new(i), listener);
        }

        for i in 0..4 {
            dispatcher.enqueue(SourceId::new(i), Symbol::EMPTY, &[Atom::Float(i as f32)]);
        }
        dispatcher.drain();

        for (i, listener) in listeners.iter().enumerate() {
            let received = listener.received();
            assert_eq!(received.len(), 1);
            assert_eq!(float(&received[0].1), i as f32);
        }
    }

    #[test]
    fn test_coalesces_first_wins() {
        let dispatcher = active_dispatcher(64);
        let source = SourceId::new(1);
        let listener = Arc::new(Recorder::default());
        dispatcher.add_listener(source, &listener);

        for i in 0..5 {
            dispatcher.enqueue(source, Symbol::EMPTY, &[Atom::Float(i as f32)]);
        }

        let report = dispatcher.drain();
        assert_eq!(report.drained, 5);
        assert_eq!(report.coalesced, 4);

        let received = listener.received();
        assert_eq!(received.len(), 1);
        assert_eq!(float(&received[0].1), 0.0);

        // Coalescing is per drain: the next cycle delivers again
        dispatcher.enqueue(source, Symbol::EMPTY, &[Atom::Float(9.0)]);
        dispatcher.drain();
        assert_eq!(float(&listener.received()[1].1), 9.0);
    }

    #[test]
    fn test_coalescing_keeps_first_occurrence_order() {
        let dispatcher = active_dispatcher(64);
        let symbols = SymbolTable::new();
        let a = symbols.intern("a");
        let b = symbols.intern("b");
        let source = SourceId::new(1);
        let listener = Arc::new(Recorder::default());
        dispatcher.add_listener(source, &listener);

        dispatcher.enqueue(source, a, &[Atom::Float(1.0)]);
        dispatcher.enqueue(source, b, &[Atom::Float(2.0)]);
        dispatcher.enqueue(source, a, &[Atom::Float(3.0)]);

        dispatcher.drain();
        let received = listener.received();
        assert_eq!(received.len(), 2);
        assert_eq!((received[0].0, float(&received[0].1)), (a, 1.0));
        assert_eq!((received[1].0, float(&received[1].1)), (b, 2.0));
    }

    #[test]
    fn test_overflow_still_delivers() {
        let capacity = 16;
        let dispatcher = active_dispatcher(capacity);
        let listener = Arc::new(Recorder::default());

        // Distinct sources so nothing coalesces
        for i in 0..=capacity {
            dispatcher.add_listener(SourceId::new(i), &listener);
            dispatcher.enqueue(SourceId::new(i), Symbol::EMPTY, &[Atom::Float(i as f32)]);
        }

        assert_eq!(dispatcher.stats().overflowed, 1);

        let report = dispatcher.drain();
        assert_eq!(report.overflowed, 1);
        assert_eq!(listener.count(), capacity + 1);

        let last = listener.received().last().map(|(_, atoms)| float(atoms));
        assert_eq!(last, Some(capacity as f32));
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let dispatcher = active_dispatcher(64);
        let source = SourceId::new(1);
        let listener = Arc::new(Recorder::default());
        dispatcher.add_listener(source, &listener);
        drop(listener);

        dispatcher.enqueue(source, Symbol::EMPTY, &[Atom::Float(1.0)]);
        let report = dispatcher.drain();

        assert_eq!(report.delivered, 0);
        assert_eq!(report.pruned, 1);
        assert!(!dispatcher.registry().contains_source(source));
    }

    #[test]
    fn test_expired_listener_pruned_once_per_drain() {
        let dispatcher = active_dispatcher(64);
        let symbols = SymbolTable::new();
        let source = SourceId::new(1);
        let live = Arc::new(Recorder::default());
        let dead = Arc::new(Recorder::default());
        dispatcher.add_listener(source, &live);
        dispatcher.add_listener(source, &dead);
        drop(dead);

        dispatcher.enqueue(source, symbols.intern("x"), &[]);
        dispatcher.enqueue(source, symbols.intern("y"), &[]);
        let report = dispatcher.drain();

        assert_eq!(report.delivered, 2);
        assert_eq!(report.pruned, 1);
        assert_eq!(dispatcher.registry().listener_count(source), 1);
    }

    #[test]
    fn test_block_flushes_pending() {
        let dispatcher = active_dispatcher(64);
        let source = SourceId::new(1);
        let listener = Arc::new(Recorder::default());
        dispatcher.add_listener(source, &listener);

        for i in 0..10 {
            dispatcher.enqueue(SourceId::new(1), Symbol::EMPTY, &[Atom::Float(i as f32)]);
        }
        dispatcher.set_blocked(true);
        dispatcher.set_blocked(false);

        let report = dispatcher.drain();
        assert!(report.is_empty());
        assert_eq!(listener.count(), 0);
        assert_eq!(dispatcher.stats().flushed, 10);
    }

    #[test]
    fn test_drain_while_blocked_discards_late_records() {
        let dispatcher = active_dispatcher(64);
        let source = SourceId::new(1);
        let listener = Arc::new(Recorder::default());
        dispatcher.add_listener(source, &listener);

        dispatcher.set_blocked(true);
        // A producer that saw the dispatcher active just before the block
        // lands its record after the flush
        assert!(dispatcher
            .channel
            .push(Message::new(source, Symbol::EMPTY, &[Atom::Float(1.0)])));
        dispatcher.overflow.push(Message::new(source, Symbol::EMPTY, &[]));

        let report = dispatcher.drain();
        assert!(report.is_empty());
        assert_eq!(listener.count(), 0);
        assert_eq!(dispatcher.pending(), 0);
        assert_eq!(dispatcher.stats().flushed, 2);
        assert_eq!(dispatcher.stats().delivered, 0);
    }

    #[test]
    fn test_block_flushes_overflow_too() {
        let dispatcher = active_dispatcher(2);
        for i in 0..5 {
            dispatcher.enqueue(SourceId::new(i), Symbol::EMPTY, &[]);
        }
        assert_eq!(dispatcher.pending(), 5);

        dispatcher.set_blocked(true);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_double_registration_delivers_once() {
        let dispatcher = active_dispatcher(64);
        let source = SourceId::new(1);
        let listener = Arc::new(Recorder::default());
        assert!(dispatcher.add_listener(source, &listener));
        assert!(!dispatcher.add_listener(source, &listener));

        dispatcher.enqueue(source, Symbol::EMPTY, &[Atom::Float(1.0)]);
        dispatcher.drain();
        assert_eq!(listener.count(), 1);
    }

    #[test]
    fn test_removed_listener_not_called() {
        let dispatcher = active_dispatcher(64);
        let source = SourceId::new(1);
        let listener = Arc::new(Recorder::default());
        dispatcher.add_listener(source, &listener);
        dispatcher.remove_listener(source, &listener);

        dispatcher.enqueue(source, Symbol::EMPTY, &[]);
        let report = dispatcher.drain();
        assert_eq!(report.drained, 1);
        assert_eq!(listener.count(), 0);
    }

    /// Removes itself from the dispatcher on the first message
    struct OneShot {
        dispatcher: Arc<MessageDispatcher>,
        source: SourceId,
        hits: Mutex<usize>,
    }

    impl MessageListener for OneShot {
        fn receive_message(&self, _symbol: Symbol, _atoms: &AtomList) {
            *self.hits.lock().unwrap() += 1;
            self.dispatcher
                .registry()
                .remove_key(self.source, ListenerKey::of_ref(self));
        }
    }

    #[test]
    fn test_listener_can_deregister_during_delivery() {
        let dispatcher = Arc::new(active_dispatcher(64));
        let source = SourceId::new(1);
        let listener = Arc::new(OneShot {
            dispatcher: Arc::clone(&dispatcher),
            source,
            hits: Mutex::new(0),
        });
        dispatcher.add_listener(source, &listener);

        dispatcher.enqueue(source, Symbol::EMPTY, &[]);
        dispatcher.drain();
        dispatcher.enqueue(source, Symbol::EMPTY, &[]);
        dispatcher.drain();

        assert_eq!(*listener.hits.lock().unwrap(), 1);
        assert!(!dispatcher.registry().contains_source(source));
    }

    #[test]
    fn test_enqueue_never_waits_on_stalled_consumer() {
        let capacity = 1024;
        let dispatcher = Arc::new(active_dispatcher(capacity));

        // Hold the consumer-side lock for the whole burst
        let _stalled = dispatcher.lock_scratch();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || {
                    let start = Instant::now();
                    for i in 0..capacity / 4 {
                        dispatcher.enqueue(SourceId::new(p), Symbol::EMPTY, &[Atom::Float(i as f32)]);
                    }
                    start.elapsed()
                })
            })
            .collect();

        for producer in producers {
            let elapsed = producer.join().unwrap();
            assert!(elapsed < Duration::from_secs(1), "producer took {:?}", elapsed);
        }
        assert_eq!(dispatcher.stats().enqueued, capacity as u64);
        assert_eq!(dispatcher.stats().overflowed, 0);
    }

    #[test]
    fn test_concurrent_producers_with_live_consumer() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 2000;

        let dispatcher = Arc::new(active_dispatcher(256));
        let symbols = SymbolTable::new();
        let per_message: Vec<Symbol> = (0..PER_PRODUCER)
            .map(|i| symbols.intern(&format!("m{}", i)))
            .collect();
        let per_message = Arc::new(per_message);

        let listener = Arc::new(Recorder::default());
        for p in 0..PRODUCERS {
            dispatcher.add_listener(SourceId::new(p), &listener);
        }

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let dispatcher = Arc::clone(&dispatcher);
                let per_message = Arc::clone(&per_message);
                thread::spawn(move || {
                    for symbol in per_message.iter() {
                        dispatcher.enqueue(SourceId::new(p), *symbol, &[Atom::Float(p as f32)]);
                    }
                })
            })
            .collect();

        while producers.iter().any(|p| !p.is_finished()) {
            dispatcher.drain();
        }
        for producer in producers {
            producer.join().unwrap();
        }
        dispatcher.drain();
        dispatcher.drain();

        // Every (source, symbol) pair is unique, so nothing may coalesce away
        assert_eq!(listener.count(), PRODUCERS * PER_PRODUCER);
        assert_eq!(dispatcher.pending(), 0);
    }
}
