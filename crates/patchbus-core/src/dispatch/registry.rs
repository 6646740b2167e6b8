//! Source-to-listener registry
//!
//! Maps a [`SourceId`] to the UI objects that want its messages. The registry
//! only holds [`Weak`] references: UI components own their listeners, and a
//! listener that is dropped without deregistering is detected at delivery
//! time (failed upgrade) and pruned afterwards.
//!
//! Registration is not a hot path, so everything sits behind one coarse
//! mutex. The dispatcher never holds that mutex while calling into a
//! listener, so listeners may register or deregister from inside
//! [`MessageListener::receive_message`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::symbol::Symbol;
use crate::types::{AtomList, SourceId};

/// Receiver of engine messages on the UI thread
pub trait MessageListener: Send + Sync {
    /// Called from [`MessageDispatcher::drain`](super::MessageDispatcher::drain)
    /// for every coalesced message addressed to a source this listener is
    /// registered for.
    fn receive_message(&self, symbol: Symbol, atoms: &AtomList);
}

/// Weak handle to a registered listener
pub type WeakListener = Weak<dyn MessageListener>;

/// Identity of a listener: the address of the listener object
///
/// Stable for as long as any `Arc` or `Weak` to the object exists, which the
/// registry guarantees for every key it stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerKey(usize);

impl ListenerKey {
    /// Key of a shared listener
    pub fn of<L: ?Sized>(listener: &Arc<L>) -> Self {
        Self(Arc::as_ptr(listener) as *const () as usize)
    }

    /// Key of a listener seen through a plain reference
    ///
    /// Useful from inside the listener itself, e.g. in its `Drop` impl.
    pub fn of_ref<L: ?Sized>(listener: &L) -> Self {
        Self(listener as *const L as *const () as usize)
    }

    fn of_weak(listener: &WeakListener) -> Self {
        Self(listener.as_ptr() as *const () as usize)
    }
}

struct Entry {
    key: ListenerKey,
    listener: WeakListener,
}

/// Thread-safe mapping from source to weakly held listeners
///
/// Invariant: no source maps to an empty listener list.
#[derive(Default)]
pub struct ListenerRegistry {
    sources: Mutex<HashMap<SourceId, Vec<Entry>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SourceId, Vec<Entry>>> {
        // Listener callbacks never run under this lock, so a poisoned map is
        // still consistent
        self.sources.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `listener` for messages from `source`
    ///
    /// Idempotent: returns `false` if this listener was already registered
    /// for `source`.
    pub fn add_listener<L>(&self, source: SourceId, listener: &Arc<L>) -> bool
    where
        L: MessageListener + 'static,
    {
        let weak: WeakListener = Arc::downgrade(listener) as WeakListener;
        self.add_weak(source, weak)
    }

    /// Register an already-downgraded listener
    pub fn add_weak(&self, source: SourceId, listener: WeakListener) -> bool {
        let key = ListenerKey::of_weak(&listener);
        let mut sources = self.lock();
        let entries = sources.entry(source).or_default();

        if entries.iter().any(|entry| entry.key == key) {
            return false;
        }

        entries.push(Entry { key, listener });
        log::trace!("Listener {:#x} registered for source {}", key.0, source);
        true
    }

    /// Deregister `listener` from `source`
    ///
    /// Returns `false` if it was not registered.
    pub fn remove_listener<L: ?Sized>(&self, source: SourceId, listener: &Arc<L>) -> bool {
        self.remove_key(source, ListenerKey::of(listener))
    }

    /// Deregister by listener identity
    ///
    /// Drops the source entry entirely once its last listener is removed.
    pub fn remove_key(&self, source: SourceId, key: ListenerKey) -> bool {
        let mut sources = self.lock();
        let Some(entries) = sources.get_mut(&source) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|entry| entry.key != key);
        let removed = entries.len() != before;

        if entries.is_empty() {
            sources.remove(&source);
        }
        removed
    }

    /// Copy the listeners registered for `source` into `out`
    ///
    /// Expired listeners are included; the dispatcher detects and prunes
    /// them. `out` is appended to, not cleared.
    pub(crate) fn listeners_for(&self, source: SourceId, out: &mut Vec<(ListenerKey, WeakListener)>) {
        let sources = self.lock();
        if let Some(entries) = sources.get(&source) {
            out.extend(entries.iter().map(|entry| (entry.key, entry.listener.clone())));
        }
    }

    /// Remove the given `(source, listener)` pairs if their listener is dead
    ///
    /// Live listeners are left alone even if listed. Returns how many
    /// registrations were removed.
    pub fn prune<I>(&self, expired: I) -> usize
    where
        I: IntoIterator<Item = (SourceId, ListenerKey)>,
    {
        let mut sources = self.lock();
        let mut removed = 0;

        for (source, key) in expired {
            let Some(entries) = sources.get_mut(&source) else {
                continue;
            };

            let before = entries.len();
            entries.retain(|entry| entry.key != key || entry.listener.strong_count() > 0);
            removed += before - entries.len();

            if entries.is_empty() {
                sources.remove(&source);
            }
        }
        removed
    }

    pub fn contains_source(&self, source: SourceId) -> bool {
        self.lock().contains_key(&source)
    }

    /// Number of registrations (live or expired) for `source`
    pub fn listener_count(&self, source: SourceId) -> usize {
        self.lock().get(&source).map_or(0, Vec::len)
    }

    /// Number of sources with at least one registration
    pub fn source_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
