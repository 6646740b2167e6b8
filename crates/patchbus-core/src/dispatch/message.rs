//! The fixed-size record that crosses from the engine to the UI

use crate::symbol::Symbol;
use crate::types::{Atom, AtomList, SourceId};

/// One engine notification
///
/// `Copy` and allocation-free: the record is written by value into a
/// preallocated ring slot on the producer thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Message {
    pub source: SourceId,
    pub symbol: Symbol,
    pub atoms: AtomList,
}

impl Message {
    /// Build a message, truncating `atoms` to [`crate::MAX_ATOMS`]
    #[inline]
    pub fn new(source: SourceId, symbol: Symbol, atoms: &[Atom]) -> Self {
        Self {
            source,
            symbol,
            atoms: AtomList::from_slice_truncated(atoms),
        }
    }

    /// Coalescing key: only the first message per key is delivered in a drain
    #[inline]
    pub fn key(&self) -> (SourceId, Symbol) {
        (self.source, self.symbol)
    }
}
