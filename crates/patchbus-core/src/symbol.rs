//! Interned message symbols
//!
//! Engine messages are tagged with a selector symbol ("float", "bang", "set",
//! ...). Symbols are interned once, off the real-time thread, and then passed
//! around as a plain `u32` identity so records stay `Copy`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Identity of an interned symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Symbol(u32);

impl Symbol {
    /// The empty symbol, always interned at index 0
    ///
    /// Messages enqueued without a selector are delivered with this symbol.
    pub const EMPTY: Symbol = Symbol(0);

    /// Raw interner index
    pub const fn index(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

#[derive(Default)]
struct Interner {
    names: Vec<Arc<str>>,
    ids: HashMap<Arc<str>, Symbol>,
}

/// Symbol interner shared by the engine and the UI
///
/// Interning takes a write lock and may allocate, so call [`intern`] when a
/// patch is loaded, not from inside the audio callback. Once a symbol exists,
/// [`lookup`] only takes the read lock.
///
/// [`intern`]: SymbolTable::intern
/// [`lookup`]: SymbolTable::lookup
pub struct SymbolTable {
    inner: RwLock<Interner>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut interner = Interner::default();
        let empty: Arc<str> = Arc::from("");
        interner.names.push(empty.clone());
        interner.ids.insert(empty, Symbol::EMPTY);

        Self {
            inner: RwLock::new(interner),
        }
    }

    /// Intern `name`, returning the existing symbol if it was seen before
    pub fn intern(&self, name: &str) -> Symbol {
        if let Some(symbol) = self.lookup(name) {
            return symbol;
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        // Another thread may have interned it between the two locks
        if let Some(&symbol) = inner.ids.get(name) {
            return symbol;
        }

        let symbol = Symbol(inner.names.len() as u32);
        let name: Arc<str> = Arc::from(name);
        inner.names.push(name.clone());
        inner.ids.insert(name, symbol);

        log::trace!("Interned symbol '{}' as {}", inner.names[symbol.0 as usize], symbol.0);
        symbol
    }

    /// Find an already interned symbol without inserting
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.ids.get(name).copied()
    }

    /// Get the text of a symbol
    ///
    /// Returns `None` for symbols that came from a different table.
    pub fn resolve(&self, symbol: Symbol) -> Option<Arc<str>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.names.get(symbol.0 as usize).cloned()
    }

    /// Number of interned symbols, including the empty symbol
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).names.len()
    }

    /// Always false: the empty symbol is interned on construction
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
