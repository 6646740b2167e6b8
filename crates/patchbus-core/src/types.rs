//! Common types for patchbus
//!
//! The fixed-size values that travel from the patch engine to the UI:
//! source identities, atoms and inline atom lists. None of these types
//! allocate, so they can be built and copied on the real-time thread.

use std::ops::Deref;

use crate::dispatch::{DispatchError, DispatchResult};
use crate::symbol::Symbol;

/// Maximum number of atoms carried by a single message.
///
/// Nothing in the editor reads more than 8 arguments from an engine
/// notification, so longer lists are truncated at enqueue time.
pub const MAX_ATOMS: usize = 8;

/// Opaque identity of the engine object that produced a message
///
/// Usually the address of the engine-side object. It is only ever compared
/// and hashed, never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(usize);

impl SourceId {
    /// Create a source identity from a raw value
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Use the address of an engine object as its identity
    pub fn from_ptr<T: ?Sized>(ptr: *const T) -> Self {
        Self(ptr as *const () as usize)
    }

    /// Use the address of a borrowed engine object as its identity
    pub fn of<T: ?Sized>(object: &T) -> Self {
        Self::from_ptr(object as *const T)
    }

    /// Get the raw identity value
    pub const fn raw(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A single message argument
///
/// Mirrors a Pd atom: a float, a symbol, or an opaque pointer (gpointer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Atom {
    Float(f32),
    Symbol(Symbol),
    Pointer(usize),
}

impl Default for Atom {
    fn default() -> Self {
        Atom::Float(0.0)
    }
}

impl Atom {
    pub fn is_float(&self) -> bool {
        matches!(self, Atom::Float(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Atom::Symbol(_))
    }

    /// Float value, if this atom is a float
    pub fn as_float(&self) -> Option<f32> {
        match *self {
            Atom::Float(value) => Some(value),
            _ => None,
        }
    }

    /// Symbol value, if this atom is a symbol
    pub fn as_symbol(&self) -> Option<Symbol> {
        match *self {
            Atom::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    /// Pointer value, if this atom is a pointer
    pub fn as_pointer(&self) -> Option<usize> {
        match *self {
            Atom::Pointer(ptr) => Some(ptr),
            _ => None,
        }
    }
}

impl From<f32> for Atom {
    fn from(value: f32) -> Self {
        Atom::Float(value)
    }
}

impl From<Symbol> for Atom {
    fn from(symbol: Symbol) -> Self {
        Atom::Symbol(symbol)
    }
}

/// Inline list of up to [`MAX_ATOMS`] atoms
///
/// Stored on the stack and copied by value, so building one on the audio
/// thread never touches the allocator.
#[derive(Clone, Copy, Default)]
pub struct AtomList {
    atoms: [Atom; MAX_ATOMS],
    len: u8,
}

impl AtomList {
    /// Create an empty list
    pub const fn new() -> Self {
        Self {
            atoms: [Atom::Float(0.0); MAX_ATOMS],
            len: 0,
        }
    }

    /// Copy at most [`MAX_ATOMS`] atoms from `atoms`, dropping the rest
    pub fn from_slice_truncated(atoms: &[Atom]) -> Self {
        let len = atoms.len().min(MAX_ATOMS);
        let mut list = Self::new();
        list.atoms[..len].copy_from_slice(&atoms[..len]);
        list.len = len as u8;
        list
    }

    /// Copy `atoms`, failing if there are more than [`MAX_ATOMS`]
    pub fn try_from_slice(atoms: &[Atom]) -> DispatchResult<Self> {
        if atoms.len() > MAX_ATOMS {
            return Err(DispatchError::TooManyAtoms {
                count: atoms.len(),
                max: MAX_ATOMS,
            });
        }
        Ok(Self::from_slice_truncated(atoms))
    }

    /// Append an atom. Returns `false` if the list is already full.
    pub fn push(&mut self, atom: Atom) -> bool {
        let len = self.len as usize;
        if len == MAX_ATOMS {
            return false;
        }
        self.atoms[len] = atom;
        self.len += 1;
        true
    }

    pub fn as_slice(&self) -> &[Atom] {
        &self.atoms[..self.len as usize]
    }
}

impl Deref for AtomList {
    type Target = [Atom];

    fn deref(&self) -> &[Atom] {
        self.as_slice()
    }
}

impl PartialEq for AtomList {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl std::fmt::Debug for AtomList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}
