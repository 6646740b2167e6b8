//! Patchbus Core - engine-to-UI message dispatch for the patch editor

pub mod config;
pub mod dispatch;
pub mod services;
pub mod symbol;
pub mod types;

pub use dispatch::{MessageDispatcher, MessageListener};
pub use symbol::{Symbol, SymbolTable};
pub use types::*;
