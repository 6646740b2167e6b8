//! Engine-to-UI message dispatch
//!
//! Relays notifications from the real-time patch engine to UI listeners
//! without allocating or locking on the engine side.
//!
//! # Architecture
//!
//! ```text
//!  engine threads                                   UI thread (vsync tick)
//! ┌──────────────┐  enqueue   ┌─────────────────┐   drain   ┌───────────────────┐
//! │ audio / sched│ ─────────► │ BoundedChannel  │ ────────► │ MessageDispatcher │
//! └──────────────┘            │ (double buffer) │           │  coalesce (src,sym)│
//!        │        ring full   └─────────────────┘           │  deliver          │
//!        └──────────────────► ┌─────────────────┐ ────────► │  prune expired    │
//!                             │ OverflowChannel │           └─────────┬─────────┘
//!                             └─────────────────┘                     │ receive_message
//!                                                          ┌──────────▼─────────┐
//!                                                          │ ListenerRegistry   │
//!                                                          │ SourceId -> Weak<L>│
//!                                                          └────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use patchbus_core::dispatch::{MessageDispatcher, MessageListener};
//! use patchbus_core::{Atom, AtomList, SourceId, Symbol};
//!
//! #[derive(Default)]
//! struct Slider {
//!     value: Mutex<f32>,
//! }
//!
//! impl MessageListener for Slider {
//!     fn receive_message(&self, _symbol: Symbol, atoms: &AtomList) {
//!         if let Some(value) = atoms.first().and_then(Atom::as_float) {
//!             *self.value.lock().unwrap() = value;
//!         }
//!     }
//! }
//!
//! let dispatcher = Arc::new(MessageDispatcher::new());
//! let slider = Arc::new(Slider::default());
//! let source = SourceId::new(0x5eed);
//!
//! dispatcher.add_listener(source, &slider);
//! dispatcher.set_blocked(false); // editor window attached
//!
//! // Engine thread
//! dispatcher.enqueue(source, Symbol::EMPTY, &[Atom::Float(0.75)]);
//!
//! // UI tick
//! dispatcher.drain();
//! assert_eq!(*slider.value.lock().unwrap(), 0.75);
//! ```

mod channel;
mod dispatcher;
mod error;
mod message;
mod overflow;
mod registry;
mod stats;

pub use channel::{BoundedChannel, Drain, DEFAULT_CHANNEL_CAPACITY};
pub use dispatcher::MessageDispatcher;
pub use error::{DispatchError, DispatchResult};
pub use message::Message;
pub use overflow::OverflowChannel;
pub use registry::{ListenerKey, ListenerRegistry, MessageListener, WeakListener};
pub use stats::{DispatchStats, DrainReport, StatsSnapshot};
