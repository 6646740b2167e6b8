//! Background services for patchbus-core
//!
//! # Services
//!
//! - [`RefreshService`] - drains a [`MessageDispatcher`] at a fixed refresh
//!   rate, standing in for a UI vsync callback in headless hosts
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use patchbus_core::MessageDispatcher;
//! use patchbus_core::services::{RefreshService, RefreshClient};
//!
//! let dispatcher = Arc::new(MessageDispatcher::new());
//!
//! // Attaches the dispatcher and starts draining at ~60 Hz
//! let handle = RefreshService::spawn(dispatcher.clone(), Duration::from_millis(16)).unwrap();
//! let client = RefreshClient::new(&handle);
//!
//! let stats = client.stats().unwrap();
//! println!("Delivered {} callbacks", stats.delivered);
//!
//! // Detaches (blocks + flushes) and stops the thread
//! client.shutdown().unwrap();
//! handle.join();
//! ```
//!
//! [`MessageDispatcher`]: crate::dispatch::MessageDispatcher

pub mod messages;
pub mod refresh;

pub use messages::{RefreshCommand, ServiceHandle};
pub use refresh::{RefreshClient, RefreshService};
