//! Configuration for the dispatch core
//!
//! - [`DispatcherConfig`]: ring capacity, refresh rate and initial state
//! - YAML loading (with validation and fallback to defaults) and saving
//! - Default config file location
//!
//! # Usage
//!
//! ```ignore
//! use patchbus_core::config::{default_config_path, load_dispatcher_config};
//!
//! let config = load_dispatcher_config(&default_config_path("dispatcher.yaml"));
//! let dispatcher = MessageDispatcher::with_config(&config)?;
//! ```

mod dispatcher;
mod io;
mod paths;

pub use dispatcher::DispatcherConfig;
pub use io::{load_dispatcher_config, read_dispatcher_config, save_dispatcher_config};
pub use paths::{default_config_dir, default_config_path};
