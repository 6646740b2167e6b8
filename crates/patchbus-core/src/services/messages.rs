//! Message types for service communication
//!
//! Commands are sent over crossbeam channels; request-reply commands carry a
//! oneshot sender for the answer.

use std::time::Duration;

use crate::dispatch::StatsSnapshot;

// ============================================================================
// Refresh Commands
// ============================================================================

/// Commands sent to the RefreshService
pub enum RefreshCommand {
    /// Change the drain period
    SetInterval(Duration),

    /// Get the dispatcher's counters
    Snapshot {
        reply: tokio::sync::oneshot::Sender<StatsSnapshot>,
    },

    /// Detach the dispatcher and stop the service
    Shutdown,
}

// ============================================================================
// Service Handle
// ============================================================================

/// Handle for communicating with a background service
pub struct ServiceHandle<Cmd> {
    /// Channel for sending commands to the service
    pub command_tx: crossbeam::channel::Sender<Cmd>,
    /// Thread handle for the service
    pub thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl<Cmd> ServiceHandle<Cmd> {
    /// Send a command to the service
    pub fn send(&self, cmd: Cmd) -> Result<(), crossbeam::channel::SendError<Cmd>> {
        self.command_tx.send(cmd)
    }

    /// Check if the service is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the service thread to exit
    ///
    /// Does not ask it to stop; send the service's shutdown command first.
    pub fn join(mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Service thread panicked");
            }
        }
    }
}
