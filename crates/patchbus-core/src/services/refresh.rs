//! RefreshService - drains the dispatcher at a fixed refresh rate
//!
//! In the editor, `drain` is called from the UI's vsync callback. Hosts
//! without a UI loop (headless sessions, the stress tool, tests) run this
//! service instead: it attaches the dispatcher on start, drains once per
//! tick, and blocks (flushing the queues) on shutdown.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender};

use super::messages::{RefreshCommand, ServiceHandle};
use crate::config::DispatcherConfig;
use crate::dispatch::{DispatchError, DispatchResult, MessageDispatcher, StatsSnapshot};

const SERVICE_NAME: &str = "RefreshService";

/// Periodically drains a [`MessageDispatcher`] on its own thread
pub struct RefreshService {
    dispatcher: Arc<MessageDispatcher>,
    command_rx: Receiver<RefreshCommand>,
    interval: Duration,
}

impl RefreshService {
    /// Spawn the service, draining every `interval`
    pub fn spawn(
        dispatcher: Arc<MessageDispatcher>,
        interval: Duration,
    ) -> DispatchResult<ServiceHandle<RefreshCommand>> {
        if interval.is_zero() {
            return Err(DispatchError::InvalidRefreshInterval(0));
        }

        let (command_tx, command_rx) = crossbeam::channel::unbounded();

        let service = RefreshService {
            dispatcher,
            command_rx,
            interval,
        };

        let handle = thread::Builder::new()
            .name("message-refresh".into())
            .spawn(move || {
                service.run();
            })
            .map_err(|e| DispatchError::ServiceSpawn {
                service: SERVICE_NAME.to_string(),
                reason: e.to_string(),
            })?;

        Ok(ServiceHandle {
            command_tx,
            thread_handle: Some(handle),
        })
    }

    /// Spawn the service using the configured refresh interval
    pub fn spawn_with_config(
        dispatcher: Arc<MessageDispatcher>,
        config: &DispatcherConfig,
    ) -> DispatchResult<ServiceHandle<RefreshCommand>> {
        config.validate()?;
        Self::spawn(dispatcher, config.refresh_interval())
    }

    /// Main service loop
    fn run(mut self) {
        log::info!("{} started ({:?} interval)", SERVICE_NAME, self.interval);
        self.dispatcher.set_blocked(false);

        let mut ticker = crossbeam::channel::tick(self.interval);

        loop {
            let mut reschedule = None;

            crossbeam::select! {
                recv(self.command_rx) -> cmd => {
                    match cmd {
                        Ok(RefreshCommand::Shutdown) => {
                            log::info!("{} shutting down", SERVICE_NAME);
                            break;
                        }
                        Ok(RefreshCommand::SetInterval(interval)) => {
                            if interval.is_zero() {
                                log::warn!("{}: ignoring zero refresh interval", SERVICE_NAME);
                                continue;
                            }
                            reschedule = Some(interval);
                        }
                        Ok(RefreshCommand::Snapshot { reply }) => {
                            let _ = reply.send(self.dispatcher.stats());
                        }
                        Err(_) => {
                            log::info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }
                recv(ticker) -> _ => self.tick(),
            }

            if let Some(interval) = reschedule {
                log::debug!("{}: refresh interval {:?} -> {:?}", SERVICE_NAME, self.interval, interval);
                self.interval = interval;
                ticker = crossbeam::channel::tick(interval);
            }
        }

        // Deliver what the engine sent before shutdown was requested
        self.tick();
        self.dispatcher.set_blocked(true);

        log::info!("{} stopped", SERVICE_NAME);
    }

    fn tick(&self) {
        let start = Instant::now();
        let report = self.dispatcher.drain();
        let elapsed = start.elapsed();

        if elapsed > self.interval {
            log::warn!(
                "{}: drain took {:?}, over the {:?} refresh interval ({} messages, {} callbacks)",
                SERVICE_NAME,
                elapsed,
                self.interval,
                report.drained,
                report.delivered
            );
        } else if !report.is_empty() {
            log::trace!(
                "{}: drained {} messages ({} coalesced), {} callbacks",
                SERVICE_NAME,
                report.drained,
                report.coalesced,
                report.delivered
            );
        }
    }
}

/// Client for controlling a running RefreshService
#[derive(Clone)]
pub struct RefreshClient {
    command_tx: Sender<RefreshCommand>,
}

impl RefreshClient {
    /// Create a new client from a service handle
    pub fn new(handle: &ServiceHandle<RefreshCommand>) -> Self {
        Self {
            command_tx: handle.command_tx.clone(),
        }
    }

    fn send(&self, cmd: RefreshCommand) -> DispatchResult<()> {
        self.command_tx
            .send(cmd)
            .map_err(|_| DispatchError::ServiceStopped(SERVICE_NAME.to_string()))
    }

    /// Change the drain period
    pub fn set_interval(&self, interval: Duration) -> DispatchResult<()> {
        if interval.is_zero() {
            return Err(DispatchError::InvalidRefreshInterval(0));
        }
        self.send(RefreshCommand::SetInterval(interval))
    }

    /// Get the dispatcher's counters (blocking)
    pub fn stats(&self) -> DispatchResult<StatsSnapshot> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(RefreshCommand::Snapshot { reply: tx })?;
        rx.blocking_recv()
            .map_err(|_| DispatchError::ServiceStopped(SERVICE_NAME.to_string()))
    }

    /// Ask the service to detach and stop
    pub fn shutdown(&self) -> DispatchResult<()> {
        self.send(RefreshCommand::Shutdown)
    }
}
