//! dispatch-stress - hammer a MessageDispatcher from several engine threads
//!
//! Spawns producer threads that enqueue messages for a set of sources while a
//! RefreshService drains at the configured rate, then prints the dispatcher
//! counters as JSON.
//!
//! ## Command line flags
//!
//! - `--producers N`: producer threads (default 4)
//! - `--sources N`: distinct sources, one listener each (default 64)
//! - `--messages N`: messages per producer (default 100000)
//! - `--capacity N`: ring capacity per buffer (default from config)
//! - `--config PATH`: dispatcher config file (default `~/.config/patchbus/dispatcher.yaml`)

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use patchbus_core::config::{default_config_path, load_dispatcher_config};
use patchbus_core::services::{RefreshClient, RefreshCommand, RefreshService, ServiceHandle};
use patchbus_core::{Atom, AtomList, MessageDispatcher, MessageListener, SourceId, Symbol, SymbolTable};

/// Counts callbacks for one source
#[derive(Default)]
struct CountingListener {
    received: AtomicU64,
}

impl MessageListener for CountingListener {
    fn receive_message(&self, _symbol: Symbol, _atoms: &AtomList) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn flag_usize(args: &[String], flag: &str, default: usize) -> anyhow::Result<usize> {
    match flag_value(args, flag) {
        Some(value) => value
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value '{}' for {}: {}", value, flag, e)),
        None => Ok(default),
    }
}

const ATTACH_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait until the refresh service has unblocked the dispatcher
fn wait_for_attach(
    dispatcher: &MessageDispatcher,
    handle: &ServiceHandle<RefreshCommand>,
    timeout: Duration,
) -> anyhow::Result<()> {
    let deadline = Instant::now() + timeout;
    while dispatcher.is_blocked() {
        if !handle.is_running() {
            anyhow::bail!("Refresh service exited before attaching");
        }
        if Instant::now() >= deadline {
            anyhow::bail!("Refresh service did not attach within {:?}", timeout);
        }
        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config_path = flag_value(&args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(|| default_config_path("dispatcher.yaml"));
    let mut config = load_dispatcher_config(&config_path);

    let producers = flag_usize(&args, "--producers", 4)?;
    let sources = flag_usize(&args, "--sources", 64)?.max(1);
    let messages = flag_usize(&args, "--messages", 100_000)?;
    config.channel_capacity = flag_usize(&args, "--capacity", config.channel_capacity)?;

    log::info!(
        "dispatch-stress: {} producers x {} messages over {} sources, {} slots",
        producers,
        messages,
        sources,
        config.channel_capacity
    );

    let dispatcher = Arc::new(MessageDispatcher::with_config(&config)?);

    let symbols = SymbolTable::new();
    let selectors = [symbols.intern("float"), symbols.intern("set"), symbols.intern("bang")];

    let listeners: Vec<Arc<CountingListener>> = (0..sources)
        .map(|i| {
            let listener = Arc::new(CountingListener::default());
            dispatcher.add_listener(SourceId::new(i + 1), &listener);
            listener
        })
        .collect();

    let handle = RefreshService::spawn_with_config(dispatcher.clone(), &config)?;
    let client = RefreshClient::new(&handle);

    // Give the service a moment to attach before producing
    wait_for_attach(&dispatcher, &handle, ATTACH_TIMEOUT)?;

    let start = Instant::now();
    let workers: Vec<_> = (0..producers)
        .map(|p| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::Builder::new()
                .name(format!("stress-producer-{}", p))
                .spawn(move || {
                    let mut worst = Duration::ZERO;
                    for i in 0..messages {
                        let source = SourceId::new((p + i) % sources + 1);
                        let selector = selectors[i % selectors.len()];
                        let t = Instant::now();
                        dispatcher.enqueue(source, selector, &[Atom::Float(i as f32), Atom::Pointer(p)]);
                        worst = worst.max(t.elapsed());
                    }
                    worst
                })
        })
        .collect::<Result<_, _>>()?;

    let mut worst_enqueue = Duration::ZERO;
    for worker in workers {
        let worst = worker
            .join()
            .map_err(|_| anyhow::anyhow!("Producer thread panicked"))?;
        worst_enqueue = worst_enqueue.max(worst);
    }
    let produce_time = start.elapsed();

    // Let the service pick up the tail
    thread::sleep(config.refresh_interval() * 3);

    let stats = client.stats()?;
    client.shutdown()?;
    handle.join();

    let callbacks: u64 = listeners
        .iter()
        .map(|l| l.received.load(Ordering::Relaxed))
        .sum();

    log::info!(
        "Produced in {:?}, worst single enqueue {:?}, {} callbacks",
        produce_time,
        worst_enqueue,
        callbacks
    );

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
