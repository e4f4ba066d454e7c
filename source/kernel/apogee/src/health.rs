// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Heartbeat watchdog.
//!
//! Watched processes send `{"type": "heartbeat"}` messages to the well-known
//! [`WATCHDOG_NAME`] receiver. A sweep restarts every process whose last
//! heartbeat is older than the timeout: the registered restart strategy runs
//! if there is one, otherwise a `process_restarted` broadcast goes out. After
//! a restart the heartbeat timestamp is reset so the process gets a full
//! timeout to come back up before it can expire again.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ipc::{Hub, Message};
use crate::{Error, Result};

/// Name the watchdog registers under on the hub.
pub const WATCHDOG_NAME: &str = "watchdogd";

/// Default heartbeat timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default sweep interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Closure that brings a dead process back.
pub type RestartStrategy = Arc<dyn Fn() + Send + Sync>;

struct WatchEntry {
    last_heartbeat: Instant,
    restarts: u32,
}

/// Point-in-time view of one watched process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSnapshot {
    /// Watched process name.
    pub name: String,
    /// Whether the last heartbeat is still inside the timeout.
    pub alive: bool,
    /// Restarts performed so far.
    pub restarts: u32,
    /// Milliseconds since the last heartbeat.
    pub since_heartbeat_ms: u64,
}

struct LoopState {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

struct WatchInner {
    hub: Arc<Hub>,
    timeout: Duration,
    entries: Arc<Mutex<HashMap<String, WatchEntry>>>,
    strategies: Mutex<HashMap<String, RestartStrategy>>,
    running: Mutex<Option<LoopState>>,
}

/// Watchdog handle. Cloning yields another handle to the same watch table.
#[derive(Clone)]
pub struct Watchdog {
    inner: Arc<WatchInner>,
}

impl Watchdog {
    /// Creates a watchdog and registers its heartbeat receiver on `hub`.
    ///
    /// Heartbeats from senders that are not watched are ignored.
    pub fn new(hub: Arc<Hub>, timeout: Duration) -> Self {
        let entries = Arc::new(Mutex::new(HashMap::new()));
        let sink: Arc<Mutex<HashMap<String, WatchEntry>>> = Arc::clone(&entries);
        hub.register(
            WATCHDOG_NAME,
            Arc::new(move |msg: Message| {
                if msg.payload["type"] == "heartbeat" {
                    if let Some(entry) = sink.lock().get_mut(&msg.from) {
                        entry.last_heartbeat = Instant::now();
                    }
                }
            }),
        );
        Watchdog {
            inner: Arc::new(WatchInner {
                hub,
                timeout,
                entries,
                strategies: Mutex::new(HashMap::new()),
                running: Mutex::new(None),
            }),
        }
    }

    /// Starts watching `name`, treating now as its first heartbeat.
    pub fn watch(&self, name: impl Into<String>) {
        let name = name.into();
        log::debug!("health: watching '{name}'");
        self.inner.entries.lock().insert(
            name,
            WatchEntry {
                last_heartbeat: Instant::now(),
                restarts: 0,
            },
        );
    }

    /// Registers the restart strategy for `name`, replacing any earlier one.
    pub fn register_restart(&self, name: impl Into<String>, strategy: RestartStrategy) {
        self.inner.strategies.lock().insert(name.into(), strategy);
    }

    /// Restarts every watched process whose heartbeat is older than the
    /// timeout, judged against `now`.
    pub fn sweep(&self, now: Instant) {
        let expired: Vec<String> = {
            let entries = self.inner.entries.lock();
            entries
                .iter()
                .filter(|(_, entry)| now.duration_since(entry.last_heartbeat) > self.inner.timeout)
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in expired {
            self.restart(&name);
        }
    }

    fn restart(&self, name: &str) {
        let restarts = {
            let mut entries = self.inner.entries.lock();
            let Some(entry) = entries.get_mut(name) else {
                return;
            };
            entry.restarts += 1;
            entry.restarts
        };
        log::warn!("health: '{name}' missed its heartbeat, restart #{restarts}");

        let strategy = self.inner.strategies.lock().get(name).cloned();
        match strategy {
            Some(strategy) => {
                if catch_unwind(AssertUnwindSafe(|| strategy())).is_err() {
                    log::error!("health: restart strategy for '{name}' panicked");
                }
            }
            None => {
                self.inner.hub.broadcast(
                    WATCHDOG_NAME,
                    json!({"action": "process_restarted", "process": name}),
                );
            }
        }

        // Fresh timestamp after the restart so the process gets a full
        // timeout to start heartbeating again.
        if let Some(entry) = self.inner.entries.lock().get_mut(name) {
            entry.last_heartbeat = Instant::now();
        }
    }

    /// Starts the sweep loop, checking every `period`. Fails if already
    /// running.
    pub fn start(&self, period: Duration) -> Result<()> {
        let mut running = self.inner.running.lock();
        if running.is_some() {
            return Err(Error::AlreadyRunning("watchdog"));
        }
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let watchdog = self.clone();
        let join = std::thread::Builder::new()
            .name("apogee-health".into())
            .spawn(move || run_loop(&watchdog, &stop_rx, period))
            .map_err(|source| Error::Spawn {
                name: "watchdog",
                source,
            })?;
        *running = Some(LoopState { stop_tx, join });
        log::info!("health: sweep loop started, period {period:?}");
        Ok(())
    }

    /// Stops the sweep loop and waits for it. Safe to call twice.
    pub fn shutdown(&self) {
        let state = self.inner.running.lock().take();
        let Some(LoopState { stop_tx, join }) = state else {
            return;
        };
        drop(stop_tx);
        if join.join().is_err() {
            log::error!("health: sweep loop panicked during shutdown");
        }
        log::info!("health: sweep loop stopped");
    }

    /// Restarts performed for `name`, or `None` if it is not watched.
    pub fn restarts(&self, name: &str) -> Option<u32> {
        self.inner.entries.lock().get(name).map(|e| e.restarts)
    }

    /// Snapshot of every watched process, sorted by name.
    pub fn watched(&self) -> Vec<WatchSnapshot> {
        let now = Instant::now();
        let mut snapshots: Vec<WatchSnapshot> = self
            .inner
            .entries
            .lock()
            .iter()
            .map(|(name, entry)| {
                let since = now.duration_since(entry.last_heartbeat);
                WatchSnapshot {
                    name: name.clone(),
                    alive: since <= self.inner.timeout,
                    restarts: entry.restarts,
                    since_heartbeat_ms: since.as_millis() as u64,
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Configured heartbeat timeout.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }
}

fn run_loop(watchdog: &Watchdog, stop_rx: &Receiver<()>, period: Duration) {
    loop {
        match stop_rx.recv_timeout(period) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => watchdog.sweep(Instant::now()),
        }
    }
}
