// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Navigation service. Tracks the approach trajectory by asking the NPU for
//! a fresh fix every slice.

#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use apogee::health::WATCHDOG_NAME;
use apogee::ipc::{Hub, Message};
use apogee::proc::{Priority, Process};

/// Name the service registers under on the hub.
pub const NAME: &str = "navd";

const NPU: &str = "npud";

/// Trajectory tracker.
pub struct Navigation {
    hub: Arc<Hub>,
    last_fix: Mutex<Option<Value>>,
}

impl Navigation {
    /// Creates the service and registers its message handler.
    pub fn spawn(hub: Arc<Hub>) -> Arc<Self> {
        let service = Arc::new(Navigation {
            hub,
            last_fix: Mutex::new(None),
        });
        let handler = Arc::clone(&service);
        service
            .hub
            .register(NAME, Arc::new(move |msg| handler.receive(msg)));
        log::info!("navd: navigation online");
        service
    }

    /// Most recent trajectory fix from the NPU.
    pub fn last_fix(&self) -> Option<Value> {
        self.last_fix.lock().clone()
    }

    fn request_fix(&self) {
        self.hub.send(
            NAME,
            NPU,
            json!({"action": "process", "task": "trajectory_tracking"}),
        );
    }

    fn heartbeat(&self) {
        self.hub.send(NAME, WATCHDOG_NAME, json!({"type": "heartbeat"}));
    }
}

impl Process for Navigation {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> Priority {
        Priority::HIGH
    }

    fn run(&self) {
        self.request_fix();
        self.heartbeat();
    }

    fn receive(&self, msg: Message) {
        if let Some(result) = msg.payload.get("result") {
            log::debug!("navd: trajectory fix {result}");
            *self.last_fix.lock() = Some(result.clone());
        } else if msg.payload["action"] == "recalculate_route" {
            log::info!("navd: recalculating approach route");
            self.request_fix();
        }
        self.heartbeat();
    }
}
