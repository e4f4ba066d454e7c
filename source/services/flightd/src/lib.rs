// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Flight control service. Critical priority: keeps the approach trajectory
//! ticking and answers course-adjust commands.

#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use apogee::health::WATCHDOG_NAME;
use apogee::ipc::{Hub, Message};
use apogee::proc::{Priority, Process};

/// Name the service registers under on the hub.
pub const NAME: &str = "flightd";

/// Distance to the 4I/Lyra nucleus at boot, in kilometres.
pub const INITIAL_DISTANCE_KM: u64 = 150_000;

/// Kilometres closed per control slice.
const APPROACH_RATE_KM: u64 = 25;

/// Primary flight computer.
pub struct FlightControl {
    hub: Arc<Hub>,
    distance_km: Mutex<u64>,
}

impl FlightControl {
    /// Creates the service at the stock approach distance and registers its
    /// message handler.
    pub fn spawn(hub: Arc<Hub>) -> Arc<Self> {
        Self::spawn_at(hub, INITIAL_DISTANCE_KM)
    }

    /// Creates the service at a given approach distance.
    pub fn spawn_at(hub: Arc<Hub>, distance_km: u64) -> Arc<Self> {
        let service = Arc::new(FlightControl {
            hub,
            distance_km: Mutex::new(distance_km),
        });
        let handler = Arc::clone(&service);
        service
            .hub
            .register(NAME, Arc::new(move |msg| handler.receive(msg)));
        log::info!("flightd: flight control online, {distance_km} km to target");
        service
    }

    /// Remaining distance to the nucleus.
    pub fn distance_km(&self) -> u64 {
        *self.distance_km.lock()
    }

    fn heartbeat(&self) {
        self.hub.send(NAME, WATCHDOG_NAME, json!({"type": "heartbeat"}));
    }
}

impl Process for FlightControl {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> Priority {
        Priority::CRITICAL
    }

    fn run(&self) {
        let distance = {
            let mut distance = self.distance_km.lock();
            *distance = distance.saturating_sub(APPROACH_RATE_KM);
            *distance
        };
        self.hub.broadcast(
            NAME,
            json!({"type": "nav_update", "distance_km": distance, "status": "stable"}),
        );
        self.heartbeat();
    }

    fn receive(&self, msg: Message) {
        if msg.payload["action"] == "adjust_course" {
            let delta_v = msg.payload["delta_v"].as_f64().unwrap_or(0.0);
            log::info!("flightd: adjusting course, delta-v {delta_v:.2} m/s");
        }
        self.heartbeat();
    }
}
