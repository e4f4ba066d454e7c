// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Energy budget manager.
//!
//! Pure IPC sink: it is neither scheduled nor watched. Burn telemetry drains
//! the budget; once the budget is gone or the remaining ratio drops under the
//! warn threshold, the thruster is ordered to stop and an energy warning goes
//! out to everyone.

#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use apogee::ipc::{Hub, Message};

/// Name the service registers under on the hub.
pub const NAME: &str = "energyd";

const THRUSTER: &str = "thrustd";

/// Budget units consumed per newton-millisecond of burn.
pub const CONSUMPTION_FACTOR: f64 = 0.1;

struct EnergyState {
    budget: f64,
    consumed: f64,
}

/// Power budget bookkeeper.
pub struct EnergyManager {
    hub: Arc<Hub>,
    warn_ratio: f64,
    state: Mutex<EnergyState>,
}

impl EnergyManager {
    /// Creates the manager with `budget` units and registers its handler.
    /// `warn_ratio` is the remaining-energy fraction that triggers the stop.
    pub fn spawn(hub: Arc<Hub>, budget: f64, warn_ratio: f64) -> Arc<Self> {
        let service = Arc::new(EnergyManager {
            hub,
            warn_ratio,
            state: Mutex::new(EnergyState {
                budget,
                consumed: 0.0,
            }),
        });
        let handler = Arc::clone(&service);
        service
            .hub
            .register(NAME, Arc::new(move |msg| handler.receive(msg)));
        log::info!("energyd: budget manager online, {budget:.0} units");
        service
    }

    /// Remaining budget. Goes negative when burns overshoot.
    pub fn budget(&self) -> f64 {
        self.state.lock().budget
    }

    /// Total units consumed so far.
    pub fn consumed(&self) -> f64 {
        self.state.lock().consumed
    }

    fn receive(&self, msg: Message) {
        let Some(telemetry) = msg.payload.get("telemetry") else {
            return;
        };
        let thrust = telemetry["thrust"].as_f64().unwrap_or(0.0);
        let duration_ms = telemetry["duration_ms"].as_u64().unwrap_or(0);
        let cost = thrust * duration_ms as f64 * CONSUMPTION_FACTOR;

        let (budget, low) = {
            let mut state = self.state.lock();
            state.budget -= cost;
            state.consumed += cost;
            let low = state.budget <= 0.0
                || state.budget / (state.budget + state.consumed + 1e-9) < self.warn_ratio;
            (state.budget, low)
        };
        log::debug!("energyd: burn cost {cost:.1}, budget {budget:.1}");

        if low {
            log::warn!("energyd: budget low ({budget:.1}), commanding burn stop");
            self.hub
                .send(NAME, THRUSTER, json!({"action": "stop", "reason": "energy_budget"}));
            self.hub
                .broadcast(NAME, json!({"type": "energy_warning", "budget": budget}));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(hub: &Hub, name: &str) -> Arc<Mutex<Vec<Message>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hub.register(name, Arc::new(move |msg: Message| sink.lock().push(msg)));
        seen
    }

    fn burn(hub: &Hub, thrust: f64, duration_ms: u64) {
        hub.send(
            THRUSTER,
            NAME,
            json!({"telemetry": {"thrust": thrust, "duration_ms": duration_ms}}),
        );
    }

    #[test]
    fn telemetry_drains_the_budget() {
        let hub = Arc::new(Hub::new());
        let thruster = recorder(&hub, THRUSTER);
        let service = EnergyManager::spawn(Arc::clone(&hub), 500.0, 0.15);

        burn(&hub, 2.0, 100);

        assert!((service.budget() - 480.0).abs() < 1e-9);
        assert!((service.consumed() - 20.0).abs() < 1e-9);
        assert!(thruster.lock().is_empty(), "healthy budget, no stop");
    }

    #[test]
    fn exhausted_budget_stops_the_thruster_and_warns() {
        let hub = Arc::new(Hub::new());
        let thruster = recorder(&hub, THRUSTER);
        let flight = recorder(&hub, "flightd");
        let service = EnergyManager::spawn(Arc::clone(&hub), 10.0, 0.15);

        burn(&hub, 50.0, 1000);

        assert!(service.budget() < 0.0);
        let thruster = thruster.lock();
        assert_eq!(thruster.len(), 2, "stop command, then the warning broadcast");
        assert_eq!(
            thruster[0].payload,
            json!({"action": "stop", "reason": "energy_budget"})
        );
        assert_eq!(thruster[1].payload["type"], "energy_warning");
        let flight = flight.lock();
        assert_eq!(flight.len(), 1);
        assert_eq!(flight[0].payload["type"], "energy_warning");
    }

    #[test]
    fn low_remaining_ratio_warns_before_the_budget_is_gone() {
        let hub = Arc::new(Hub::new());
        let thruster = recorder(&hub, THRUSTER);
        let service = EnergyManager::spawn(Arc::clone(&hub), 500.0, 0.15);

        // 430 of 500 consumed leaves 14% remaining, under the 15% threshold.
        burn(&hub, 43.0, 100);

        assert!(service.budget() > 0.0);
        let thruster = thruster.lock();
        assert_eq!(
            thruster[0].payload["action"], "stop",
            "ratio warning fired before depletion"
        );
    }

    #[test]
    fn non_telemetry_messages_are_ignored() {
        let hub = Arc::new(Hub::new());
        let service = EnergyManager::spawn(Arc::clone(&hub), 500.0, 0.15);

        hub.send(THRUSTER, NAME, json!({"status": "stopped"}));

        assert!((service.budget() - 500.0).abs() < 1e-9);
        assert!((service.consumed()).abs() < 1e-9);
    }
}
