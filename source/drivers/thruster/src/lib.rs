// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Propulsion driver.
//!
//! Burns are commanded over IPC. Each burn reports its telemetry to the
//! energy manager, acks the commander, and fires the burn-complete interrupt
//! line. The thruster stays in [`ThrusterState::Burning`] until an explicit
//! stop command arrives.

#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use apogee::health::WATCHDOG_NAME;
use apogee::ipc::{Hub, Message};
use apogee::irq::IrqDispatcher;
use apogee::proc::{Priority, Process};

/// Name the driver registers under on the hub.
pub const NAME: &str = "thrustd";

const ENERGY: &str = "energyd";

const DEFAULT_THRUST: f64 = 1.0;
const DEFAULT_DURATION_MS: u64 = 100;

/// Valve state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrusterState {
    /// No burn in progress.
    Idle,
    /// A burn was commanded and not yet stopped.
    Burning,
}

/// Main engine driver.
pub struct PropulsionDriver {
    hub: Arc<Hub>,
    irq: Arc<IrqDispatcher>,
    irq_line: u32,
    state: Mutex<ThrusterState>,
}

impl PropulsionDriver {
    /// Creates the driver and registers its message handler. `irq_line` is
    /// the burn-complete line assigned at boot.
    pub fn spawn(hub: Arc<Hub>, irq: Arc<IrqDispatcher>, irq_line: u32) -> Arc<Self> {
        let driver = Arc::new(PropulsionDriver {
            hub,
            irq,
            irq_line,
            state: Mutex::new(ThrusterState::Idle),
        });
        let handler = Arc::clone(&driver);
        driver
            .hub
            .register(NAME, Arc::new(move |msg| handler.receive(msg)));
        log::info!("thrustd: propulsion online, burn-complete on line {irq_line}");
        driver
    }

    /// Current valve state.
    pub fn state(&self) -> ThrusterState {
        *self.state.lock()
    }

    fn burn(&self, thrust: f64, duration_ms: u64) {
        *self.state.lock() = ThrusterState::Burning;
        log::info!("thrustd: burning at {thrust:.1} N for {duration_ms} ms");
        self.heartbeat();
        let telemetry = json!({"telemetry": {"thrust": thrust, "duration_ms": duration_ms}});
        self.hub.send(NAME, WATCHDOG_NAME, telemetry.clone());
        self.hub.send(NAME, ENERGY, telemetry);
        self.irq.fire(
            self.irq_line,
            json!({"event": "burn_complete", "thrust": thrust}),
        );
    }

    fn heartbeat(&self) {
        self.hub.send(NAME, WATCHDOG_NAME, json!({"type": "heartbeat"}));
    }
}

impl Process for PropulsionDriver {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> Priority {
        Priority::NORMAL
    }

    fn run(&self) {
        log::debug!("thrustd: state {:?}", self.state());
        self.heartbeat();
    }

    fn receive(&self, msg: Message) {
        let action = msg.payload["action"].as_str().unwrap_or("");
        match action {
            "burn" | "thrust" => {
                let thrust = msg.payload["thrust"].as_f64().unwrap_or(DEFAULT_THRUST);
                let duration_ms = msg.payload["duration_ms"]
                    .as_u64()
                    .unwrap_or(DEFAULT_DURATION_MS);
                self.burn(thrust, duration_ms);
                self.hub
                    .send(NAME, &msg.from, json!({"status": "ack", "action": action}));
            }
            "stop" => {
                *self.state.lock() = ThrusterState::Idle;
                let reason = msg.payload["reason"].as_str().unwrap_or("commanded");
                log::info!("thrustd: burn stopped ({reason})");
                self.hub.send(NAME, &msg.from, json!({"status": "stopped"}));
            }
            _ => {}
        }
        self.heartbeat();
    }
}
