// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! NPU co-processor driver.
//!
//! Answers `{"action": "process", "task": ...}` requests with canned analysis
//! results so the navigation and spectroscopy services have something to chew
//! on without real silicon behind them.

#![forbid(unsafe_code)]

use std::sync::Arc;

use serde_json::{json, Value};

use apogee::health::WATCHDOG_NAME;
use apogee::ipc::{Hub, Message};
use apogee::proc::{Priority, Process};

/// Name the driver registers under on the hub.
pub const NAME: &str = "npud";

/// Stateless inference co-processor.
pub struct NpuDriver {
    hub: Arc<Hub>,
}

impl NpuDriver {
    /// Creates the driver and registers its message handler.
    pub fn spawn(hub: Arc<Hub>) -> Arc<Self> {
        let driver = Arc::new(NpuDriver { hub });
        let handler = Arc::clone(&driver);
        driver
            .hub
            .register(NAME, Arc::new(move |msg| handler.receive(msg)));
        log::info!("npud: co-processor online");
        driver
    }

    /// Canned model output for a named task.
    pub fn analyze(task: &str) -> Value {
        match task {
            "trajectory_tracking" => json!({
                "trajectory": "hyperbolic",
                "speed_kms": 30,
            }),
            "composition_analysis" => json!({
                "molecules": ["H2O", "CH4", "NH3"],
                "organics_detected": true,
            }),
            _ => json!({}),
        }
    }

    fn heartbeat(&self) {
        self.hub.send(NAME, WATCHDOG_NAME, json!({"type": "heartbeat"}));
    }
}

impl Process for NpuDriver {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> Priority {
        Priority::NORMAL
    }

    fn run(&self) {
        self.heartbeat();
    }

    fn receive(&self, msg: Message) {
        if msg.payload["action"] == "process" {
            let task = msg.payload["task"].as_str().unwrap_or("");
            let result = Self::analyze(task);
            log::debug!("npud: processed '{task}' for '{}'", msg.from);
            self.hub.send(NAME, &msg.from, json!({"result": result}));
        }
        self.heartbeat();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn trajectory_task_yields_a_hyperbolic_fix() {
        let result = NpuDriver::analyze("trajectory_tracking");
        assert_eq!(result["trajectory"], "hyperbolic");
        assert_eq!(result["speed_kms"], 30);
    }

    #[test]
    fn composition_task_lists_cometary_molecules() {
        let result = NpuDriver::analyze("composition_analysis");
        assert_eq!(result["molecules"], json!(["H2O", "CH4", "NH3"]));
        assert_eq!(result["organics_detected"], true);
    }

    #[test]
    fn unknown_task_yields_an_empty_result() {
        assert_eq!(NpuDriver::analyze("weather_forecast"), json!({}));
    }

    #[test]
    fn process_request_is_answered_to_the_requester() {
        let hub = Arc::new(Hub::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hub.register("navd", Arc::new(move |msg: Message| sink.lock().push(msg)));

        let _driver = NpuDriver::spawn(Arc::clone(&hub));
        hub.send(
            "navd",
            NAME,
            json!({"action": "process", "task": "trajectory_tracking"}),
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].from, NAME);
        assert_eq!(seen[0].payload["result"]["trajectory"], "hyperbolic");
    }

    #[test]
    fn handled_work_is_followed_by_a_heartbeat() {
        let hub = Arc::new(Hub::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hub.register(
            WATCHDOG_NAME,
            Arc::new(move |msg: Message| sink.lock().push(msg)),
        );

        let driver = NpuDriver::spawn(Arc::clone(&hub));
        hub.send("specd", NAME, json!({"action": "process", "task": "composition_analysis"}));
        driver.run();

        let seen = seen.lock();
        assert!(seen.len() >= 2);
        assert!(seen
            .iter()
            .all(|m| m.from == NAME && m.payload["type"] == "heartbeat"));
    }
}
