// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Spectral composition analyzer. Low priority background science: asks the
//! NPU what the coma is made of and keeps the latest report.

#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use apogee::health::WATCHDOG_NAME;
use apogee::ipc::{Hub, Message};
use apogee::proc::{Priority, Process};

/// Name the service registers under on the hub.
pub const NAME: &str = "specd";

const NPU: &str = "npud";

/// Coma composition analyzer.
pub struct CompositionAnalyzer {
    hub: Arc<Hub>,
    last_report: Mutex<Option<Value>>,
}

impl CompositionAnalyzer {
    /// Creates the service and registers its message handler.
    pub fn spawn(hub: Arc<Hub>) -> Arc<Self> {
        let service = Arc::new(CompositionAnalyzer {
            hub,
            last_report: Mutex::new(None),
        });
        let handler = Arc::clone(&service);
        service
            .hub
            .register(NAME, Arc::new(move |msg| handler.receive(msg)));
        log::info!("specd: spectrometer online");
        service
    }

    /// Most recent composition report from the NPU.
    pub fn last_report(&self) -> Option<Value> {
        self.last_report.lock().clone()
    }

    fn request_analysis(&self) {
        self.hub.send(
            NAME,
            NPU,
            json!({"action": "process", "task": "composition_analysis"}),
        );
    }

    fn heartbeat(&self) {
        self.hub.send(NAME, WATCHDOG_NAME, json!({"type": "heartbeat"}));
    }
}

impl Process for CompositionAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> Priority {
        Priority::LOW
    }

    fn run(&self) {
        self.request_analysis();
        self.heartbeat();
    }

    fn receive(&self, msg: Message) {
        if let Some(result) = msg.payload.get("result") {
            log::info!("specd: composition report {result}");
            *self.last_report.lock() = Some(result.clone());
        } else if msg.payload["action"] == "analyze" {
            self.request_analysis();
        }
        self.heartbeat();
    }
}
