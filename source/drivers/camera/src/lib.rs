// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Nucleus imaging camera driver.
//!
//! Captures are commanded over IPC. Each frame is handed to the telemetry
//! store and announced on the camera interrupt line. A jammed camera goes
//! completely silent, including its heartbeats, which is what hands it over
//! to the watchdog.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::json;

use apogee::health::WATCHDOG_NAME;
use apogee::ipc::{Hub, Message};
use apogee::irq::IrqDispatcher;
use apogee::proc::{Priority, Process};

/// Name the driver registers under on the hub.
pub const NAME: &str = "camerad";

const TELEMETRY: &str = "telemd";

/// Narrow-angle camera pointed at the 4I/Lyra nucleus.
pub struct CameraDriver {
    hub: Arc<Hub>,
    irq: Arc<IrqDispatcher>,
    irq_line: u32,
    frames: AtomicU32,
    jammed: AtomicBool,
}

impl CameraDriver {
    /// Creates the driver and registers its message handler. `irq_line` is
    /// the frame-captured line assigned at boot.
    pub fn spawn(hub: Arc<Hub>, irq: Arc<IrqDispatcher>, irq_line: u32) -> Arc<Self> {
        let driver = Arc::new(CameraDriver {
            hub,
            irq,
            irq_line,
            frames: AtomicU32::new(0),
            jammed: AtomicBool::new(false),
        });
        let handler = Arc::clone(&driver);
        driver
            .hub
            .register(NAME, Arc::new(move |msg| handler.receive(msg)));
        log::info!("camerad: imaging online, frame events on line {irq_line}");
        driver
    }

    /// Captures one frame: stores it via telemd, fires the frame event.
    pub fn capture(&self) {
        let frame = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        let filename = format!("LYRA_nucleus_{frame:03}.jpg");
        log::info!("camerad: captured {filename}");
        self.hub.send(
            NAME,
            TELEMETRY,
            json!({"action": "save", "filename": filename, "kind": "nucleus_frame"}),
        );
        self.irq.fire(
            self.irq_line,
            json!({"event": "frame_captured", "filename": filename}),
        );
        self.heartbeat();
    }

    /// Simulates a sensor fault: run and receive go silent until the driver
    /// is replaced.
    pub fn jam(&self) {
        log::warn!("camerad: sensor jammed");
        self.jammed.store(true, Ordering::SeqCst);
    }

    /// Frames captured by this instance.
    pub fn frames(&self) -> u32 {
        self.frames.load(Ordering::SeqCst)
    }

    /// Whether the sensor is jammed.
    pub fn jammed(&self) -> bool {
        self.jammed.load(Ordering::SeqCst)
    }

    fn heartbeat(&self) {
        self.hub.send(NAME, WATCHDOG_NAME, json!({"type": "heartbeat"}));
    }
}

impl Process for CameraDriver {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> Priority {
        Priority::NORMAL
    }

    fn run(&self) {
        if self.jammed() {
            return;
        }
        self.heartbeat();
    }

    fn receive(&self, msg: Message) {
        if self.jammed() {
            return;
        }
        if msg.payload["action"] == "capture" {
            self.capture();
        }
    }
}
