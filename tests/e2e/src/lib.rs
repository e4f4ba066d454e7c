// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: In-process end-to-end helpers. Scenarios boot the full control
//! plane with test-friendly timings and poll for observable effects.

#![forbid(unsafe_code)]

use std::path::Path;
use std::time::{Duration, Instant};

use apogee::config::ControlConfig;
use corvus_init::{boot, BootConfig, System};

/// Loop timings tightened for tests: fast ticks, a short heartbeat timeout
/// that is still an order of magnitude above the scheduling rotation.
pub fn fast_control() -> ControlConfig {
    ControlConfig {
        tick_ms: 5,
        heartbeat_timeout_ms: 300,
        poll_interval_ms: 25,
    }
}

/// Boots the control plane with [`fast_control`] timings.
pub fn boot_fast(telemetry_path: &Path) -> anyhow::Result<System> {
    boot(BootConfig {
        control: fast_control(),
        energy_budget: corvus_init::DEFAULT_ENERGY_BUDGET,
        telemetry_path: telemetry_path.to_path_buf(),
    })
}

/// Polls `ready` every 10 ms until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut ready: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if ready() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    ready()
}
