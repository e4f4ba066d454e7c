// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Camera fault injection. A jammed camera stops heartbeating, the
//! watchdog restarts it, and the replacement instance answers commands.

use std::time::Duration;

use serde_json::json;

use corvus_e2e::{boot_fast, wait_for};
use corvus_init::GROUND;

#[test]
fn jammed_camera_is_restarted_by_the_watchdog() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let system = boot_fast(&dir.path().join("telemetry.json"))?;

    system
        .hub
        .send(GROUND, "camerad", json!({"action": "capture"}));
    assert_eq!(system.camera.frames(), 1);
    let records_before = system.telemetry.records().len();
    assert!(records_before >= 1);

    system.camera.jam();
    assert!(system.camera.jammed());

    let restarted = wait_for(Duration::from_secs(10), || {
        system.watchdog.restarts("camerad").unwrap_or(0) >= 1
    });
    assert!(restarted, "watchdog never replaced the jammed camera");

    // The replacement registered itself on the hub; commands work again.
    system
        .hub
        .send(GROUND, "camerad", json!({"action": "capture"}));
    assert!(system.telemetry.records().len() > records_before);
    assert_eq!(
        system.camera.frames(),
        1,
        "the jammed instance stayed silent"
    );

    // The replacement heartbeats once scheduled, so the restart count
    // settles instead of climbing every sweep.
    let count = system.watchdog.restarts("camerad").unwrap_or(0);
    std::thread::sleep(Duration::from_millis(100));
    let later = system.watchdog.restarts("camerad").unwrap_or(0);
    assert!(later <= count + 1, "replacement keeps the watchdog fed");

    system.shutdown();
    Ok(())
}
