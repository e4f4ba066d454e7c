// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Full-system flight. Boot, fly scripted demo cycles, check the
//! snapshot on disk and the telemetry path, shut down clean.

use std::time::Duration;

use serde_json::json;

use corvus_e2e::{boot_fast, wait_for};
use corvus_init::{run_demo, DemoConfig, SystemSnapshot, GROUND};

#[test]
fn demo_mission_writes_snapshots_and_telemetry() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let telemetry_path = dir.path().join("telemetry.json");
    let snapshot_path = dir.path().join("snapshot.json");
    let system = boot_fast(&telemetry_path)?;

    run_demo(
        &system,
        &DemoConfig {
            cycles: 5,
            delay: Duration::from_millis(5),
            fail_at: None,
            seed: 42,
            snapshot_path: Some(snapshot_path.clone()),
        },
    )?;

    let raw = std::fs::read_to_string(&snapshot_path)?;
    let snapshot: SystemSnapshot = serde_json::from_str(&raw)?;
    assert!(snapshot.processes.len() >= 6, "all six mission processes queued");
    assert_eq!(snapshot.watched.len(), 6);
    assert_eq!(snapshot.regions.len(), 6);
    assert!(snapshot.captured_at_ms > 0);

    // A commanded capture lands in the telemetry store on disk.
    system
        .hub
        .send(GROUND, "camerad", json!({"action": "capture"}));
    assert!(!system.telemetry.records().is_empty());
    assert!(
        wait_for(Duration::from_secs(5), || telemetry_path.exists()),
        "telemetry store file written"
    );

    system.shutdown();
    Ok(())
}
