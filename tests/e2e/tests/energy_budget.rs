// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Power accounting. A burn past the budget makes energyd stop the
//! thruster and broadcast a warning, all within the synchronous send chain.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use apogee::ipc::Message;
use corvus_e2e::boot_fast;
use corvus_init::GROUND;
use thruster::ThrusterState;

#[test]
fn burn_past_the_budget_stops_the_thruster() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let system = boot_fast(&dir.path().join("telemetry.json"))?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    system
        .hub
        .register(GROUND, Arc::new(move |msg: Message| sink.lock().push(msg)));

    // 50 N for 1000 ms costs 5000 units against the stock 500 budget.
    system.hub.send(
        GROUND,
        "thrustd",
        json!({"action": "burn", "thrust": 50.0, "duration_ms": 1000}),
    );

    assert!(system.energy.budget() < 0.0, "burn overshot the budget");
    assert_eq!(
        system.thruster.state(),
        ThrusterState::Idle,
        "energyd's stop command closed the valve"
    );

    let seen = seen.lock();
    assert!(
        seen.iter()
            .any(|m| m.from == "thrustd" && m.payload["status"] == "ack"),
        "burn was acknowledged"
    );
    assert!(
        seen.iter().any(|m| m.payload["type"] == "energy_warning"),
        "energy warning broadcast reached ground"
    );

    drop(seen);
    system.shutdown();
    Ok(())
}
