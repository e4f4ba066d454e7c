// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Boot binary: bring the control plane up, fly the demo mission, shut down.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use apogee::config::ControlConfig;
use corvus_init::{boot, run_demo, BootConfig, DemoConfig, DEFAULT_ENERGY_BUDGET};

#[derive(Debug, Parser)]
#[command(
    name = "corvus-init",
    about = "Boot the Corvus-1 control plane and fly the demo mission"
)]
struct Args {
    /// Demo cycles to fly.
    #[arg(long, default_value_t = 10)]
    cycles: u32,

    /// Milliseconds between demo cycles.
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,

    /// Jam the camera at this cycle to exercise the watchdog.
    #[arg(long)]
    fail_at: Option<u32>,

    /// Seed for the demo event dice.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Control timing TOML file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Snapshot JSON path, rewritten every cycle.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Telemetry store path.
    #[arg(long, default_value = "data/telemetry.json")]
    telemetry: PathBuf,

    /// Energy budget handed to energyd.
    #[arg(long, default_value_t = DEFAULT_ENERGY_BUDGET)]
    energy_budget: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let control = match &args.config {
        Some(path) => ControlConfig::load(path)
            .with_context(|| format!("load control config {}", path.display()))?,
        None => ControlConfig::default(),
    };

    let system = boot(BootConfig {
        control,
        energy_budget: args.energy_budget,
        telemetry_path: args.telemetry.clone(),
    })?;
    println!("corvus-init: ready");

    run_demo(
        &system,
        &DemoConfig {
            cycles: args.cycles,
            delay: Duration::from_millis(args.delay_ms),
            fail_at: args.fail_at,
            seed: args.seed,
            snapshot_path: args.snapshot.clone(),
        },
    )?;

    system.shutdown();
    println!("corvus-init: mission complete");
    Ok(())
}
