// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Boot layer for the Corvus-1 control plane.
//! INTENT: Wire the kernel pieces to the mission services, fly the scripted
//!         demo mission, and expose snapshots for the operator tooling.
//! DEPS: apogee plus the service and driver crates; rand drives the demo
//!       event dice.
//! TESTS: unit tests below; full scenarios live in corvus-e2e.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;

use apogee::config::ControlConfig;
use apogee::health::{WatchSnapshot, Watchdog};
use apogee::ipc::Hub;
use apogee::irq::IrqDispatcher;
use apogee::mm::RegionTable;
use apogee::proc::{ProcessDescriptor, ProcessSnapshot};
use apogee::sched::Scheduler;

use camera::CameraDriver;
use energyd::EnergyManager;
use flightd::FlightControl;
use navd::Navigation;
use npu::NpuDriver;
use specd::CompositionAnalyzer;
use telemd::TelemetryStore;
use thruster::PropulsionDriver;

/// Interrupt line for camera frame events.
pub const IRQ_CAMERA: u32 = 3;
/// Interrupt line for thruster burn-complete events.
pub const IRQ_THRUSTER: u32 = 5;
/// Sender name used when re-injecting interrupts over IPC.
pub const IRQ_SENDER: &str = "irq";
/// Sender name for operator commands (demo loop, tests).
pub const GROUND: &str = "ground";
/// Stock energy budget in units.
pub const DEFAULT_ENERGY_BUDGET: f64 = 500.0;

const ENERGY_WARN_RATIO: f64 = 0.15;

/// Boot parameters.
#[derive(Debug, Clone)]
pub struct BootConfig {
    /// Loop timings.
    pub control: ControlConfig,
    /// Energy budget handed to energyd.
    pub energy_budget: f64,
    /// Telemetry store file.
    pub telemetry_path: PathBuf,
}

impl Default for BootConfig {
    fn default() -> Self {
        BootConfig {
            control: ControlConfig::default(),
            energy_budget: DEFAULT_ENERGY_BUDGET,
            telemetry_path: PathBuf::from("data/telemetry.json"),
        }
    }
}

/// The running control plane: kernel pieces plus the mission processes.
pub struct System {
    /// Message hub.
    pub hub: Arc<Hub>,
    /// Region table.
    pub mm: Arc<RegionTable>,
    /// Interrupt dispatcher.
    pub irq: Arc<IrqDispatcher>,
    /// Process scheduler.
    pub scheduler: Scheduler,
    /// Heartbeat watchdog.
    pub watchdog: Watchdog,
    /// Flight control service.
    pub flight: Arc<FlightControl>,
    /// Navigation service.
    pub nav: Arc<Navigation>,
    /// Camera driver.
    pub camera: Arc<CameraDriver>,
    /// NPU driver.
    pub npu: Arc<NpuDriver>,
    /// Propulsion driver.
    pub thruster: Arc<PropulsionDriver>,
    /// Composition analyzer.
    pub spectrometer: Arc<CompositionAnalyzer>,
    /// Energy manager.
    pub energy: Arc<EnergyManager>,
    /// Telemetry store.
    pub telemetry: Arc<TelemetryStore>,
}

/// Brings the whole control plane up: regions, services, drivers, watches,
/// interrupt lines, and both background loops.
pub fn boot(config: BootConfig) -> anyhow::Result<System> {
    let hub = Arc::new(Hub::new());
    let mm = Arc::new(RegionTable::new());
    let irq = Arc::new(IrqDispatcher::new());
    let scheduler = Scheduler::new();

    mm.allocate(flightd::NAME, 0x1000);
    mm.allocate(navd::NAME, 0x1000);
    mm.allocate(camera::NAME, 0x0800);
    mm.allocate(npu::NAME, 0x0800);
    mm.allocate(thruster::NAME, 0x0800);
    mm.allocate(specd::NAME, 0x0400);

    let telemetry =
        TelemetryStore::spawn(Arc::clone(&hub), Arc::clone(&mm), &config.telemetry_path)
            .with_context(|| {
                format!("open telemetry store at {}", config.telemetry_path.display())
            })?;
    let energy = EnergyManager::spawn(Arc::clone(&hub), config.energy_budget, ENERGY_WARN_RATIO);
    let flight = FlightControl::spawn(Arc::clone(&hub));
    let nav = Navigation::spawn(Arc::clone(&hub));
    let cam = CameraDriver::spawn(Arc::clone(&hub), Arc::clone(&irq), IRQ_CAMERA);
    let npu_drv = NpuDriver::spawn(Arc::clone(&hub));
    let thr = PropulsionDriver::spawn(Arc::clone(&hub), Arc::clone(&irq), IRQ_THRUSTER);
    let spectrometer = CompositionAnalyzer::spawn(Arc::clone(&hub));

    let watchdog = Watchdog::new(Arc::clone(&hub), config.control.heartbeat_timeout());
    for name in [
        flightd::NAME,
        navd::NAME,
        camera::NAME,
        npu::NAME,
        thruster::NAME,
        specd::NAME,
    ] {
        watchdog.watch(name);
    }
    register_restarts(&watchdog, &hub, &irq, &scheduler);
    bind_interrupts(&irq, &hub);

    let initial = vec![
        ProcessDescriptor::for_process(&flight),
        ProcessDescriptor::for_process(&nav),
        ProcessDescriptor::for_process(&cam),
        ProcessDescriptor::for_process(&npu_drv),
        ProcessDescriptor::for_process(&thr),
        ProcessDescriptor::for_process(&spectrometer),
    ];
    scheduler
        .start(initial, config.control.tick())
        .context("start scheduler loop")?;
    watchdog
        .start(config.control.poll_interval())
        .context("start watchdog loop")?;
    log::info!("corvus-init: control plane up, 6 processes scheduled");

    Ok(System {
        hub,
        mm,
        irq,
        scheduler,
        watchdog,
        flight,
        nav,
        camera: cam,
        npu: npu_drv,
        thruster: thr,
        spectrometer,
        energy,
        telemetry,
    })
}

/// Every watched process gets a strategy that spawns a replacement instance
/// (re-registering its hub handler) and schedules it.
fn register_restarts(
    watchdog: &Watchdog,
    hub: &Arc<Hub>,
    irq: &Arc<IrqDispatcher>,
    scheduler: &Scheduler,
) {
    {
        let hub = Arc::clone(hub);
        let scheduler = scheduler.clone();
        watchdog.register_restart(
            flightd::NAME,
            Arc::new(move || {
                let fresh = FlightControl::spawn(Arc::clone(&hub));
                scheduler.submit(ProcessDescriptor::for_process(&fresh));
            }),
        );
    }
    {
        let hub = Arc::clone(hub);
        let scheduler = scheduler.clone();
        watchdog.register_restart(
            navd::NAME,
            Arc::new(move || {
                let fresh = Navigation::spawn(Arc::clone(&hub));
                scheduler.submit(ProcessDescriptor::for_process(&fresh));
            }),
        );
    }
    {
        let hub = Arc::clone(hub);
        let irq = Arc::clone(irq);
        let scheduler = scheduler.clone();
        watchdog.register_restart(
            camera::NAME,
            Arc::new(move || {
                let fresh = CameraDriver::spawn(Arc::clone(&hub), Arc::clone(&irq), IRQ_CAMERA);
                scheduler.submit(ProcessDescriptor::for_process(&fresh));
            }),
        );
    }
    {
        let hub = Arc::clone(hub);
        let scheduler = scheduler.clone();
        watchdog.register_restart(
            npu::NAME,
            Arc::new(move || {
                let fresh = NpuDriver::spawn(Arc::clone(&hub));
                scheduler.submit(ProcessDescriptor::for_process(&fresh));
            }),
        );
    }
    {
        let hub = Arc::clone(hub);
        let irq = Arc::clone(irq);
        let scheduler = scheduler.clone();
        watchdog.register_restart(
            thruster::NAME,
            Arc::new(move || {
                let fresh =
                    PropulsionDriver::spawn(Arc::clone(&hub), Arc::clone(&irq), IRQ_THRUSTER);
                scheduler.submit(ProcessDescriptor::for_process(&fresh));
            }),
        );
    }
    {
        let hub = Arc::clone(hub);
        let scheduler = scheduler.clone();
        watchdog.register_restart(
            specd::NAME,
            Arc::new(move || {
                let fresh = CompositionAnalyzer::spawn(Arc::clone(&hub));
                scheduler.submit(ProcessDescriptor::for_process(&fresh));
            }),
        );
    }
}

/// Device interrupts are re-injected over IPC with the `"irq"` sender, the
/// way the drivers expect them.
fn bind_interrupts(irq: &Arc<IrqDispatcher>, hub: &Arc<Hub>) {
    let relay = Arc::clone(hub);
    irq.bind(
        IRQ_CAMERA,
        camera::NAME,
        Arc::new(move |data| relay.send(IRQ_SENDER, camera::NAME, data)),
    );
    let relay = Arc::clone(hub);
    irq.bind(
        IRQ_THRUSTER,
        thruster::NAME,
        Arc::new(move |data| relay.send(IRQ_SENDER, thruster::NAME, data)),
    );
}

/// One region row in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    /// Owning process.
    pub owner: String,
    /// Region base address.
    pub base: u64,
    /// Region size in bytes.
    pub size: u64,
}

/// Point-in-time view of the whole control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Capture wall-clock time, milliseconds since the epoch.
    pub captured_at_ms: u64,
    /// Scheduled processes.
    pub processes: Vec<ProcessSnapshot>,
    /// Watchdog entries.
    pub watched: Vec<WatchSnapshot>,
    /// Region table rows.
    pub regions: Vec<RegionSnapshot>,
    /// Undeliverable messages currently parked.
    pub pending: usize,
}

impl System {
    /// Assembles a snapshot of the scheduler, watchdog, region table and
    /// pending queue.
    pub fn snapshot(&self) -> SystemSnapshot {
        let captured_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        SystemSnapshot {
            captured_at_ms,
            processes: self.scheduler.processes(),
            watched: self.watchdog.watched(),
            regions: self
                .mm
                .regions()
                .into_iter()
                .map(|(owner, region)| RegionSnapshot {
                    owner,
                    base: region.base,
                    size: region.size,
                })
                .collect(),
            pending: self.hub.pending_len(),
        }
    }

    /// Writes the snapshot as JSON, temp file plus rename so readers never
    /// see a partial file.
    pub fn write_snapshot(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot = self.snapshot();
        let encoded = serde_json::to_vec_pretty(&snapshot).context("encode snapshot")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &encoded).with_context(|| format!("write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("rename into {}", path.display()))?;
        Ok(())
    }

    /// Stops the watchdog, then the scheduler. Safe to call twice.
    pub fn shutdown(&self) {
        self.watchdog.shutdown();
        self.scheduler.shutdown();
        log::debug!("corvus-init: control plane down");
    }
}

impl Drop for System {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Scripted demo flight parameters.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Cycles to fly.
    pub cycles: u32,
    /// Pause between cycles.
    pub delay: Duration,
    /// Jam the camera at this cycle, if set.
    pub fail_at: Option<u32>,
    /// Seed for the event dice.
    pub seed: u64,
    /// Snapshot file rewritten every cycle, if set.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig {
            cycles: 10,
            delay: Duration::from_millis(200),
            fail_at: None,
            seed: 7,
            snapshot_path: None,
        }
    }
}

/// Flies the scripted mission: each cycle rolls seeded dice for ground
/// commands, optionally jams the camera, then sleeps and snapshots.
pub fn run_demo(system: &System, demo: &DemoConfig) -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(demo.seed);
    log::info!(
        "corvus-init: demo flight, {} cycles, seed {}",
        demo.cycles,
        demo.seed
    );
    for cycle in 1..=demo.cycles {
        if rng.gen_bool(0.6) {
            let delta_v: f64 = rng.gen_range(0.5..5.0);
            system.hub.send(
                GROUND,
                flightd::NAME,
                json!({"action": "adjust_course", "delta_v": delta_v}),
            );
        }
        if rng.gen_bool(0.4) {
            system
                .hub
                .send(GROUND, navd::NAME, json!({"action": "recalculate_route"}));
        }
        if rng.gen_bool(0.7) {
            system
                .hub
                .send(GROUND, camera::NAME, json!({"action": "capture"}));
        }
        if rng.gen_bool(0.5) {
            system
                .hub
                .send(GROUND, specd::NAME, json!({"action": "analyze"}));
        }
        if rng.gen_bool(0.3) {
            let thrust: f64 = rng.gen_range(0.5..3.0);
            system.hub.send(
                GROUND,
                thruster::NAME,
                json!({"action": "burn", "thrust": thrust, "duration_ms": 100}),
            );
        }
        if demo.fail_at == Some(cycle) {
            log::warn!("corvus-init: injecting camera fault at cycle {cycle}");
            system.camera.jam();
        }
        std::thread::sleep(demo.delay);
        if let Some(path) = &demo.snapshot_path {
            system.write_snapshot(path)?;
        }
    }
    let parked = system.hub.drain_pending();
    if !parked.is_empty() {
        log::warn!(
            "corvus-init: {} undeliverable messages at demo end",
            parked.len()
        );
    }
    Ok(())
}
