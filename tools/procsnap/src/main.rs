// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Operator console: renders a control-plane snapshot written by corvus-init
//! as a human-readable process table.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use corvus_init::SystemSnapshot;

#[derive(Debug, Parser)]
#[command(name = "procsnap", about = "Render a Corvus-1 control plane snapshot")]
struct Args {
    /// Snapshot JSON written by corvus-init.
    snapshot: PathBuf,

    /// Re-read and re-render every this many milliseconds.
    #[arg(long)]
    watch: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    loop {
        let raw = fs::read_to_string(&args.snapshot)
            .with_context(|| format!("read snapshot {}", args.snapshot.display()))?;
        let snapshot: SystemSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parse snapshot {}", args.snapshot.display()))?;
        println!("{}", render(&snapshot));
        match args.watch {
            Some(ms) => std::thread::sleep(Duration::from_millis(ms)),
            None => break,
        }
    }
    Ok(())
}

fn render(snapshot: &SystemSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "corvus-1 control plane @ {} ms", snapshot.captured_at_ms);

    let _ = writeln!(out, "\n  {:<10} {:<4} {:<8} {:>6}", "PROCESS", "PRI", "STATE", "RUNS");
    for process in &snapshot.processes {
        let _ = writeln!(
            out,
            "  {:<10} {:<4} {:<8} {:>6}",
            process.name,
            process.priority.to_string(),
            process.state.to_string(),
            process.runs
        );
    }

    let _ = writeln!(out, "\n  {:<10} {:<6} {:>8} {:>10}", "WATCHED", "ALIVE", "RESTARTS", "LAST-HB");
    for watch in &snapshot.watched {
        let _ = writeln!(
            out,
            "  {:<10} {:<6} {:>8} {:>7} ms",
            watch.name,
            if watch.alive { "yes" } else { "no" },
            watch.restarts,
            watch.since_heartbeat_ms
        );
    }

    let _ = writeln!(out, "\n  {:<10} {:>8} {:>8}", "REGION", "BASE", "SIZE");
    for region in &snapshot.regions {
        let _ = writeln!(
            out,
            "  {:<10} {:>#8x} {:>#8x}",
            region.owner, region.base, region.size
        );
    }

    let _ = writeln!(out, "\npending messages: {}", snapshot.pending);
    out
}
