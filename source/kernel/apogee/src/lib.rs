// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Control-plane kernel for the Corvus-1 spacecraft simulation.
//!
//! The crate hosts the five pieces every mission process depends on: the
//! priority [`sched::Scheduler`], the synchronous [`ipc::Hub`], the
//! [`mm::RegionTable`] emulating isolation, the [`irq::IrqDispatcher`], and
//! the heartbeat-driven [`health::Watchdog`]. Everything above this layer is
//! an ordinary collaborator implementing [`proc::Process`].
//!
//! Both background loops (scheduler tick, watchdog sweep) observe a stop
//! channel between ticks so tests can tear the plane down deterministically.

#![forbid(unsafe_code)]

pub mod config;
pub mod health;
pub mod ipc;
pub mod irq;
pub mod mm;
pub mod proc;
pub mod sched;

pub use health::Watchdog;
pub use ipc::{Hub, Message};
pub use irq::IrqDispatcher;
pub use mm::RegionTable;
pub use proc::{Priority, Process, ProcessDescriptor};
pub use sched::Scheduler;

/// Result alias for control-plane operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors produced while managing the control-plane loops.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The loop was started a second time without a shutdown in between.
    #[error("{0} loop already running")]
    AlreadyRunning(&'static str),
    /// Spawning the loop thread failed.
    #[error("{name} loop thread spawn failed: {source}")]
    Spawn {
        /// Which loop could not be spawned.
        name: &'static str,
        /// Reason reported by the thread builder.
        source: std::io::Error,
    },
}
