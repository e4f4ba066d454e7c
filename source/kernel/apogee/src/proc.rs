// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process model shared by the scheduler and the collaborators.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ipc::Message;

/// Scheduling priority. Lower level runs first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    /// Flight-critical work, always ahead of everything else.
    pub const CRITICAL: Priority = Priority(1);
    /// Navigation and course planning.
    pub const HIGH: Priority = Priority(2);
    /// Instrument drivers.
    pub const NORMAL: Priority = Priority(3);
    /// Background analysis.
    pub const LOW: Priority = Priority(4);

    /// Wraps a raw priority level.
    pub const fn new(level: u8) -> Self {
        Priority(level)
    }

    /// Raw level, lower means more urgent.
    pub const fn level(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// A mission collaborator the scheduler can drive.
///
/// `run` is one cooperative slice; the scheduler re-queues the descriptor
/// afterwards. `receive` is invoked synchronously on the sender's thread by
/// the IPC hub.
pub trait Process: Send + Sync {
    /// Stable name the process registers under.
    fn name(&self) -> &str;
    /// Scheduling priority.
    fn priority(&self) -> Priority;
    /// One cooperative work slice.
    fn run(&self);
    /// Synchronous message delivery.
    fn receive(&self, msg: Message);
}

/// Work closure executed for one scheduler slice.
pub type Entry = Arc<dyn Fn() + Send + Sync>;

/// What the scheduler queues: a name, a priority, and the entry closure.
#[derive(Clone)]
pub struct ProcessDescriptor {
    /// Process name, also the IPC registration key.
    pub name: String,
    /// Scheduling priority.
    pub priority: Priority,
    /// Slice closure, re-run every time the descriptor reaches the front.
    pub entry: Entry,
}

impl ProcessDescriptor {
    /// Builds a descriptor from parts.
    pub fn new(name: impl Into<String>, priority: Priority, entry: Entry) -> Self {
        ProcessDescriptor {
            name: name.into(),
            priority,
            entry,
        }
    }

    /// Descriptor whose slice calls [`Process::run`] on a shared collaborator.
    pub fn for_process<P: Process + 'static>(process: &Arc<P>) -> Self {
        let runner = Arc::clone(process);
        ProcessDescriptor {
            name: process.name().to_string(),
            priority: process.priority(),
            entry: Arc::new(move || runner.run()),
        }
    }
}

impl fmt::Debug for ProcessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Where a process currently sits from the scheduler's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// Queued, waiting for a slice.
    Ready,
    /// Currently holding the loop thread.
    Running,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Ready => f.write_str("ready"),
            ProcessState::Running => f.write_str("running"),
        }
    }
}

/// Point-in-time view of one scheduled process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    /// Process name.
    pub name: String,
    /// Scheduling priority.
    pub priority: Priority,
    /// Ready or running.
    pub state: ProcessState,
    /// Completed slices so far.
    pub runs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_by_level() {
        assert!(Priority::CRITICAL < Priority::HIGH);
        assert!(Priority::HIGH < Priority::NORMAL);
        assert!(Priority::NORMAL < Priority::LOW);
        assert_eq!(Priority::new(3), Priority::NORMAL);
    }

    #[test]
    fn priority_displays_level() {
        assert_eq!(Priority::CRITICAL.to_string(), "P1");
        assert_eq!(Priority::new(9).to_string(), "P9");
    }

    #[test]
    fn priority_serializes_transparently() {
        let encoded = serde_json::to_string(&Priority::HIGH).expect("encode priority");
        assert_eq!(encoded, "2");
        let decoded: Priority = serde_json::from_str("4").expect("decode priority");
        assert_eq!(decoded, Priority::LOW);
    }

    #[test]
    fn descriptor_for_process_runs_the_collaborator() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct Counter {
            ticks: AtomicU32,
        }

        impl Process for Counter {
            fn name(&self) -> &str {
                "counter"
            }
            fn priority(&self) -> Priority {
                Priority::NORMAL
            }
            fn run(&self) {
                self.ticks.fetch_add(1, Ordering::SeqCst);
            }
            fn receive(&self, _msg: Message) {}
        }

        let counter = Arc::new(Counter {
            ticks: AtomicU32::new(0),
        });
        let descriptor = ProcessDescriptor::for_process(&counter);
        assert_eq!(descriptor.name, "counter");
        assert_eq!(descriptor.priority, Priority::NORMAL);
        (descriptor.entry)();
        (descriptor.entry)();
        assert_eq!(counter.ticks.load(Ordering::SeqCst), 2);
    }
}
