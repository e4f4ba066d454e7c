// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Priority scheduler with a cooperative run loop.
//!
//! Ready work sits in a binary heap ordered by priority, then by submission
//! sequence, so equal-priority processes keep FIFO order. The loop drains
//! everything ready into a cycle, runs one slice per tick in that order, and
//! re-queues each descriptor for the next cycle, so a high-priority process
//! leads every rotation without starving the rest. A slice that panics is
//! logged and the descriptor still rejoins the queue.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::proc::{Priority, ProcessDescriptor, ProcessSnapshot, ProcessState};
use crate::{Error, Result};

/// One queued slice: the descriptor plus its heap position metadata.
struct Slot {
    seq: u64,
    runs: u64,
    descriptor: ProcessDescriptor,
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed so the max-heap pops the lowest (priority, seq) first.
        other
            .descriptor
            .priority
            .cmp(&self.descriptor.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Slot {}

#[derive(Clone)]
struct RunningSlot {
    name: String,
    priority: Priority,
    runs: u64,
}

struct LoopState {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    ready: Mutex<BinaryHeap<Slot>>,
    cycle: Mutex<VecDeque<Slot>>,
    seq: AtomicU64,
    current: Mutex<Option<RunningSlot>>,
    running: Mutex<Option<LoopState>>,
}

impl Inner {
    fn submit_slot(&self, descriptor: ProcessDescriptor, runs: u64) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.ready.lock().push(Slot {
            seq,
            runs,
            descriptor,
        });
    }

    fn pop(&self) -> Option<Slot> {
        self.ready.lock().pop()
    }

    /// Moves everything currently ready into the cycle, in pop order.
    /// Returns false when there was nothing to move.
    fn refill_cycle(&self) -> bool {
        let mut batch = Vec::new();
        {
            let mut ready = self.ready.lock();
            while let Some(slot) = ready.pop() {
                batch.push(slot);
            }
        }
        if batch.is_empty() {
            return false;
        }
        self.cycle.lock().extend(batch);
        true
    }
}

/// Cooperative priority scheduler. Cloning yields another handle to the same
/// queue and loop.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Creates a scheduler with an empty ready queue and no loop running.
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Queues a descriptor behind all earlier submissions of the same
    /// priority. Never fails; the queue is unbounded.
    pub fn submit(&self, descriptor: ProcessDescriptor) {
        log::debug!(
            "sched: submitted '{}' at {}",
            descriptor.name,
            descriptor.priority
        );
        self.inner.submit_slot(descriptor, 0);
    }

    /// Seeds the queue with `initial` and starts the loop thread.
    ///
    /// Returns immediately; slices execute on the loop thread every `tick`.
    /// Fails if the loop is already running.
    pub fn start(&self, initial: Vec<ProcessDescriptor>, tick: Duration) -> Result<()> {
        let mut running = self.inner.running.lock();
        if running.is_some() {
            return Err(Error::AlreadyRunning("scheduler"));
        }
        for descriptor in initial {
            self.submit(descriptor);
        }
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let inner = Arc::clone(&self.inner);
        let join = std::thread::Builder::new()
            .name("apogee-sched".into())
            .spawn(move || run_loop(&inner, &stop_rx, tick))
            .map_err(|source| Error::Spawn {
                name: "scheduler",
                source,
            })?;
        *running = Some(LoopState { stop_tx, join });
        log::info!("sched: loop started, tick {tick:?}");
        Ok(())
    }

    /// Stops the loop thread and waits for it to exit. Safe to call twice;
    /// the second call is a no-op.
    pub fn shutdown(&self) {
        let state = self.inner.running.lock().take();
        let Some(LoopState { stop_tx, join }) = state else {
            return;
        };
        drop(stop_tx);
        if join.join().is_err() {
            log::error!("sched: loop thread panicked during shutdown");
        }
        log::info!("sched: loop stopped");
    }

    /// Point-in-time view of every queued or running process, sorted by
    /// priority then name.
    pub fn processes(&self) -> Vec<ProcessSnapshot> {
        let mut snapshots = Vec::new();
        if let Some(current) = self.inner.current.lock().clone() {
            snapshots.push(ProcessSnapshot {
                name: current.name,
                priority: current.priority,
                state: ProcessState::Running,
                runs: current.runs,
            });
        }
        {
            let cycle = self.inner.cycle.lock();
            for slot in cycle.iter() {
                snapshots.push(ProcessSnapshot {
                    name: slot.descriptor.name.clone(),
                    priority: slot.descriptor.priority,
                    state: ProcessState::Ready,
                    runs: slot.runs,
                });
            }
        }
        {
            let ready = self.inner.ready.lock();
            for slot in ready.iter() {
                snapshots.push(ProcessSnapshot {
                    name: slot.descriptor.name.clone(),
                    priority: slot.descriptor.priority,
                    state: ProcessState::Ready,
                    runs: slot.runs,
                });
            }
        }
        snapshots.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        snapshots
    }
}

fn run_loop(inner: &Arc<Inner>, stop_rx: &Receiver<()>, tick: Duration) {
    loop {
        let next = inner.cycle.lock().pop_front();
        let Some(slot) = next else {
            if !inner.refill_cycle() {
                // Nothing ready; idle one tick, still watching for shutdown.
                match stop_rx.recv_timeout(tick) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }
            continue;
        };

        *inner.current.lock() = Some(RunningSlot {
            name: slot.descriptor.name.clone(),
            priority: slot.descriptor.priority,
            runs: slot.runs,
        });

        let entry = Arc::clone(&slot.descriptor.entry);
        if catch_unwind(AssertUnwindSafe(|| entry())).is_err() {
            log::error!("sched: process '{}' crashed, restarting", slot.descriptor.name);
        }

        *inner.current.lock() = None;
        // Back into the ready set; runs again next cycle.
        inner.submit_slot(slot.descriptor, slot.runs + 1);

        match stop_rx.recv_timeout(tick) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}
