// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Interrupt dispatch table.
//!
//! Lines are plain integers; binding is last-writer-wins. Firing a line runs
//! its handler synchronously on the caller's thread. The table lock is
//! released before the handler runs, so handlers may bind or fire lines
//! themselves.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// Handler invoked when an interrupt line fires.
pub type IrqHandler = Arc<dyn Fn(Value) + Send + Sync>;

struct Binding {
    device: String,
    handler: IrqHandler,
}

/// Line-keyed interrupt table.
#[derive(Default)]
pub struct IrqDispatcher {
    table: Mutex<HashMap<u32, Binding>>,
}

impl IrqDispatcher {
    /// Creates an empty table.
    pub fn new() -> Self {
        IrqDispatcher::default()
    }

    /// Binds `line` to `handler` for `device`, replacing any earlier binding.
    pub fn bind(&self, line: u32, device: impl Into<String>, handler: IrqHandler) {
        let device = device.into();
        log::debug!("irq: line {line} bound to '{device}'");
        self.table.lock().insert(line, Binding { device, handler });
    }

    /// Fires `line` synchronously. An unbound line is logged and ignored.
    pub fn fire(&self, line: u32, data: Value) {
        let binding = {
            let table = self.table.lock();
            table
                .get(&line)
                .map(|binding| (binding.device.clone(), Arc::clone(&binding.handler)))
        };
        match binding {
            Some((device, handler)) => {
                log::debug!("irq: line {line} fired for '{device}'");
                handler(data);
            }
            None => log::warn!("irq: unhandled interrupt {line}"),
        }
    }

    /// Device bound to `line`, if any.
    pub fn device(&self, line: u32) -> Option<String> {
        self.table.lock().get(&line).map(|b| b.device.clone())
    }
}
