// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Synchronous message hub.
//!
//! Delivery happens on the sender's thread: `send` to a registered receiver
//! invokes that receiver's handler before returning. Messages for unknown
//! receivers land in a pending queue that is never redelivered automatically;
//! callers inspect it through [`Hub::drain_pending`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handler invoked synchronously for each delivered message.
pub type Handler = Arc<dyn Fn(Message) + Send + Sync>;

/// One routed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Sender name.
    pub from: String,
    /// Receiver name.
    pub to: String,
    /// Free-form JSON payload.
    pub payload: Value,
}

impl Message {
    /// Builds a message addressed from `from` to `to`.
    pub fn new(from: impl Into<String>, to: impl Into<String>, payload: Value) -> Self {
        Message {
            from: from.into(),
            to: to.into(),
            payload,
        }
    }
}

/// Name-keyed handler registry with a queue for undeliverable messages.
#[derive(Default)]
pub struct Hub {
    handlers: Mutex<HashMap<String, Handler>>,
    pending: Mutex<Vec<Message>>,
}

impl Hub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Hub::default()
    }

    /// Registers `handler` under `name`, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>, handler: Handler) {
        let name = name.into();
        log::debug!("ipc: registered '{name}'");
        self.handlers.lock().insert(name, handler);
    }

    /// Delivers `payload` to `to` on the calling thread.
    ///
    /// Unknown receivers get the message parked in the pending queue instead.
    /// The registry lock is released before the handler runs, so handlers may
    /// call back into the hub.
    pub fn send(&self, from: &str, to: &str, payload: Value) {
        let message = Message::new(from, to, payload);
        let handler = self.handlers.lock().get(to).cloned();
        match handler {
            Some(handler) => handler(message),
            None => {
                log::debug!("ipc: no receiver '{to}', queueing message from '{from}'");
                self.pending.lock().push(message);
            }
        }
    }

    /// Delivers `payload` to every registered receiver except `from`.
    ///
    /// Delivery order between receivers is unspecified.
    pub fn broadcast(&self, from: &str, payload: Value) {
        let targets: Vec<(String, Handler)> = {
            let handlers = self.handlers.lock();
            handlers
                .iter()
                .filter(|(name, _)| name.as_str() != from)
                .map(|(name, handler)| (name.clone(), Arc::clone(handler)))
                .collect()
        };
        for (name, handler) in targets {
            handler(Message::new(from, name, payload.clone()));
        }
    }

    /// Number of parked messages.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Removes and returns all parked messages in arrival order.
    pub fn drain_pending(&self) -> Vec<Message> {
        self.pending.lock().drain(..).collect()
    }
}
