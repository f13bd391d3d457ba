//! Dispatch event system for observability.
//!
//! Emits [`DispatchEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! observers (loggers, metrics collectors, audit sinks) can follow dispatch
//! progress without coupling to the dispatcher.

use serde::{Deserialize, Serialize};

/// Events emitted while an event is routed to plugins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DispatchEvent {
    DispatchStarted {
        dispatch_id: String,
        event: String,
        plugins: Vec<String>,
    },
    PluginStarted {
        dispatch_id: String,
        plugin: String,
    },
    PluginCompleted {
        dispatch_id: String,
        plugin: String,
        actions: usize,
        duration_ms: u64,
    },
    PluginFailed {
        dispatch_id: String,
        plugin: String,
        error: String,
    },
    DispatchCompleted {
        dispatch_id: String,
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<DispatchEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Events sent while nobody is subscribed are dropped.
    pub fn emit(&self, event: DispatchEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
