// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection lifecycle events and framework hooks.
//!
//! Each [`InterfaceEvent`] is delivered two ways:
//!
//! - to weakly held [`EventListener`]s, synchronously and in registration
//!   order, from the host context;
//! - to every `tokio::sync::broadcast` receiver obtained from
//!   [`EventHub::subscribe`].
//!
//! [`InterfaceHook`] is the single optional observer a hosting framework
//! installs to mirror connection status and react to finished imports.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::catalog::NodeCatalog;

/// Capacity of the broadcast channel.
const BROADCAST_CAPACITY: usize = 64;

// =============================================================================
// InterfaceEvent
// =============================================================================

/// Connection lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceEvent {
    /// A connect attempt succeeded.
    Connected,
    /// The session was torn down.
    Disconnected,
    /// A connect succeeded after the server had closed the connection.
    Reconnected,
}

impl InterfaceEvent {
    /// Returns the event name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnected => "reconnected",
        }
    }
}

impl fmt::Display for InterfaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Observers
// =============================================================================

/// Receives connection lifecycle events.
pub trait EventListener: Send + Sync {
    /// Called once per event.
    fn on_event(&self, event: InterfaceEvent);
}

/// Framework integration points.
///
/// Both methods default to no-ops.
pub trait InterfaceHook: Send + Sync {
    /// Called whenever the connected status flips.
    fn on_connection_changed(&self, _connected: bool) {}

    /// Called after an import finished.
    fn on_nodes_imported(&self, _catalog: &NodeCatalog) {}
}

/// Identifies an event listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// =============================================================================
// EventHub
// =============================================================================

/// Fan-out of lifecycle events.
pub struct EventHub {
    listeners: RwLock<Vec<(ListenerId, Weak<dyn EventListener>)>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<InterfaceEvent>,
}

impl EventHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    /// Registers a listener.
    pub fn add_listener(&self, listener: Weak<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        before != listeners.len()
    }

    /// Returns a new broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<InterfaceEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .count()
    }

    /// Delivers an event to listeners and broadcast receivers.
    pub fn emit(&self, event: InterfaceEvent) {
        tracing::debug!(event = %event, "Interface event");

        let live: Vec<_> = {
            let mut listeners = self.listeners.write();
            listeners.retain(|(_, w)| w.strong_count() > 0);
            listeners.iter().filter_map(|(_, w)| w.upgrade()).collect()
        };
        for listener in live {
            listener.on_event(event);
        }

        // No receivers is not an error.
        let _ = self.sender.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

// =============================================================================
// CollectorListener
// =============================================================================

/// Listener that records events in memory (useful for testing).
#[derive(Debug, Default)]
pub struct CollectorListener {
    events: RwLock<Vec<InterfaceEvent>>,
}

impl CollectorListener {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events.
    pub fn events(&self) -> Vec<InterfaceEvent> {
        self.events.read().clone()
    }

    /// Returns how often `event` was recorded.
    pub fn count(&self, event: InterfaceEvent) -> usize {
        self.events.read().iter().filter(|e| **e == event).count()
    }

    /// Clears the recorded events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventListener for CollectorListener {
    fn on_event(&self, event: InterfaceEvent) {
        self.events.write().push(event);
    }
}
