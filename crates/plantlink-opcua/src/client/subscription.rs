// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription registry.
//!
//! The registry keeps exactly one monitored item per node id per
//! connection and fans each notification out to every listener of that node.
//!
//! # Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SubscriptionRegistry                         │
//! │     by_node: node id ─► client handle ─► entry (listeners)      │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │  Group 0        │ │  Group 1        │ │  Group 2        │
//! │  [h1, h2]       │ │  [h3, h4]       │ │  [h5]           │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//! ```
//!
//! A new group opens once the current one holds `max_nodes_per_subscription`
//! items (zero means a single unbounded group). Client handles count up from
//! 1 and restart whenever the registry is reset.
//!
//! Tables sit behind a `parking_lot::Mutex` so notifications can be
//! dispatched from another task. The lock is never held across an await or
//! while a listener runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::client::transport::{MonitoredItemRequest, OpcUaTransport, OpcUaValue};
use crate::config::SubscriptionSettings;
use crate::error::{OpcUaError, SubscriptionError};
use crate::types::{NodeId, StatusCode};

/// First client handle of every connection.
pub const FIRST_CLIENT_HANDLE: u32 = 1;

// =============================================================================
// Identifiers
// =============================================================================

/// Server-assigned subscription id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u32);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Server-assigned monitored item id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonitoredItemId(pub u32);

impl fmt::Display for MonitoredItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Identifies one listener registration for [`SubscriptionRegistry::unsubscribe`].
///
/// Registration ids are never reused, not even across connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

// =============================================================================
// NodeSubscription
// =============================================================================

/// Snapshot of one node's subscription entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSubscription {
    /// Subscribed node id, as given by the caller.
    pub node_id: String,
    /// Position of the owning group in creation order.
    pub group_index: usize,
    /// Server id of the owning group, `None` if its creation failed.
    pub subscription_id: Option<SubscriptionId>,
    /// Client handle routing notifications to this entry.
    pub client_handle: u32,
    /// Server monitored item id, `None` if creation failed or was skipped.
    pub monitored_item_id: Option<MonitoredItemId>,
}

/// Result of a subscribe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    /// Entry snapshot at subscribe time.
    pub subscription: NodeSubscription,
    /// The listener registration.
    pub registration: RegistrationId,
}

// =============================================================================
// Listeners
// =============================================================================

/// Receives value changes of a subscribed node.
///
/// The registry only holds a `Weak` reference; dropping the last `Arc`
/// silently ends delivery. Callbacks run outside the registry lock and may
/// come from a dispatcher task.
pub trait NodeUpdateListener: Send + Sync {
    /// Called for every notification of the subscribed node.
    fn on_value_changed(&self, subscription: &NodeSubscription, value: &OpcUaValue);
}

/// Adapts a closure into a [`NodeUpdateListener`].
pub struct FnListener<F>(F);

impl<F> FnListener<F>
where
    F: Fn(&NodeSubscription, &OpcUaValue) + Send + Sync + 'static,
{
    /// Wraps `f` into a shareable listener.
    pub fn new(f: F) -> Arc<Self> {
        Arc::new(Self(f))
    }
}

impl<F> NodeUpdateListener for FnListener<F>
where
    F: Fn(&NodeSubscription, &OpcUaValue) + Send + Sync,
{
    fn on_value_changed(&self, subscription: &NodeSubscription, value: &OpcUaValue) {
        (self.0)(subscription, value)
    }
}

// =============================================================================
// Tables
// =============================================================================

struct Entry {
    subscription: NodeSubscription,
    listeners: Vec<(RegistrationId, Weak<dyn NodeUpdateListener>)>,
}

#[derive(Debug, Default)]
struct Group {
    server_id: Option<SubscriptionId>,
    handles: Vec<u32>,
    monitored_items: Vec<MonitoredItemId>,
}

struct Tables {
    entries: HashMap<u32, Entry>,
    by_node: HashMap<String, u32>,
    groups: Vec<Group>,
    next_client_handle: u32,
}

impl Tables {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_node: HashMap::new(),
            groups: Vec::new(),
            next_client_handle: FIRST_CLIENT_HANDLE,
        }
    }

    /// Returns the index of a group with room, if any.
    fn open_group(&self, max_per_group: usize) -> Option<usize> {
        let last = self.groups.len().checked_sub(1)?;
        let full = max_per_group > 0 && self.groups[last].handles.len() >= max_per_group;
        (!full).then_some(last)
    }
}

/// Registry key of a node id: its canonical text, so every spelling of one
/// node shares an entry.
fn canonical_key(node_id: &str) -> String {
    node_id
        .parse::<NodeId>()
        .map(|id| id.to_string())
        .unwrap_or_else(|_| node_id.to_string())
}

// =============================================================================
// SubscriptionRegistry
// =============================================================================

/// Node-keyed subscription bookkeeping with listener fan-out.
pub struct SubscriptionRegistry {
    settings: SubscriptionSettings,
    max_per_group: usize,
    tables: Mutex<Tables>,
    next_registration: AtomicU64,
    stats: RegistryCounters,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new(settings: SubscriptionSettings, max_nodes_per_subscription: usize) -> Self {
        Self {
            settings,
            max_per_group: max_nodes_per_subscription,
            tables: Mutex::new(Tables::new()),
            next_registration: AtomicU64::new(1),
            stats: RegistryCounters::default(),
        }
    }

    /// Subscribes `listener` to `node_id`.
    ///
    /// A node already in the registry only gains the listener. A new node
    /// gets the next client handle and a monitored item in the current group,
    /// opening a new group first when needed. Server failures are logged and
    /// the handle is returned anyway.
    ///
    /// The caller must hold an active session.
    pub async fn subscribe<T: OpcUaTransport + ?Sized>(
        &self,
        transport: &T,
        node_id: &str,
        listener: Weak<dyn NodeUpdateListener>,
    ) -> Result<SubscriptionHandle, OpcUaError> {
        let parsed: NodeId = node_id.parse().map_err(|e: OpcUaError| {
            OpcUaError::subscription(SubscriptionError::monitored_item_failed(
                node_id,
                StatusCode::BAD_NODE_ID_INVALID,
                e.to_string(),
            ))
        })?;
        let key = parsed.to_string();
        let node_id = key.as_str();
        let registration = RegistrationId(self.next_registration.fetch_add(1, Ordering::Relaxed));

        if let Some(handle) = self.attach(node_id, registration, &listener) {
            tracing::trace!(node_id, client_handle = handle.subscription.client_handle, "Added listener");
            return Ok(handle);
        }

        let needs_group = self.tables.lock().open_group(self.max_per_group).is_none();
        if needs_group {
            let server_id = match transport.create_subscription(&self.settings).await {
                Ok(id) => {
                    tracing::debug!(subscription_id = id, "Created subscription group");
                    Some(SubscriptionId(id))
                }
                Err(e) => {
                    e.log("create subscription (server may have reached its maximum)");
                    None
                }
            };
            self.tables.lock().groups.push(Group {
                server_id,
                ..Group::default()
            });
        }

        let snapshot = {
            let mut tables = self.tables.lock();
            let group_index = tables.groups.len() - 1;
            let client_handle = tables.next_client_handle;
            tables.next_client_handle += 1;

            let group = &mut tables.groups[group_index];
            group.handles.push(client_handle);
            let subscription = NodeSubscription {
                node_id: node_id.to_string(),
                group_index,
                subscription_id: group.server_id,
                client_handle,
                monitored_item_id: None,
            };

            tables.by_node.insert(node_id.to_string(), client_handle);
            tables.entries.insert(
                client_handle,
                Entry {
                    subscription: subscription.clone(),
                    listeners: vec![(registration, listener)],
                },
            );
            subscription
        };

        let Some(subscription_id) = snapshot.subscription_id else {
            tracing::warn!(
                node_id,
                group = snapshot.group_index,
                "Subscription group has no server id, monitored item skipped"
            );
            return Ok(SubscriptionHandle {
                subscription: snapshot,
                registration,
            });
        };

        let request = MonitoredItemRequest {
            node_id: parsed,
            client_handle: snapshot.client_handle,
            sampling_interval: self.settings.sampling_interval,
            queue_size: self.settings.queue_size,
            discard_oldest: self.settings.discard_oldest,
        };

        let item_id = match transport.create_monitored_item(subscription_id.0, &request).await {
            Ok(result) if result.status.is_good() => Some(MonitoredItemId(result.monitored_item_id)),
            Ok(result) => {
                OpcUaError::subscription(SubscriptionError::monitored_item_failed(
                    node_id,
                    result.status,
                    "server rejected monitored item",
                ))
                .log("subscribe");
                None
            }
            Err(e) => {
                e.log("subscribe");
                None
            }
        };

        let subscription = {
            let mut tables = self.tables.lock();
            if let Some(id) = item_id {
                if let Some(group) = tables.groups.get_mut(snapshot.group_index) {
                    group.monitored_items.push(id);
                }
            }
            match tables.entries.get_mut(&snapshot.client_handle) {
                Some(entry) => {
                    entry.subscription.monitored_item_id = item_id;
                    entry.subscription.clone()
                }
                None => NodeSubscription {
                    monitored_item_id: item_id,
                    ..snapshot
                },
            }
        };

        tracing::debug!(
            node_id,
            client_handle = subscription.client_handle,
            subscription_id = ?subscription.subscription_id.map(|s| s.0),
            "Subscribed node"
        );

        Ok(SubscriptionHandle {
            subscription,
            registration,
        })
    }

    fn attach(
        &self,
        node_id: &str,
        registration: RegistrationId,
        listener: &Weak<dyn NodeUpdateListener>,
    ) -> Option<SubscriptionHandle> {
        let mut tables = self.tables.lock();
        let handle = *tables.by_node.get(node_id)?;
        let entry = tables.entries.get_mut(&handle)?;
        entry.listeners.push((registration, listener.clone()));
        Some(SubscriptionHandle {
            subscription: entry.subscription.clone(),
            registration,
        })
    }

    /// Removes one listener registration. The monitored item stays until the
    /// registry is torn down.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut tables = self.tables.lock();
        let Some(&client_handle) = tables.by_node.get(&handle.subscription.node_id) else {
            return false;
        };
        let Some(entry) = tables.entries.get_mut(&client_handle) else {
            return false;
        };
        let before = entry.listeners.len();
        entry.listeners.retain(|(id, _)| *id != handle.registration);
        before != entry.listeners.len()
    }

    /// Delivers a notification to every live listener of `client_handle`.
    ///
    /// Returns the entry snapshot, or `None` for an unknown handle.
    pub fn dispatch(&self, client_handle: u32, value: &OpcUaValue) -> Option<NodeSubscription> {
        let (subscription, listeners) = {
            let mut tables = self.tables.lock();
            let Some(entry) = tables.entries.get_mut(&client_handle) else {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(client_handle, "Notification for unknown client handle dropped");
                return None;
            };
            let mut live = Vec::with_capacity(entry.listeners.len());
            entry.listeners.retain(|(_, weak)| match weak.upgrade() {
                Some(listener) => {
                    live.push(listener);
                    true
                }
                None => false,
            });
            (entry.subscription.clone(), live)
        };

        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            node_id = %subscription.node_id,
            listeners = listeners.len(),
            value = %value,
            "Dispatching value change"
        );
        for listener in &listeners {
            listener.on_value_changed(&subscription, value);
        }
        Some(subscription)
    }

    /// Deletes every group on the server and empties the tables.
    ///
    /// Groups are torn down in creation order, items before their
    /// subscription. Failures are logged and the teardown continues.
    pub async fn teardown<T: OpcUaTransport + ?Sized>(&self, transport: &T) {
        let groups = {
            let mut tables = self.tables.lock();
            std::mem::replace(&mut *tables, Tables::new()).groups
        };

        for group in groups {
            let Some(subscription_id) = group.server_id else {
                continue;
            };
            if !group.monitored_items.is_empty() {
                let ids: Vec<u32> = group.monitored_items.iter().map(|i| i.0).collect();
                if let Err(e) = transport.delete_monitored_items(subscription_id.0, &ids).await {
                    tracing::debug!(subscription_id = subscription_id.0, error = %e, "Deleting monitored items failed");
                }
            }
            if let Err(e) = transport.delete_subscription(subscription_id.0).await {
                tracing::debug!(subscription_id = subscription_id.0, error = %e, "Deleting subscription failed");
            }
        }
    }

    /// Empties the tables without contacting the server.
    pub fn reset(&self) {
        *self.tables.lock() = Tables::new();
    }

    /// Returns the entry of `node_id`.
    pub fn get(&self, node_id: &str) -> Option<NodeSubscription> {
        let key = canonical_key(node_id);
        let tables = self.tables.lock();
        let handle = tables.by_node.get(&key)?;
        tables.entries.get(handle).map(|e| e.subscription.clone())
    }

    /// Returns the number of live listeners of `node_id`.
    pub fn listener_count(&self, node_id: &str) -> usize {
        let key = canonical_key(node_id);
        let tables = self.tables.lock();
        tables
            .by_node
            .get(&key)
            .and_then(|h| tables.entries.get(h))
            .map(|e| e.listeners.iter().filter(|(_, w)| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Returns the item count of every group in creation order.
    pub fn group_sizes(&self) -> Vec<usize> {
        self.tables.lock().groups.iter().map(|g| g.handles.len()).collect()
    }

    /// Returns the client handle the next new node will get.
    pub fn next_client_handle(&self) -> u32 {
        self.tables.lock().next_client_handle
    }

    /// Returns `true` if no node is subscribed.
    pub fn is_empty(&self) -> bool {
        self.tables.lock().entries.is_empty()
    }

    /// Returns a statistics snapshot.
    pub fn stats(&self) -> RegistryStats {
        let tables = self.tables.lock();
        RegistryStats {
            groups: tables.groups.len(),
            subscribing_nodes: tables.entries.len(),
            dispatched: self.stats.dispatched.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("SubscriptionRegistry")
            .field("groups", &stats.groups)
            .field("subscribing_nodes", &stats.subscribing_nodes)
            .field("max_per_group", &self.max_per_group)
            .finish()
    }
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct RegistryCounters {
    dispatched: AtomicU64,
    dropped: AtomicU64,
}

/// Registry statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Subscription groups created on this connection.
    pub groups: usize,
    /// Nodes with a registry entry.
    pub subscribing_nodes: usize,
    /// Notifications delivered to an entry.
    pub dispatched: u64,
    /// Notifications dropped for an unknown handle.
    pub dropped: u64,
}

// =============================================================================
// Tests
// =============================================================================
