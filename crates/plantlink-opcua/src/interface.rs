// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The host-facing OPC UA interface.
//!
//! [`OpcUaInterface`] ties the connection manager, node catalog,
//! subscription registry and value access together. Every operation takes
//! `&mut self`; the owner is the single host context.
//!
//! # Host loop
//!
//! ```text
//! loop {
//!     interface.tick().await;   // drain pushed traffic, fire events, reconnect
//!     ... host frame ...
//! }
//! ```
//!
//! Traffic pushed by the transport (data changes, connection closure)
//! arrives on a channel that is replaced at every connect and disconnect. By default [`tick`](OpcUaInterface::tick) drains it
//! and updates catalog values from data changes. After
//! [`spawn_dispatcher`](OpcUaInterface::spawn_dispatcher) a tokio task
//! dispatches data changes as they arrive instead; in that mode the catalog
//! is not updated by notifications.
//!
//! # Example
//!
//! ```rust,ignore
//! use plantlink_opcua::{InterfaceConfig, OpcUaInterface, FnListener};
//!
//! let config = InterfaceConfig::builder().server("10.0.0.5", 4840).build()?;
//! let mut interface = OpcUaInterface::new(transport, config)?;
//!
//! if interface.connect().await {
//!     interface.import_nodes().await;
//!     let listener = FnListener::new(|sub, value| println!("{} = {value}", sub.node_id));
//!     let handles = interface.subscribe_catalog(listener.clone()).await;
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::catalog::{ImportSummary, Node, NodeCatalog, NodeImporter, SubscriptionPolicy};
use crate::client::access::{self, ValueRead};
use crate::client::{
    ConnectionManager, NodeUpdateListener, OpcUaTransport, OpcUaValue, RegistryStats,
    SessionStats, SubscriptionHandle, SubscriptionRegistry, TransportEvent,
};
use crate::config::InterfaceConfig;
use crate::error::{BrowseError, OpcUaError, OpcUaResult, SubscriptionError};
use crate::events::{EventHub, EventListener, InterfaceEvent, InterfaceHook, ListenerId};
use crate::types::{NodeId, StatusCode};

// =============================================================================
// Pending events
// =============================================================================

/// Events queued for the next tick.
#[derive(Debug, Default, Clone, Copy)]
struct PendingEvents {
    connected: bool,
    reconnected: bool,
}

// =============================================================================
// OpcUaInterface
// =============================================================================

/// Stateful OPC UA client interface.
pub struct OpcUaInterface<T: OpcUaTransport> {
    connection: ConnectionManager<T>,
    registry: Arc<SubscriptionRegistry>,
    catalog: NodeCatalog,
    policy: SubscriptionPolicy,
    events: EventHub,
    hook: Option<Arc<dyn InterfaceHook>>,
    transport_events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    closed_flag: Arc<AtomicBool>,
    dispatcher: Option<JoinHandle<()>>,
    pending: PendingEvents,
    /// Set by a server-initiated closure until the next successful connect.
    closed_by_server: bool,
}

impl<T: OpcUaTransport> OpcUaInterface<T> {
    /// Creates an interface over `transport`.
    ///
    /// Fails if the configuration is invalid.
    pub fn new(mut transport: T, config: InterfaceConfig) -> OpcUaResult<Self> {
        config.validate()?;
        let policy = SubscriptionPolicy::from_config(&config)?;
        let registry = Arc::new(SubscriptionRegistry::new(
            config.subscription.clone(),
            config.max_nodes_per_subscription,
        ));

        let (sender, receiver) = mpsc::unbounded_channel();
        transport.set_event_sender(sender);

        Ok(Self {
            connection: ConnectionManager::new(transport, config),
            registry,
            catalog: NodeCatalog::new(),
            policy,
            events: EventHub::new(),
            hook: None,
            transport_events: Some(receiver),
            closed_flag: Arc::new(AtomicBool::new(false)),
            dispatcher: None,
            pending: PendingEvents::default(),
            closed_by_server: false,
        })
    }

    /// Installs the framework hook.
    pub fn with_hook(mut self, hook: Arc<dyn InterfaceHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Replaces the framework hook.
    pub fn set_hook(&mut self, hook: Option<Arc<dyn InterfaceHook>>) {
        self.hook = hook;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the configuration.
    pub fn config(&self) -> &InterfaceConfig {
        self.connection.config()
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    /// Returns the connection manager.
    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    /// Returns the imported nodes.
    pub fn catalog(&self) -> &NodeCatalog {
        &self.catalog
    }

    /// Looks an imported node up by id.
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.catalog.get(node_id)
    }

    /// Looks an imported node up by id, mutably.
    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.catalog.get_mut(node_id)
    }

    /// Returns the subscription registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Returns subscription statistics.
    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Returns connection statistics.
    pub fn session_stats(&self) -> &SessionStats {
        self.connection.stats()
    }

    /// Returns `true` while a session is active.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Returns `true` while the reconnect loop is armed.
    pub fn is_reconnecting(&self) -> bool {
        self.connection.is_reconnecting()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects to the configured server. Returns `true` on success.
    ///
    /// Connection events are fired on the next [`tick`](Self::tick).
    pub async fn connect(&mut self) -> bool {
        self.connect_at(Instant::now()).await
    }

    /// Connects, stamping `now` as the attempt instant.
    pub async fn connect_at(&mut self, now: Instant) -> bool {
        if self.connection.is_connected() {
            tracing::debug!("Tearing down live session before connecting");
            self.registry.teardown(self.connection.transport()).await;
            self.connection.close().await;
            self.pending = PendingEvents::default();
        }
        self.renew_event_channel();

        if self.connection.connect_at(now).await.is_err() {
            return false;
        }

        self.registry.reset();
        self.pending.connected = true;
        if self.closed_by_server {
            self.pending.reconnected = true;
            self.closed_by_server = false;
        }
        self.notify_connection_changed(true);
        true
    }

    /// Tears the session down.
    ///
    /// Every monitored item and subscription is deleted before the transport
    /// closes. Fires [`InterfaceEvent::Disconnected`]. No-op when not
    /// connected.
    pub async fn disconnect(&mut self) {
        if !self.connection.is_connected() {
            return;
        }

        let stats = self.registry.stats();
        self.registry.teardown(self.connection.transport()).await;
        self.connection.close().await;
        tracing::info!(
            server = %self.config().endpoint_url(),
            groups = stats.groups,
            nodes = stats.subscribing_nodes,
            "Disconnected from OPC UA server"
        );

        self.renew_event_channel();
        // Events queued for the session that just ended are stale.
        self.pending = PendingEvents::default();

        self.notify_connection_changed(false);
        self.events.emit(InterfaceEvent::Disconnected);
    }

    /// Runs one host iteration at the current instant.
    pub async fn tick(&mut self) {
        self.tick_at(Instant::now()).await;
    }

    /// Runs one host iteration.
    ///
    /// Drains pushed transport traffic, fires queued connection events, then
    /// reconnects if the reconnect loop is armed and the interval elapsed.
    pub async fn tick_at(&mut self, now: Instant) {
        let closed = self.drain_transport_events();
        if closed && self.connection.is_connected() {
            self.handle_connection_closed().await;
        }

        let pending = std::mem::take(&mut self.pending);
        if pending.connected {
            self.events.emit(InterfaceEvent::Connected);
        }
        if pending.reconnected {
            self.events.emit(InterfaceEvent::Reconnected);
        }

        if self.connection.reconnect_due(now) {
            tracing::info!(server = %self.config().endpoint_url(), "Reconnecting to OPC UA server");
            self.connect_at(now).await;
        }
    }

    /// Stops the reconnect loop.
    pub fn cancel_reconnect(&mut self) {
        self.connection.cancel_reconnect();
    }

    /// Moves transport traffic handling into a tokio task.
    ///
    /// The task dispatches data changes to listeners as they arrive and
    /// flags connection closure for the next tick. Catalog values are no
    /// longer updated from notifications. Returns `false` if the dispatcher
    /// is already running.
    pub fn spawn_dispatcher(&mut self) -> bool {
        let Some(receiver) = self.transport_events.take() else {
            return false;
        };
        self.dispatcher = Some(self.spawn_dispatch_task(receiver));
        tracing::debug!("Spawned notification dispatcher");
        true
    }

    fn spawn_dispatch_task(
        &self,
        mut receiver: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let closed = Arc::clone(&self.closed_flag);

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                match event {
                    TransportEvent::DataChange {
                        client_handle,
                        value,
                    } => {
                        registry.dispatch(client_handle, &value);
                    }
                    TransportEvent::ConnectionClosed => {
                        closed.store(true, Ordering::Release);
                    }
                }
            }
            tracing::debug!("Transport event channel closed");
        })
    }

    /// Hands the transport a fresh event channel.
    ///
    /// Client handles restart with every session, so traffic still queued
    /// from an earlier session is dropped together with its receiver.
    fn renew_event_channel(&mut self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.connection.transport_mut().set_event_sender(sender);
        self.closed_flag = Arc::new(AtomicBool::new(false));

        match self.dispatcher.take() {
            Some(task) => {
                task.abort();
                self.dispatcher = Some(self.spawn_dispatch_task(receiver));
            }
            None => self.transport_events = Some(receiver),
        }
    }

    /// Dispatches queued transport events. Returns `true` if one reported
    /// a closed connection.
    fn drain_transport_events(&mut self) -> bool {
        let mut closed = self.closed_flag.swap(false, Ordering::AcqRel);
        let Some(receiver) = self.transport_events.as_mut() else {
            return closed;
        };

        while let Ok(event) = receiver.try_recv() {
            match event {
                TransportEvent::DataChange {
                    client_handle,
                    value,
                } => {
                    if let Some(entry) = self.registry.dispatch(client_handle, &value) {
                        if let Some(node) = self.catalog.get_mut(&entry.node_id) {
                            node.value = Some(value);
                            node.status = StatusCode::GOOD;
                        }
                    }
                }
                TransportEvent::ConnectionClosed => closed = true,
            }
        }
        closed
    }

    /// Arms the reconnect loop and runs the disconnect path.
    async fn handle_connection_closed(&mut self) {
        tracing::warn!(
            server = %self.config().endpoint_url(),
            "Connection closed by server"
        );
        self.connection.mark_connection_lost();
        self.closed_by_server = true;
        self.disconnect().await;
    }

    fn notify_connection_changed(&self, connected: bool) {
        if let Some(hook) = &self.hook {
            hook.on_connection_changed(connected);
        }
    }

    // =========================================================================
    // Import
    // =========================================================================

    /// Imports the hierarchy below the configured top node.
    pub async fn import_nodes(&mut self) -> ImportSummary {
        let root = self.config().top_node_id.clone();
        self.import_nodes_from(&root).await
    }

    /// Imports the hierarchy below `root_id`. An empty id means the Root
    /// folder.
    ///
    /// Nodes already in the catalog are updated in place; nothing is ever
    /// removed.
    pub async fn import_nodes_from(&mut self, root_id: &str) -> ImportSummary {
        if !self.connection.is_connected() {
            tracing::warn!(root = root_id, "Cannot import nodes without a connection");
            return ImportSummary::default();
        }

        let root = if root_id.trim().is_empty() {
            NodeId::ROOT_FOLDER
        } else {
            match root_id.parse::<NodeId>() {
                Ok(id) => id,
                Err(e) => {
                    OpcUaError::browse(BrowseError::invalid_root(root_id, e.to_string()))
                        .log("import");
                    return ImportSummary::default();
                }
            }
        };

        let summary = NodeImporter::new(self.connection.transport(), &self.policy)
            .import(&mut self.catalog, &root)
            .await;

        if summary.connection_closed {
            self.handle_connection_closed().await;
        }
        if let Some(hook) = &self.hook {
            hook.on_nodes_imported(&self.catalog);
        }
        summary
    }

    /// Connects, imports below the configured top node, then disconnects.
    ///
    /// Returns `None` if the connect failed.
    pub async fn import_once(&mut self) -> Option<ImportSummary> {
        if !self.connect().await {
            return None;
        }
        let summary = self.import_nodes().await;
        self.disconnect().await;
        Some(summary)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribes `listener` to value changes of `node_id`.
    ///
    /// A node is monitored once per connection however many listeners it
    /// has. The registry holds the listener weakly.
    pub async fn subscribe(
        &mut self,
        node_id: &str,
        listener: Weak<dyn NodeUpdateListener>,
    ) -> OpcUaResult<SubscriptionHandle> {
        if !self.connection.is_connected() {
            let error = OpcUaError::subscription(SubscriptionError::not_connected(node_id));
            error.log("subscribe");
            return Err(error);
        }
        self.registry
            .subscribe(self.connection.transport(), node_id, listener)
            .await
    }

    /// Removes one listener registration.
    ///
    /// The monitored item stays until disconnect.
    pub fn unsubscribe(&mut self, handle: &SubscriptionHandle) -> bool {
        self.registry.unsubscribe(handle)
    }

    /// Subscribes `listener` to every catalog node flagged for subscription.
    pub async fn subscribe_catalog(
        &mut self,
        listener: Arc<dyn NodeUpdateListener>,
    ) -> Vec<SubscriptionHandle> {
        let node_ids: Vec<String> = self
            .catalog
            .nodes()
            .filter(|n| n.subscribe_value)
            .map(|n| n.node_id.clone())
            .collect();

        let mut handles = Vec::with_capacity(node_ids.len());
        for node_id in node_ids {
            match self.subscribe(&node_id, Arc::downgrade(&listener)).await {
                Ok(handle) => handles.push(handle),
                Err(e) => tracing::debug!(node_id = %node_id, error = %e, "Catalog subscribe failed"),
            }
        }
        tracing::info!(nodes = handles.len(), "Subscribed catalog nodes");
        handles
    }

    // =========================================================================
    // Value access
    // =========================================================================

    /// Reads the current value of a node.
    pub async fn read_node_value(&mut self, node_id: &str) -> Option<OpcUaValue> {
        self.read_node_value_with_status(node_id).await.value
    }

    /// Reads the current value of a node together with its status.
    pub async fn read_node_value_with_status(&mut self, node_id: &str) -> ValueRead {
        if !self.connection.is_connected() {
            tracing::debug!(node_id, "Read skipped, not connected");
            return ValueRead::not_connected();
        }

        let read = access::read_value(self.connection.transport(), node_id).await;
        if read.is_connection_closed() {
            self.handle_connection_closed().await;
        }
        read
    }

    /// Writes a node value. Returns `true` on a Good status.
    pub async fn write_node_value(&mut self, node_id: &str, value: &OpcUaValue) -> bool {
        self.write_node_value_with_status(node_id, value).await.is_good()
    }

    /// Writes a node value and returns the server status.
    ///
    /// Neither the catalog nor listeners see the written value.
    pub async fn write_node_value_with_status(
        &mut self,
        node_id: &str,
        value: &OpcUaValue,
    ) -> StatusCode {
        if !self.connection.is_connected() {
            tracing::debug!(node_id, "Write skipped, not connected");
            return StatusCode::BAD_NOT_CONNECTED;
        }

        let status = access::write_value(self.connection.transport(), node_id, value).await;
        if status.is_connection_closed() {
            self.handle_connection_closed().await;
        }
        status
    }

    /// Reads every catalog node flagged `read_value && poll_input` and
    /// stores the results. Returns the number of nodes read.
    pub async fn poll_inputs(&mut self) -> usize {
        let node_ids: Vec<String> = self
            .catalog
            .nodes()
            .filter(|n| n.read_value && n.poll_input)
            .map(|n| n.node_id.clone())
            .collect();

        let mut polled = 0;
        for node_id in node_ids {
            if !self.connection.is_connected() {
                break;
            }
            self.refresh_node(&node_id).await;
            polled += 1;
        }
        polled
    }

    /// Reads one catalog node and stores value and status.
    ///
    /// A read without a value leaves the node with no value and
    /// `BadNoData`.
    pub async fn refresh_node(&mut self, node_id: &str) -> ValueRead {
        let read = self.read_node_value_with_status(node_id).await;
        if let Some(node) = self.catalog.get_mut(node_id) {
            node.value = read.value.clone();
            node.status = match node.value {
                Some(_) => read.status,
                None => StatusCode::BAD_NO_DATA,
            };
        }
        read
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Registers a lifecycle listener. The interface holds it weakly.
    pub fn add_event_listener(&mut self, listener: Weak<dyn EventListener>) -> ListenerId {
        self.events.add_listener(listener)
    }

    /// Removes a lifecycle listener.
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.events.remove_listener(id)
    }

    /// Returns a broadcast receiver of lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<InterfaceEvent> {
        self.events.subscribe()
    }
}

impl<T: OpcUaTransport> Drop for OpcUaInterface<T> {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
    }
}

impl<T: OpcUaTransport> fmt::Debug for OpcUaInterface<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcUaInterface")
            .field("server", &self.config().endpoint_url())
            .field("transport", &self.connection.transport().display_name())
            .field("connected", &self.is_connected())
            .field("reconnecting", &self.is_reconnecting())
            .field("nodes", &self.catalog.len())
            .field("registry", &self.registry.stats())
            .field("events", &self.events)
            .finish()
    }
}
