// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Host runtime.
//!
//! [`HostRuntime`] plays the role of the simulation host: it owns one
//! [`OpcUaInterface`], drives [`tick`](OpcUaInterface::tick) on a fixed
//! period, and re-establishes subscriptions each time the interface reports
//! a connection (the registry starts empty on every connect).
//!
//! ```text
//!   ticker ──► interface.tick() ──► Connected ──► import + subscribe
//!                     │                              │
//!                     └── reconnect loop ◄── Disconnected
//!   shutdown ──► interface.disconnect() ──► exit
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use plantlink_opcua::{
    InterfaceEvent, NodeSubscription, NodeUpdateListener, OpcUaInterface, OpcUaTransport,
    OpcUaValue,
};

use crate::cli::OutputFormat;
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// WatchPlan
// =============================================================================

/// What the host subscribes to after each connect.
#[derive(Debug, Clone)]
pub struct WatchPlan {
    /// Explicit nodes. Empty means every catalog node flagged for
    /// subscription.
    pub nodes: Vec<String>,
    /// Import root. `None` uses the configured top node.
    pub root: Option<String>,
    /// Import on every connect.
    pub import: bool,
    /// Host loop period.
    pub tick: Duration,
    /// Value change output format.
    pub format: OutputFormat,
}

impl Default for WatchPlan {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            import: true,
            tick: Duration::from_millis(100),
            format: OutputFormat::Text,
        }
    }
}

// =============================================================================
// ValuePrinter
// =============================================================================

/// Listener that prints every value change on stdout.
pub struct ValuePrinter {
    format: OutputFormat,
    names: Mutex<HashMap<String, String>>,
    printed: AtomicU64,
}

impl ValuePrinter {
    /// Creates a printer.
    pub fn new(format: OutputFormat) -> Arc<Self> {
        Arc::new(Self {
            format,
            names: Mutex::new(HashMap::new()),
            printed: AtomicU64::new(0),
        })
    }

    /// Remembers display names so text output can show them.
    pub fn learn_names<'a>(&self, names: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let mut known = self.names.lock();
        for (node_id, name) in names {
            known.insert(node_id.to_string(), name.to_string());
        }
    }

    /// Number of value changes printed so far.
    pub fn printed(&self) -> u64 {
        self.printed.load(Ordering::Relaxed)
    }

    /// Formats one value change.
    pub fn format_change(&self, node_id: &str, value: &OpcUaValue) -> String {
        match self.format {
            OutputFormat::Text => match self.names.lock().get(node_id) {
                Some(name) => format!("{name} [{node_id}] = {value}"),
                None => format!("{node_id} = {value}"),
            },
            OutputFormat::Json => serde_json::json!({
                "node_id": node_id,
                "type": value.type_name(),
                "value": value.to_string(),
            })
            .to_string(),
        }
    }
}

impl NodeUpdateListener for ValuePrinter {
    fn on_value_changed(&self, subscription: &NodeSubscription, value: &OpcUaValue) {
        let line = self.format_change(&subscription.node_id, value);
        let mut stdout = std::io::stdout().lock();
        if writeln!(stdout, "{line}").is_ok() {
            self.printed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// =============================================================================
// HostRuntime
// =============================================================================

/// Counters reported when the runtime stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Successful connects, initial one included.
    pub connects: u64,
    /// Connections lost while running.
    pub disconnects: u64,
    /// Value changes printed.
    pub values: u64,
}

/// Drives one interface until shutdown.
pub struct HostRuntime<T: OpcUaTransport> {
    interface: OpcUaInterface<T>,
    plan: WatchPlan,
    shutdown: ShutdownCoordinator,
    printer: Arc<ValuePrinter>,
    summary: RunSummary,
}

impl<T: OpcUaTransport + 'static> HostRuntime<T> {
    /// Creates a runtime.
    pub fn new(interface: OpcUaInterface<T>, plan: WatchPlan, shutdown: ShutdownCoordinator) -> Self {
        let printer = ValuePrinter::new(plan.format);
        Self {
            interface,
            plan,
            shutdown,
            printer,
            summary: RunSummary::default(),
        }
    }

    /// Runs until shutdown, then disconnects.
    ///
    /// Fails only when the first connect fails and reconnecting is disabled.
    pub async fn run(mut self) -> BinResult<RunSummary> {
        let endpoint = self.interface.config().endpoint_url();
        let mut events = self.interface.subscribe_events();
        let mut ticker = tokio::time::interval(self.plan.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(server = %endpoint, tick = ?self.plan.tick, "Starting host loop");
        if !self.interface.connect().await {
            if !self.interface.is_reconnecting() {
                return Err(BinError::connection(format!("cannot connect to {endpoint}")));
            }
            warn!(
                server = %endpoint,
                interval = ?self.interface.config().reconnect_interval,
                "Initial connect failed, retrying"
            );
        }

        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.signalled() => break,
                _ = ticker.tick() => self.interface.tick().await,
                event = events.recv() => match event {
                    Ok(event) => self.on_event(event).await,
                    Err(RecvError::Lagged(missed)) => debug!(missed, "Interface events lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!("Stopping host loop");
        self.interface.disconnect().await;
        self.summary.values = self.printer.printed();
        info!(
            connects = self.summary.connects,
            disconnects = self.summary.disconnects,
            values = self.summary.values,
            "Host loop stopped"
        );
        Ok(self.summary)
    }

    async fn on_event(&mut self, event: InterfaceEvent) {
        match event {
            InterfaceEvent::Connected => {
                self.summary.connects += 1;
                self.on_connected().await;
            }
            InterfaceEvent::Disconnected => {
                if !self.shutdown.is_shutdown_initiated() {
                    self.summary.disconnects += 1;
                    warn!(
                        reconnecting = self.interface.is_reconnecting(),
                        "Lost connection to server"
                    );
                }
            }
            InterfaceEvent::Reconnected => info!("Connection re-established"),
        }
    }

    async fn on_connected(&mut self) {
        if self.plan.import {
            let summary = match &self.plan.root {
                Some(root) => self.interface.import_nodes_from(root).await,
                None => self.interface.import_nodes().await,
            };
            if summary.connection_closed {
                return;
            }
            self.printer.learn_names(
                self.interface
                    .catalog()
                    .nodes()
                    .map(|n| (n.node_id.as_str(), n.display_name.as_str())),
            );
        }

        let subscribed = if self.plan.nodes.is_empty() {
            self.interface
                .subscribe_catalog(self.printer.clone())
                .await
                .len()
        } else {
            let listener: Arc<dyn NodeUpdateListener> = self.printer.clone();
            let mut subscribed = 0;
            for node_id in &self.plan.nodes {
                match self.interface.subscribe(node_id, Arc::downgrade(&listener)).await {
                    Ok(_) => subscribed += 1,
                    Err(e) => warn!(node_id = %node_id, error = %e, "Subscribe failed"),
                }
            }
            subscribed
        };

        if subscribed == 0 {
            warn!("Nothing to watch: no node is flagged for subscription");
        } else {
            info!(nodes = subscribed, "Watching value changes");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
