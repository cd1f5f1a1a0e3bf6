// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client interface for plant automation hosts.
//!
//! This crate connects a polling host (a simulation loop, a CLI, a gateway)
//! to an OPC UA server:
//!
//! # Features
//!
//! - Connect with security policy None, anonymous or username identity
//! - Recursive import of a server subtree into a flat [`NodeCatalog`]
//! - Default read/write/subscribe flags from configurable patterns
//! - One monitored item per node, fanned out to weakly held listeners
//! - Subscriptions batched into groups of bounded size
//! - Polled reconnection on a fixed interval
//! - Connected, Disconnected and Reconnected events
//!
//! The OPC UA services sit behind the [`OpcUaTransport`] trait. The
//! `real-transport` feature provides `RealOpcUaTransport` over the `opcua`
//! crate.
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Connect steps, closure, unreachable server
//! ├── Session       - Session create/activate, identity policy
//! ├── Browse        - Browse failures, invalid import root
//! ├── Operation     - Read/write failures
//! ├── Subscription  - Subscription and monitored item errors
//! ├── Conversion    - Value type and parse errors
//! └── Configuration - Invalid settings
//! ```
//!
//! Reads and writes on [`OpcUaInterface`] never return errors; bad outcomes
//! surface as [`StatusCode`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use plantlink_opcua::{InterfaceConfig, OpcUaInterface, RealOpcUaTransport};
//!
//! let config = InterfaceConfig::builder()
//!     .server("192.168.0.10", 4840)
//!     .top_node_id("ns=2;s=Line1")
//!     .build()?;
//!
//! let mut interface = OpcUaInterface::new(RealOpcUaTransport::new(), config)?;
//! if interface.connect().await {
//!     let summary = interface.import_nodes().await;
//!     println!("{summary}");
//! }
//! loop {
//!     interface.tick().await;
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod interface;
pub mod types;

pub use catalog::{ImportSummary, Node, NodeCatalog, NodeImporter, SubscriptionPolicy};

pub use client::{
    ConnectStep, ConnectionManager, FnListener, NodeSubscription, NodeUpdateListener,
    OpcUaTransport, OpcUaValue, ReconnectPolicy, RegistrationId, SubscriptionHandle,
    SubscriptionRegistry, TransportEvent, ValueRead,
};

#[cfg(feature = "real-transport")]
pub use client::RealOpcUaTransport;

pub use config::{
    ApplicationIdentity, CertificatePaths, Credentials, InterfaceConfig, InterfaceConfigBuilder,
    SubscriptionSettings,
};

pub use error::{
    BrowseError, ConfigurationError, ConnectionError, ConversionError, ErrorCode, ErrorSeverity,
    OpcUaError, OpcUaResult, OperationError, SessionError, SubscriptionError,
};

pub use events::{CollectorListener, EventListener, InterfaceEvent, InterfaceHook, ListenerId};

pub use interface::OpcUaInterface;

pub use types::{AccessLevel, AttributeId, NodeClass, NodeId, NodeIdentifier, ScalarType, StatusCode};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
