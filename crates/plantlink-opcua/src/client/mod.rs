// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client layers.
//!
//! - **Transport**: the [`OpcUaTransport`] trait over the OPC UA services
//! - **Session**: connect steps, teardown and the reconnect policy
//! - **Subscription**: deduplicated monitored items and listener fan-out
//! - **Access**: single-node reads and writes folded into status codes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       OpcUaInterface                            │
//! │            (host-facing lifecycle, catalog, events)             │
//! └─────────────────────────────────────────────────────────────────┘
//!                │                     │                   │
//!                ▼                     ▼                   ▼
//! ┌──────────────────────┐ ┌──────────────────────┐ ┌──────────────┐
//! │  ConnectionManager   │ │ SubscriptionRegistry │ │    access    │
//! └──────────────────────┘ └──────────────────────┘ └──────────────┘
//!                │                     │                   │
//!                └─────────────────────┼───────────────────┘
//!                                      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       OpcUaTransport                            │
//! │           (MockTransport in tests, RealOpcUaTransport)          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod access;
mod session;
pub mod subscription;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use access::ValueRead;
pub use session::{ConnectStep, ConnectionManager, ReconnectPolicy, SessionStats};
pub use subscription::{
    FnListener, MonitoredItemId, NodeSubscription, NodeUpdateListener, RegistrationId,
    RegistryStats, SubscriptionHandle, SubscriptionId, SubscriptionRegistry, FIRST_CLIENT_HANDLE,
};
pub use transport::{
    DataValue, EndpointDescription, IdentityToken, MonitoredItemRequest, MonitoredItemResult,
    OpcUaTransport, OpcUaValue, ReferenceDescription, SessionRequest, TransportEvent,
    TransportEventSender, TransportTarget, UserTokenPolicy, UserTokenType,
};

#[cfg(feature = "real-transport")]
pub use real_transport::RealOpcUaTransport;
