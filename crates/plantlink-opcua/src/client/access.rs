// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Single-node value access.
//!
//! Reads and writes never fail with an error here: every outcome is folded
//! into a [`StatusCode`] so callers can treat bad results as sentinels. A
//! status for which [`StatusCode::is_connection_closed`] holds tells the
//! caller the server dropped the connection.

use crate::client::transport::{OpcUaTransport, OpcUaValue};
use crate::error::OpcUaError;
use crate::types::{AttributeId, NodeId, StatusCode};

/// Outcome of a read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueRead {
    /// The value, `None` on failure or when the server returned none.
    pub value: Option<OpcUaValue>,
    /// Status of the read.
    pub status: StatusCode,
}

impl ValueRead {
    /// A read rejected locally because there is no session.
    pub fn not_connected() -> Self {
        Self::failed(StatusCode::BAD_NOT_CONNECTED)
    }

    /// A read that produced no value.
    pub fn failed(status: StatusCode) -> Self {
        Self {
            value: None,
            status,
        }
    }

    /// Returns `true` for a Good status.
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }

    /// Returns `true` if the server closed the connection.
    pub fn is_connection_closed(&self) -> bool {
        self.status.is_connection_closed()
    }
}

/// Status to report for a transport error.
pub fn error_status(error: &OpcUaError) -> StatusCode {
    if error.is_connection_closed() {
        return StatusCode::BAD_CONNECTION_CLOSED;
    }
    error
        .status_code()
        .unwrap_or(StatusCode::BAD_COMMUNICATION_ERROR)
}

/// Reads one attribute of a parsed node.
pub async fn read_attribute<T: OpcUaTransport + ?Sized>(
    transport: &T,
    node_id: &NodeId,
    attribute: AttributeId,
) -> ValueRead {
    match transport.read(node_id, attribute).await {
        Ok(data) => ValueRead {
            value: data.value,
            status: data.status,
        },
        Err(e) => {
            tracing::debug!(node_id = %node_id, attribute = ?attribute, error = %e, "Read failed");
            ValueRead::failed(error_status(&e))
        }
    }
}

/// Reads the Value attribute of the node with the given string id.
pub async fn read_value<T: OpcUaTransport + ?Sized>(transport: &T, node_id: &str) -> ValueRead {
    let parsed: NodeId = match node_id.parse() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(node_id, error = %e, "Cannot read node with invalid id");
            return ValueRead::failed(StatusCode::BAD_NODE_ID_INVALID);
        }
    };

    let read = read_attribute(transport, &parsed, AttributeId::Value).await;
    tracing::debug!(node_id, status = %read.status, "Read node value");
    read
}

/// Writes the Value attribute of the node with the given string id.
pub async fn write_value<T: OpcUaTransport + ?Sized>(
    transport: &T,
    node_id: &str,
    value: &OpcUaValue,
) -> StatusCode {
    let parsed: NodeId = match node_id.parse() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(node_id, error = %e, "Cannot write node with invalid id");
            return StatusCode::BAD_NODE_ID_INVALID;
        }
    };

    let status = match transport.write(&parsed, value).await {
        Ok(status) => status,
        Err(e) => {
            tracing::debug!(node_id, error = %e, "Write failed");
            error_status(&e)
        }
    };
    tracing::debug!(node_id, value = %value, status = %status, "Wrote node value");
    status
}
