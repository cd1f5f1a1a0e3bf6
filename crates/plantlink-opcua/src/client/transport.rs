// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! [`OpcUaTransport`] exposes the individual OPC UA service calls the
//! interface drives: the four connect steps, attribute reads and writes,
//! browsing, and subscription management. Server-pushed traffic (data
//! changes, channel closure) flows back over an unbounded channel of
//! [`TransportEvent`]s, because it originates outside the host context.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::{ApplicationIdentity, SubscriptionSettings};
use crate::error::{ConversionError, OpcUaError, OpcUaResult};
use crate::types::{AttributeId, NodeClass, NodeId, ScalarType, StatusCode};

// =============================================================================
// OpcUaValue
// =============================================================================

/// A decoded OPC UA variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OpcUaValue {
    /// Boolean value.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String value.
    String(String),
    /// Date/time value.
    DateTime(chrono::DateTime<chrono::Utc>),
    /// GUID value.
    Guid(uuid::Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Localized text (text part only).
    LocalizedText(String),
    /// Node id, as returned by DataType reads.
    NodeId(NodeId),
    /// Array of values.
    Array(Vec<OpcUaValue>),
    /// Null value.
    #[default]
    Null,
}

impl OpcUaValue {
    /// Returns the variant's type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::SByte(_) => "SByte",
            Self::Byte(_) => "Byte",
            Self::Int16(_) => "Int16",
            Self::UInt16(_) => "UInt16",
            Self::Int32(_) => "Int32",
            Self::UInt32(_) => "UInt32",
            Self::Int64(_) => "Int64",
            Self::UInt64(_) => "UInt64",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::String(_) => "String",
            Self::DateTime(_) => "DateTime",
            Self::Guid(_) => "Guid",
            Self::ByteString(_) => "ByteString",
            Self::LocalizedText(_) => "LocalizedText",
            Self::NodeId(_) => "NodeId",
            Self::Array(_) => "Array",
            Self::Null => "Null",
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Attempts to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            other => other.as_i64().map(|v| v != 0),
        }
    }

    /// Attempts to get the value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Boolean(v) => Some(i64::from(*v)),
            Self::SByte(v) => Some(i64::from(*v)),
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            Self::Float(v) => Some(*v as i64),
            Self::Double(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Attempts to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            Self::UInt64(v) => Some(*v as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Attempts to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::LocalizedText(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to get the value as a node id.
    pub fn as_node_id(&self) -> Option<&NodeId> {
        match self {
            Self::NodeId(v) => Some(v),
            _ => None,
        }
    }

    /// Parses text into a value of the given scalar type.
    ///
    /// # Examples
    ///
    /// ```
    /// use plantlink_opcua::client::OpcUaValue;
    /// use plantlink_opcua::types::ScalarType;
    ///
    /// let value = OpcUaValue::parse_as(ScalarType::Int16, "-42").unwrap();
    /// assert_eq!(value, OpcUaValue::Int16(-42));
    /// assert!(OpcUaValue::parse_as(ScalarType::Byte, "300").is_err());
    /// ```
    pub fn parse_as(data_type: ScalarType, text: &str) -> OpcUaResult<Self> {
        fn parse<T: std::str::FromStr>(data_type: ScalarType, text: &str) -> OpcUaResult<T>
        where
            T::Err: fmt::Display,
        {
            text.trim().parse::<T>().map_err(|e| {
                OpcUaError::conversion(ConversionError::parse_failed(
                    data_type.name(),
                    text,
                    e.to_string(),
                ))
            })
        }

        Ok(match data_type {
            ScalarType::Boolean => match text.trim().to_lowercase().as_str() {
                "true" | "1" | "on" => Self::Boolean(true),
                "false" | "0" | "off" => Self::Boolean(false),
                _ => {
                    return Err(OpcUaError::conversion(ConversionError::parse_failed(
                        "Boolean",
                        text,
                        "expected true/false",
                    )))
                }
            },
            ScalarType::SByte => Self::SByte(parse(data_type, text)?),
            ScalarType::Byte => Self::Byte(parse(data_type, text)?),
            ScalarType::Int16 => Self::Int16(parse(data_type, text)?),
            ScalarType::UInt16 => Self::UInt16(parse(data_type, text)?),
            ScalarType::Int32 => Self::Int32(parse(data_type, text)?),
            ScalarType::UInt32 => Self::UInt32(parse(data_type, text)?),
            ScalarType::Int64 => Self::Int64(parse(data_type, text)?),
            ScalarType::UInt64 => Self::UInt64(parse(data_type, text)?),
            ScalarType::Float => Self::Float(parse(data_type, text)?),
            ScalarType::Double => Self::Double(parse(data_type, text)?),
            ScalarType::String => Self::String(text.to_string()),
        })
    }
}

impl fmt::Display for OpcUaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(true) => f.write_str("True"),
            Self::Boolean(false) => f.write_str("False"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) | Self::LocalizedText(v) => f.write_str(v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{v}"),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::NodeId(v) => write!(f, "{v}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Null => f.write_str("null"),
        }
    }
}

// =============================================================================
// Service payloads
// =============================================================================

/// Result of an attribute read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// Decoded value, absent when the server returned none.
    pub value: Option<OpcUaValue>,
    /// Status of the read.
    pub status: StatusCode,
}

impl DataValue {
    /// Creates a Good data value.
    pub fn good(value: OpcUaValue) -> Self {
        Self {
            value: Some(value),
            status: StatusCode::GOOD,
        }
    }

    /// Creates a valueless data value with the given status.
    pub fn bad(status: StatusCode) -> Self {
        Self {
            value: None,
            status,
        }
    }
}

/// A forward hierarchical reference returned by a browse.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescription {
    /// Target node.
    pub node_id: NodeId,
    /// Browse name of the target.
    pub browse_name: String,
    /// Display name of the target.
    pub display_name: String,
    /// Node class of the target.
    pub node_class: NodeClass,
}

/// User identity token kinds a server endpoint may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserTokenType {
    /// Anonymous access.
    Anonymous,
    /// Username and password.
    UserName,
    /// X.509 certificate.
    Certificate,
    /// Issued token (e.g. Kerberos, JWT).
    IssuedToken,
}

/// A user identity policy advertised by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTokenPolicy {
    /// Policy id to echo back on activation.
    pub policy_id: String,
    /// Token kind.
    pub token_type: UserTokenType,
}

/// An endpoint advertised by GetEndpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointDescription {
    /// Endpoint URL.
    pub endpoint_url: String,
    /// Server certificate (DER), if the endpoint carries one.
    pub server_certificate: Option<Vec<u8>>,
    /// Accepted identity policies.
    pub user_identity_tokens: Vec<UserTokenPolicy>,
}

/// Identity presented by ActivateSession.
#[derive(Clone, PartialEq, Eq)]
pub enum IdentityToken {
    /// Anonymous identity.
    Anonymous {
        /// Policy id.
        policy_id: String,
    },
    /// Username and password identity.
    UserName {
        /// Policy id selected from the server's endpoints.
        policy_id: String,
        /// User name.
        username: String,
        /// Password.
        password: String,
        /// Server certificate used to encrypt the password, if known.
        server_certificate: Option<Vec<u8>>,
    },
}

impl IdentityToken {
    /// Policy id used for anonymous activation.
    pub const ANONYMOUS_POLICY_ID: &'static str = "0";

    /// Creates the anonymous identity.
    pub fn anonymous() -> Self {
        Self::Anonymous {
            policy_id: Self::ANONYMOUS_POLICY_ID.to_string(),
        }
    }

    /// Returns the policy id.
    pub fn policy_id(&self) -> &str {
        match self {
            Self::Anonymous { policy_id } | Self::UserName { policy_id, .. } => policy_id,
        }
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous { policy_id } => f
                .debug_struct("Anonymous")
                .field("policy_id", policy_id)
                .finish(),
            Self::UserName {
                policy_id,
                username,
                server_certificate,
                ..
            } => f
                .debug_struct("UserName")
                .field("policy_id", policy_id)
                .field("username", username)
                .field("password", &"***")
                .field("server_certificate", &server_certificate.as_ref().map(Vec::len))
                .finish(),
        }
    }
}

/// Where and how to open the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportTarget {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Client certificate and private key paths, if both are configured.
    pub certificates: Option<(PathBuf, PathBuf)>,
}

impl TransportTarget {
    /// Returns the `opc.tcp://` URL of the target.
    pub fn endpoint_url(&self) -> String {
        format!("opc.tcp://{}:{}", self.host, self.port)
    }
}

/// Parameters of CreateSession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// Client application description.
    pub application: ApplicationIdentity,
    /// Session name.
    pub session_name: String,
    /// Requested session timeout.
    pub session_timeout: Duration,
}

/// Parameters of one monitored item on the Value attribute (Reporting mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredItemRequest {
    /// Monitored node.
    pub node_id: NodeId,
    /// Client handle stamped on every notification.
    pub client_handle: u32,
    /// Requested sampling interval.
    pub sampling_interval: Duration,
    /// Queue size.
    pub queue_size: u32,
    /// Discard policy.
    pub discard_oldest: bool,
}

/// Server answer to a monitored item creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredItemResult {
    /// Item status.
    pub status: StatusCode,
    /// Server-assigned monitored item id.
    pub monitored_item_id: u32,
}

// =============================================================================
// TransportEvent
// =============================================================================

/// Traffic pushed by the transport outside of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A monitored item reported a new value.
    DataChange {
        /// Client handle of the monitored item.
        client_handle: u32,
        /// The new value.
        value: OpcUaValue,
    },
    /// The server closed the secure channel or session.
    ConnectionClosed,
}

/// Sender half handed to transports.
pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

// =============================================================================
// OpcUaTransport Trait
// =============================================================================

/// OPC UA service calls used by the interface.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Connect-step methods take
/// `&mut self`; request methods take `&self` so subscription callbacks
/// can run while the host issues reads.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    // =========================================================================
    // Connect Steps
    // =========================================================================

    /// Opens the TCP transport to the target.
    async fn open(&mut self, target: &TransportTarget) -> OpcUaResult<()>;

    /// Opens a secure channel with message mode None and policy None.
    async fn open_secure_channel(&mut self) -> OpcUaResult<()>;

    /// Creates a session.
    async fn create_session(&mut self, request: &SessionRequest) -> OpcUaResult<()>;

    /// Lists the server's endpoints.
    async fn get_endpoints(&mut self) -> OpcUaResult<Vec<EndpointDescription>>;

    /// Activates the session with an identity.
    async fn activate_session(&mut self, identity: &IdentityToken) -> OpcUaResult<()>;

    /// Closes session, channel and transport. Must be safe to call twice.
    async fn close(&mut self) -> OpcUaResult<()>;

    /// Returns `true` while the transport is open.
    fn is_open(&self) -> bool;

    /// Installs the channel for pushed traffic.
    ///
    /// Called again with a fresh channel around every session. A session
    /// keeps pushing to the sender that was installed when it was activated.
    fn set_event_sender(&mut self, sender: TransportEventSender);

    // =========================================================================
    // Attribute Services
    // =========================================================================

    /// Reads one attribute of one node.
    async fn read(&self, node_id: &NodeId, attribute: AttributeId) -> OpcUaResult<DataValue>;

    /// Writes the Value attribute of one node.
    async fn write(&self, node_id: &NodeId, value: &OpcUaValue) -> OpcUaResult<StatusCode>;

    // =========================================================================
    // View Services
    // =========================================================================

    /// Browses every forward hierarchical reference of a node.
    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<ReferenceDescription>>;

    // =========================================================================
    // Subscription Services
    // =========================================================================

    /// Creates a subscription and returns its server id.
    async fn create_subscription(&self, settings: &SubscriptionSettings) -> OpcUaResult<u32>;

    /// Creates one monitored item in a subscription.
    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        request: &MonitoredItemRequest,
    ) -> OpcUaResult<MonitoredItemResult>;

    /// Deletes monitored items by server monitored-item id.
    async fn delete_monitored_items(&self, subscription_id: u32, item_ids: &[u32])
        -> OpcUaResult<()>;

    /// Deletes a subscription.
    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns a display name for logs.
    fn display_name(&self) -> String;
}

// =============================================================================
// Tests
// =============================================================================
