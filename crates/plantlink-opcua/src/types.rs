// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA protocol types shared by every layer of the interface.
//!
//! - **NodeId**: the four OPC UA identifier kinds with string-format parsing
//! - **StatusCode**: service result codes, displayed by name
//! - **NodeClass / AttributeId / AccessLevel**: browse and attribute model
//! - **ScalarType**: the type vocabulary used to parse textual write values
//!
//! # Examples
//!
//! ```
//! use plantlink_opcua::types::{NodeId, StatusCode};
//!
//! let node: NodeId = "ns=2;s=Conveyor.Speed".parse().unwrap();
//! assert_eq!(node.identifier_type(), "String");
//! assert_eq!(node.identifier_text(), "Conveyor.Speed");
//!
//! assert_eq!(StatusCode::GOOD.to_string(), "Good");
//! ```

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, ConversionError, OpcUaError};

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA Node Identifier.
///
/// A NodeId consists of a namespace index and an identifier which can be
/// numeric, string, GUID, or opaque (byte string).
///
/// # Examples
///
/// ```
/// use plantlink_opcua::types::NodeId;
///
/// let numeric = NodeId::numeric(2, 1001);
/// assert_eq!(numeric.to_string(), "ns=2;i=1001");
///
/// let parsed: NodeId = "i=84".parse().unwrap();
/// assert_eq!(parsed, NodeId::ROOT_FOLDER);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// The Root folder (ns=0;i=84), default start of an import.
    pub const ROOT_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(84),
    };

    /// The Objects folder (ns=0;i=85).
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(85),
    };

    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// Returns `true` if this is the null node ID (ns=0, i=0).
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, NodeIdentifier::Numeric(0))
    }

    /// Returns the numeric value if this is a numeric identifier.
    #[inline]
    pub fn as_numeric(&self) -> Option<u32> {
        match &self.identifier {
            NodeIdentifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value if this is a string identifier.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match &self.identifier {
            NodeIdentifier::String(v) => Some(v),
            _ => None,
        }
    }

    /// Converts to the OPC UA string format.
    ///
    /// Namespace 0 is omitted, matching how servers print standard nodes.
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }

    /// Returns the identifier kind as a display string.
    pub const fn identifier_type(&self) -> &'static str {
        match &self.identifier {
            NodeIdentifier::Numeric(_) => "Numeric",
            NodeIdentifier::String(_) => "String",
            NodeIdentifier::Guid(_) => "Guid",
            NodeIdentifier::Opaque(_) => "Opaque",
        }
    }

    /// Returns the raw identifier text without the type prefix.
    pub fn identifier_text(&self) -> String {
        match &self.identifier {
            NodeIdentifier::Numeric(v) => v.to_string(),
            NodeIdentifier::String(v) => v.clone(),
            NodeIdentifier::Guid(v) => v.to_string(),
            NodeIdentifier::Opaque(v) => BASE64.encode(v),
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::numeric(0, 0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    /// Parses a NodeId from OPC UA string format.
    ///
    /// Supported formats:
    /// - `ns=2;i=1001` (numeric)
    /// - `ns=2;s=MyNode` (string)
    /// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
    /// - `ns=2;b=SGVsbG8=` (opaque, base64 encoded)
    /// - `i=84` (namespace 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid =
            |reason: String| OpcUaError::configuration(ConfigurationError::invalid_node_id(s, reason));

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("Missing identifier after namespace".into()))?;
                let ns: u16 = ns
                    .parse()
                    .map_err(|_| invalid(format!("Invalid namespace index '{ns}'")))?;
                (ns, id)
            }
            None => (0, s),
        };

        let (prefix, value) = identifier_part
            .split_once('=')
            .ok_or_else(|| invalid("Expected i=, s=, g=, or b=".into()))?;

        let identifier = match prefix {
            "i" => NodeIdentifier::Numeric(
                value
                    .parse()
                    .map_err(|_| invalid("Invalid numeric identifier".into()))?,
            ),
            "s" => NodeIdentifier::String(value.to_string()),
            "g" => NodeIdentifier::Guid(
                Uuid::parse_str(value).map_err(|e| invalid(format!("Invalid GUID: {e}")))?,
            ),
            "b" => NodeIdentifier::Opaque(
                BASE64
                    .decode(value)
                    .map_err(|e| invalid(format!("Invalid base64: {e}")))?,
            ),
            other => return Err(invalid(format!("Unknown identifier type '{other}'"))),
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// OPC UA node identifier kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),
    /// String identifier.
    String(String),
    /// GUID identifier.
    Guid(Uuid),
    /// Opaque identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={v}"),
            Self::String(v) => write!(f, "s={v}"),
            Self::Guid(v) => write!(f, "g={v}"),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// StatusCode
// =============================================================================

/// OPC UA service result code.
///
/// The top two bits carry the severity: `00` Good, `01` Uncertain, `10` Bad.
/// Display prints the symbolic name, falling back to hex for unknown codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

macro_rules! status_codes {
    ($($name:ident = $value:literal => $text:literal,)+) => {
        impl StatusCode {
            $(
                #[doc = $text]
                pub const $name: StatusCode = StatusCode($value);
            )+

            /// Returns the symbolic name, if the code is known.
            pub fn name(&self) -> Option<&'static str> {
                match self.0 & 0xFFFF_0000 {
                    $($value => Some($text),)+
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    GOOD = 0x0000_0000 => "Good",
    UNCERTAIN = 0x4000_0000 => "Uncertain",
    BAD_UNEXPECTED_ERROR = 0x8001_0000 => "BadUnexpectedError",
    BAD_COMMUNICATION_ERROR = 0x8005_0000 => "BadCommunicationError",
    BAD_TIMEOUT = 0x800A_0000 => "BadTimeout",
    BAD_SERVER_NOT_CONNECTED = 0x800D_0000 => "BadServerNotConnected",
    BAD_IDENTITY_TOKEN_INVALID = 0x8020_0000 => "BadIdentityTokenInvalid",
    BAD_IDENTITY_TOKEN_REJECTED = 0x8021_0000 => "BadIdentityTokenRejected",
    BAD_SESSION_ID_INVALID = 0x8025_0000 => "BadSessionIdInvalid",
    BAD_SESSION_CLOSED = 0x8026_0000 => "BadSessionClosed",
    BAD_SESSION_NOT_ACTIVATED = 0x8027_0000 => "BadSessionNotActivated",
    BAD_NODE_ID_INVALID = 0x8033_0000 => "BadNodeIdInvalid",
    BAD_NODE_ID_UNKNOWN = 0x8034_0000 => "BadNodeIdUnknown",
    BAD_ATTRIBUTE_ID_INVALID = 0x8035_0000 => "BadAttributeIdInvalid",
    BAD_NOT_READABLE = 0x803A_0000 => "BadNotReadable",
    BAD_NOT_WRITABLE = 0x803B_0000 => "BadNotWritable",
    BAD_SECURITY_POLICY_REJECTED = 0x8055_0000 => "BadSecurityPolicyRejected",
    BAD_TYPE_MISMATCH = 0x8074_0000 => "BadTypeMismatch",
    BAD_TOO_MANY_SUBSCRIPTIONS = 0x8077_0000 => "BadTooManySubscriptions",
    BAD_NOT_CONNECTED = 0x808A_0000 => "BadNotConnected",
    BAD_NO_DATA = 0x809B_0000 => "BadNoData",
    BAD_INVALID_ARGUMENT = 0x80AB_0000 => "BadInvalidArgument",
    BAD_DISCONNECT = 0x80AD_0000 => "BadDisconnect",
    BAD_CONNECTION_CLOSED = 0x80AE_0000 => "BadConnectionClosed",
}

impl StatusCode {
    /// Returns `true` for Good codes.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` for Uncertain codes.
    #[inline]
    pub const fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// Returns `true` for Bad codes.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns `true` if the server closed the connection.
    #[inline]
    pub const fn is_connection_closed(&self) -> bool {
        self.0 & 0xFFFF_0000 == Self::BAD_CONNECTION_CLOSED.0
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::GOOD
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

// =============================================================================
// NodeClass
// =============================================================================

/// OPC UA node class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type node.
    ObjectType,
    /// Variable type node.
    VariableType,
    /// Reference type node.
    ReferenceType,
    /// Data type node.
    DataType,
    /// View node.
    View,
}

impl NodeClass {
    /// Returns the OPC UA bit mask value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from OPC UA value.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Object),
            2 => Some(Self::Variable),
            4 => Some(Self::Method),
            8 => Some(Self::ObjectType),
            16 => Some(Self::VariableType),
            32 => Some(Self::ReferenceType),
            64 => Some(Self::DataType),
            128 => Some(Self::View),
            _ => None,
        }
    }

    /// Returns `true` for the classes an import keeps.
    pub const fn is_importable(&self) -> bool {
        matches!(self, Self::Object | Self::Variable)
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "Object",
            Self::Variable => "Variable",
            Self::Method => "Method",
            Self::ObjectType => "ObjectType",
            Self::VariableType => "VariableType",
            Self::ReferenceType => "ReferenceType",
            Self::DataType => "DataType",
            Self::View => "View",
        };
        f.write_str(name)
    }
}

// =============================================================================
// AttributeId
// =============================================================================

/// The node attributes this interface reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttributeId {
    /// Node class attribute.
    NodeClass,
    /// Browse name attribute.
    BrowseName,
    /// Display name attribute.
    DisplayName,
    /// Value attribute.
    #[default]
    Value,
    /// Data type attribute.
    DataType,
    /// Access level attribute.
    AccessLevel,
}

impl AttributeId {
    /// Returns the OPC UA numeric value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::NodeClass => 2,
            Self::BrowseName => 3,
            Self::DisplayName => 4,
            Self::Value => 13,
            Self::DataType => 14,
            Self::AccessLevel => 17,
        }
    }
}

// =============================================================================
// AccessLevel
// =============================================================================

/// The AccessLevel attribute bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessLevel(pub u8);

impl AccessLevel {
    /// Current value may be read.
    pub const CURRENT_READ: u8 = 0x01;
    /// Current value may be written.
    pub const CURRENT_WRITE: u8 = 0x02;
    /// History may be read.
    pub const HISTORY_READ: u8 = 0x04;
    /// History may be written.
    pub const HISTORY_WRITE: u8 = 0x08;

    /// Returns `true` if CurrentRead is set.
    #[inline]
    pub const fn can_read(&self) -> bool {
        self.0 & Self::CURRENT_READ != 0
    }

    /// Returns `true` if CurrentWrite is set.
    #[inline]
    pub const fn can_write(&self) -> bool {
        self.0 & Self::CURRENT_WRITE != 0
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.can_read() {
            flags.push("CurrentRead");
        }
        if self.can_write() {
            flags.push("CurrentWrite");
        }
        if self.0 & Self::HISTORY_READ != 0 {
            flags.push("HistoryRead");
        }
        if self.0 & Self::HISTORY_WRITE != 0 {
            flags.push("HistoryWrite");
        }
        if flags.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&flags.join(", "))
        }
    }
}

// =============================================================================
// ScalarType
// =============================================================================

/// Built-in scalar types that can be written from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Boolean value.
    Boolean,
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit IEEE 754 float.
    Float,
    /// 64-bit IEEE 754 double.
    Double,
    /// UTF-8 string.
    String,
}

impl ScalarType {
    /// Returns the OPC UA type name, as a DataType node displays it.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarType {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Boolean),
            "sbyte" | "int8" | "i8" => Ok(Self::SByte),
            "byte" | "uint8" | "u8" => Ok(Self::Byte),
            "int16" | "i16" | "short" => Ok(Self::Int16),
            "uint16" | "u16" | "ushort" => Ok(Self::UInt16),
            "int32" | "i32" | "int" => Ok(Self::Int32),
            "uint32" | "u32" | "uint" => Ok(Self::UInt32),
            "int64" | "i64" | "long" => Ok(Self::Int64),
            "uint64" | "u64" | "ulong" => Ok(Self::UInt64),
            "float" | "f32" | "single" => Ok(Self::Float),
            "double" | "f64" => Ok(Self::Double),
            "string" | "str" => Ok(Self::String),
            _ => Err(OpcUaError::conversion(ConversionError::unsupported_type(s))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
