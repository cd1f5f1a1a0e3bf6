// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA interface error types.
//!
//! Errors are grouped by the layer that produced them. Every error can report
//! the OPC UA status code it carries (if any), which is how the interface
//! detects server-initiated connection closure.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Connect steps, closure, not connected
//! ├── Session       - Session create/activate, user token policy
//! ├── Browse        - Browse and import failures
//! ├── Operation     - Read/write failures
//! ├── Subscription  - Subscription groups and monitored items
//! ├── Conversion    - Value parsing and type mismatches
//! └── Configuration - Invalid settings
//! ```
//!
//! # Examples
//!
//! ```
//! use plantlink_opcua::error::{ConnectionError, OpcUaError};
//! use plantlink_opcua::types::StatusCode;
//!
//! let error = OpcUaError::connection(ConnectionError::closed(Some("server shutdown".into())));
//! assert!(error.is_connection_closed());
//! assert_eq!(error.status_code(), Some(StatusCode::BAD_CONNECTION_CLOSED));
//! ```

use std::fmt;

use thiserror::Error;
use tracing::Level;

use crate::client::ConnectStep;
use crate::types::StatusCode;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for OPC UA interface operations.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session lifecycle errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Node browsing errors.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Read/write operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Subscription and monitoring errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Value conversion errors.
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a session error.
    #[inline]
    pub fn session(error: SessionError) -> Self {
        Self::Session(error)
    }

    /// Creates a browse error.
    #[inline]
    pub fn browse(error: BrowseError) -> Self {
        Self::Browse(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a subscription error.
    #[inline]
    pub fn subscription(error: SubscriptionError) -> Self {
        Self::Subscription(error)
    }

    /// Creates a conversion error.
    #[inline]
    pub fn conversion(error: ConversionError) -> Self {
        Self::Conversion(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a connection closed error.
    pub fn connection_closed(reason: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::closed(Some(reason.into())))
    }

    /// Creates an error from a bad status returned by the server.
    pub fn bad_status(node_id: impl Into<String>, status: StatusCode) -> Self {
        Self::Operation(OperationError::bad_status(node_id, status))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns the OPC UA status code carried by this error, if any.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Connection(e) => e.status_code(),
            Self::Session(e) => e.status_code(),
            Self::Browse(e) => e.status_code(),
            Self::Operation(e) => e.status_code(),
            Self::Subscription(e) => e.status_code(),
            Self::Conversion(_) | Self::Configuration(_) => None,
        }
    }

    /// Returns `true` if the server closed the connection.
    ///
    /// This is the trigger for the interface's closure handling.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::Connection(ConnectionError::Closed { .. }))
            || self.status_code().is_some_and(|s| s.is_connection_closed())
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Session(e) => e.is_retryable(),
            Self::Browse(_) => true,
            Self::Operation(e) => e.is_retryable(),
            Self::Subscription(e) => e.is_retryable(),
            Self::Conversion(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Session(e) => e.severity(),
            Self::Browse(_) => ErrorSeverity::Warning,
            Self::Operation(_) => ErrorSeverity::Warning,
            Self::Subscription(_) => ErrorSeverity::Error,
            Self::Conversion(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Browse(_) => "browse",
            Self::Operation(_) => "operation",
            Self::Subscription(_) => "subscription",
            Self::Conversion(_) => "conversion",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Session(e) => e.error_code(),
            Self::Browse(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::Subscription(e) => e.error_code(),
            Self::Conversion(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();
        let status = self.status_code().map(|s| s.to_string());

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                status = ?status,
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                status = ?status,
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                status = ?status,
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// One of the connect negotiation steps failed.
    #[error("Connect step '{step}' failed [{status}]: {message}")]
    StepFailed {
        /// The step that failed.
        step: ConnectStep,
        /// Status reported for the step.
        status: StatusCode,
        /// Detail message.
        message: String,
    },

    /// The server could not be reached.
    #[error("OPC UA server '{endpoint}' unreachable: {message}")]
    Unreachable {
        /// Target endpoint.
        endpoint: String,
        /// Detail message.
        message: String,
    },

    /// Connection closed by the server.
    #[error("Connection closed by server{}", reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed {
        /// Reason for closure.
        reason: Option<String>,
    },

    /// Not connected.
    #[error("Not connected to OPC UA server")]
    NotConnected,
}

impl ConnectionError {
    /// Creates a step failure.
    pub fn step_failed(step: ConnectStep, status: StatusCode, message: impl Into<String>) -> Self {
        Self::StepFailed {
            step,
            status,
            message: message.into(),
        }
    }

    /// Creates an unreachable error.
    pub fn unreachable(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Returns the status code carried by this error.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::StepFailed { status, .. } => Some(*status),
            Self::Unreachable { .. } => Some(StatusCode::BAD_COMMUNICATION_ERROR),
            Self::Closed { .. } => Some(StatusCode::BAD_CONNECTION_CLOSED),
            Self::NotConnected => Some(StatusCode::BAD_NOT_CONNECTED),
        }
    }

    /// Returns the connect step this error belongs to, if any.
    pub fn step(&self) -> Option<ConnectStep> {
        match self {
            Self::StepFailed { step, .. } => Some(*step),
            Self::Unreachable { .. } => Some(ConnectStep::Transport),
            _ => None,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StepFailed { status, .. } => *status != StatusCode::BAD_IDENTITY_TOKEN_REJECTED,
            _ => true,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Closed { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::StepFailed { step, .. } => ErrorCode::new(1, 0x10 + step.ordinal()),
            Self::Unreachable { .. } => ErrorCode::new(1, 1),
            Self::Closed { .. } => ErrorCode::new(1, 2),
            Self::NotConnected => ErrorCode::new(1, 3),
        }
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session lifecycle errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session creation rejected by the server.
    #[error("Failed to create session [{status}]: {message}")]
    CreateFailed {
        /// Status returned by the server.
        status: StatusCode,
        /// Detail message.
        message: String,
    },

    /// Session activation rejected by the server.
    #[error("Failed to activate session [{status}]: {message}")]
    ActivateFailed {
        /// Status returned by the server.
        status: StatusCode,
        /// Detail message.
        message: String,
    },

    /// The server publishes no endpoint offering a user name token.
    #[error("No endpoint of '{endpoint}' offers a UserName token policy")]
    NoUserTokenPolicy {
        /// Server endpoint.
        endpoint: String,
    },
}

impl SessionError {
    /// Creates a session creation failure.
    pub fn create_failed(status: StatusCode, message: impl Into<String>) -> Self {
        Self::CreateFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a session activation failure.
    pub fn activate_failed(status: StatusCode, message: impl Into<String>) -> Self {
        Self::ActivateFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a missing user token policy error.
    pub fn no_user_token_policy(endpoint: impl Into<String>) -> Self {
        Self::NoUserTokenPolicy {
            endpoint: endpoint.into(),
        }
    }

    /// Returns the status code carried by this error.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::CreateFailed { status, .. } | Self::ActivateFailed { status, .. } => {
                Some(*status)
            }
            Self::NoUserTokenPolicy { .. } => Some(StatusCode::BAD_IDENTITY_TOKEN_INVALID),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CreateFailed { .. } => true,
            Self::ActivateFailed { status, .. } => {
                *status != StatusCode::BAD_IDENTITY_TOKEN_REJECTED
            }
            Self::NoUserTokenPolicy { .. } => false,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NoUserTokenPolicy { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CreateFailed { .. } => ErrorCode::new(2, 1),
            Self::ActivateFailed { .. } => ErrorCode::new(2, 2),
            Self::NoUserTokenPolicy { .. } => ErrorCode::new(2, 3),
        }
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Node browsing errors.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// Browse request failed.
    #[error("Failed to browse node '{node_id}' [{status}]: {message}")]
    BrowseFailed {
        /// The node being browsed.
        node_id: String,
        /// Status returned by the server.
        status: StatusCode,
        /// Detail message.
        message: String,
    },

    /// The start node of an import is not a valid node id.
    #[error("Invalid import root '{node_id}': {reason}")]
    InvalidRoot {
        /// The offending node id.
        node_id: String,
        /// Reason.
        reason: String,
    },
}

impl BrowseError {
    /// Creates a browse failure.
    pub fn browse_failed(
        node_id: impl Into<String>,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates an invalid root error.
    pub fn invalid_root(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRoot {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns the status code carried by this error.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::BrowseFailed { status, .. } => Some(*status),
            Self::InvalidRoot { .. } => Some(StatusCode::BAD_NODE_ID_INVALID),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::BrowseFailed { .. } => ErrorCode::new(3, 1),
            Self::InvalidRoot { .. } => ErrorCode::new(3, 2),
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Read/write operation errors.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Read request failed.
    #[error("Failed to read node '{node_id}' [{status}]: {message}")]
    ReadFailed {
        /// The node.
        node_id: String,
        /// Status code.
        status: StatusCode,
        /// Detail message.
        message: String,
    },

    /// Write request failed.
    #[error("Failed to write node '{node_id}' [{status}]: {message}")]
    WriteFailed {
        /// The node.
        node_id: String,
        /// Status code.
        status: StatusCode,
        /// Detail message.
        message: String,
    },

    /// The server answered with a bad status.
    #[error("Node '{node_id}' returned {status}")]
    BadStatus {
        /// The node.
        node_id: String,
        /// Status code.
        status: StatusCode,
    },
}

impl OperationError {
    /// Creates a read failure.
    pub fn read_failed(
        node_id: impl Into<String>,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a write failure.
    pub fn write_failed(
        node_id: impl Into<String>,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status: StatusCode) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status,
        }
    }

    /// Returns the status code carried by this error.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::ReadFailed { status, .. }
            | Self::WriteFailed { status, .. }
            | Self::BadStatus { status, .. } => Some(*status),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.status_code().is_some_and(|s| {
            s == StatusCode::BAD_TIMEOUT
                || s == StatusCode::BAD_COMMUNICATION_ERROR
                || s.is_connection_closed()
        })
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ReadFailed { .. } => ErrorCode::new(4, 1),
            Self::WriteFailed { .. } => ErrorCode::new(4, 2),
            Self::BadStatus { .. } => ErrorCode::new(4, 3),
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription and monitoring errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Creating a subscription group failed.
    #[error("Failed to create subscription [{status}]: {message}")]
    CreateFailed {
        /// Status code.
        status: StatusCode,
        /// Detail message.
        message: String,
    },

    /// Creating a monitored item failed.
    #[error("Failed to create monitored item for '{node_id}' [{status}]: {message}")]
    MonitoredItemFailed {
        /// The node.
        node_id: String,
        /// Status code.
        status: StatusCode,
        /// Detail message.
        message: String,
    },

    /// Deleting a subscription group or its items failed.
    #[error("Failed to delete subscription {subscription_id}: {message}")]
    DeleteFailed {
        /// Server subscription id.
        subscription_id: u32,
        /// Detail message.
        message: String,
    },

    /// Subscribing requires an active connection.
    #[error("Cannot subscribe to '{node_id}' before connecting")]
    NotConnected {
        /// The node.
        node_id: String,
    },
}

impl SubscriptionError {
    /// Creates a subscription creation failure.
    pub fn create_failed(status: StatusCode, message: impl Into<String>) -> Self {
        Self::CreateFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a monitored item failure.
    pub fn monitored_item_failed(
        node_id: impl Into<String>,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self::MonitoredItemFailed {
            node_id: node_id.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a deletion failure.
    pub fn delete_failed(subscription_id: u32, message: impl Into<String>) -> Self {
        Self::DeleteFailed {
            subscription_id,
            message: message.into(),
        }
    }

    /// Creates a not connected error.
    pub fn not_connected(node_id: impl Into<String>) -> Self {
        Self::NotConnected {
            node_id: node_id.into(),
        }
    }

    /// Returns the status code carried by this error.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::CreateFailed { status, .. } | Self::MonitoredItemFailed { status, .. } => {
                Some(*status)
            }
            Self::DeleteFailed { .. } => None,
            Self::NotConnected { .. } => Some(StatusCode::BAD_NOT_CONNECTED),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CreateFailed { status, .. } => *status != StatusCode::BAD_TOO_MANY_SUBSCRIPTIONS,
            Self::MonitoredItemFailed { .. } => true,
            Self::DeleteFailed { .. } => false,
            Self::NotConnected { .. } => true,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CreateFailed { .. } => ErrorCode::new(5, 1),
            Self::MonitoredItemFailed { .. } => ErrorCode::new(5, 2),
            Self::DeleteFailed { .. } => ErrorCode::new(5, 3),
            Self::NotConnected { .. } => ErrorCode::new(5, 4),
        }
    }
}

// =============================================================================
// ConversionError
// =============================================================================

/// Value conversion errors.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Value has a different type than expected.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type.
        expected: String,
        /// Actual type.
        actual: String,
    },

    /// Text could not be parsed into the requested type.
    #[error("Cannot parse '{input}' as {data_type}: {reason}")]
    ParseFailed {
        /// Target type name.
        data_type: String,
        /// Input text.
        input: String,
        /// Reason.
        reason: String,
    },

    /// The type name is not a supported scalar type.
    #[error("Unsupported data type '{type_name}'")]
    UnsupportedType {
        /// The type name.
        type_name: String,
    },
}

impl ConversionError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a parse failure.
    pub fn parse_failed(
        data_type: impl Into<String>,
        input: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ParseFailed {
            data_type: data_type.into(),
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::TypeMismatch { .. } => ErrorCode::new(6, 1),
            Self::ParseFailed { .. } => ErrorCode::new(6, 2),
            Self::UnsupportedType { .. } => ErrorCode::new(6, 3),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Required field is missing or empty.
    #[error("Missing required configuration field '{field}'")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// Field has an invalid value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },

    /// A write-node pattern is not a valid regular expression.
    #[error("Invalid write node pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern.
        pattern: String,
        /// Reason.
        reason: String,
    },

    /// Node id text is not in OPC UA string format.
    #[error("Invalid node id '{node_id}': {reason}")]
    InvalidNodeId {
        /// The node id text.
        node_id: String,
        /// Reason.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingField { .. } => ErrorCode::new(7, 1),
            Self::InvalidValue { .. } => ErrorCode::new(7, 2),
            Self::InvalidPattern { .. } => ErrorCode::new(7, 3),
            Self::InvalidNodeId { .. } => ErrorCode::new(7, 4),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
///
/// Format: `UA-XXYY` where XX is category and YY is specific error.
///
/// Categories:
/// - 1: Connection
/// - 2: Session
/// - 3: Browse
/// - 4: Operation
/// - 5: Subscription
/// - 6: Conversion
/// - 7: Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category.
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with OpcUaError.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================
