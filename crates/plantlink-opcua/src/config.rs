// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Interface configuration.
//!
//! [`InterfaceConfig`] carries everything the interface needs to reach a
//! server, negotiate a session, and decide how imported nodes are subscribed.
//! All durations are (de)serialized in humantime format (`"2s"`, `"500ms"`).
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use plantlink_opcua::config::InterfaceConfig;
//!
//! let config = InterfaceConfig::builder()
//!     .server("192.168.0.10", 4840)
//!     .credentials("operator", "secret")
//!     .reconnect_interval(Duration::from_secs(5))
//!     .write_node_pattern(r"\.Cmd$")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.endpoint_url(), "opc.tcp://192.168.0.10:4840");
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, OpcUaError};
use crate::types::NodeId;

// =============================================================================
// InterfaceConfig
// =============================================================================

/// Configuration of one OPC UA interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Server host name or IP address.
    #[serde(default = "default_server_ip")]
    pub server_ip: String,

    /// Server TCP port.
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Requested session timeout.
    #[serde(default = "default_session_timeout")]
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Session name sent with CreateSession.
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Node the default import starts from. Empty means the Root folder.
    #[serde(default)]
    pub top_node_id: String,

    /// Application description sent with CreateSession.
    #[serde(default)]
    pub application: ApplicationIdentity,

    /// Client certificate pair. Used only when both paths are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates: Option<CertificatePaths>,

    /// User credentials. An empty or missing username activates anonymously.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,

    /// Fixed delay between reconnect attempts. Zero disables reconnecting.
    #[serde(default = "default_reconnect_interval")]
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,

    /// Monitored items per subscription group. Zero means unbounded.
    #[serde(default)]
    pub max_nodes_per_subscription: usize,

    /// Regexes matched against node ids; matching variables become write-only.
    #[serde(default)]
    pub write_node_patterns: Vec<String>,

    /// Treat variables with CurrentWrite access as write-only inputs.
    #[serde(default)]
    pub auto_input_on_write: bool,

    /// Subscribe readable variables created by an import.
    #[serde(default = "default_true")]
    pub auto_subscribe_on_import: bool,

    /// Subscription group and monitored item parameters.
    #[serde(default)]
    pub subscription: SubscriptionSettings,
}

fn default_server_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    4840
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_session_name() -> String {
    "urn:plantlink:session".to_string()
}

fn default_reconnect_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_true() -> bool {
    true
}

impl InterfaceConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> InterfaceConfigBuilder {
        InterfaceConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), OpcUaError> {
        if self.server_ip.trim().is_empty() {
            return Err(OpcUaError::configuration(ConfigurationError::missing_field(
                "server_ip",
            )));
        }

        if self.server_port == 0 {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "server_port",
                "Port must be greater than 0",
            )));
        }

        if self.session_timeout.is_zero() {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "session_timeout",
                "Session timeout must be greater than 0",
            )));
        }

        if !self.top_node_id.trim().is_empty() {
            self.top_node_id.parse::<NodeId>()?;
        }

        for pattern in &self.write_node_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                OpcUaError::configuration(ConfigurationError::invalid_pattern(pattern, e.to_string()))
            })?;
        }

        Ok(())
    }

    /// Returns the `opc.tcp://` URL of the configured server.
    pub fn endpoint_url(&self) -> String {
        format!("opc.tcp://{}:{}", self.server_ip, self.server_port)
    }

    /// Returns the resolved certificate pair, if both paths are configured.
    pub fn certificate_pair(&self) -> Option<(PathBuf, PathBuf)> {
        self.certificates.as_ref().and_then(CertificatePaths::resolve)
    }

    /// Returns the credentials to activate with, if a username is configured.
    pub fn active_credentials(&self) -> Option<&Credentials> {
        self.credentials
            .as_ref()
            .filter(|c| !c.username.trim().is_empty())
    }

    /// Returns the import start node, `None` meaning the Root folder.
    pub fn top_node(&self) -> Option<&str> {
        let id = self.top_node_id.trim();
        (!id.is_empty()).then_some(id)
    }
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            server_ip: default_server_ip(),
            server_port: default_server_port(),
            session_timeout: default_session_timeout(),
            session_name: default_session_name(),
            top_node_id: String::new(),
            application: ApplicationIdentity::default(),
            certificates: None,
            credentials: None,
            reconnect_interval: default_reconnect_interval(),
            max_nodes_per_subscription: 0,
            write_node_patterns: Vec::new(),
            auto_input_on_write: false,
            auto_subscribe_on_import: true,
            subscription: SubscriptionSettings::default(),
        }
    }
}

// =============================================================================
// ApplicationIdentity
// =============================================================================

/// Client application description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationIdentity {
    /// Application name.
    #[serde(default = "default_application_name")]
    pub name: String,

    /// Application URN.
    #[serde(default = "default_application_urn")]
    pub urn: String,

    /// Product URI.
    #[serde(default = "default_product_uri")]
    pub product_uri: String,
}

fn default_application_name() -> String {
    "plantlink".to_string()
}

fn default_application_urn() -> String {
    "urn:plantlink".to_string()
}

fn default_product_uri() -> String {
    "uri:plantlink".to_string()
}

impl Default for ApplicationIdentity {
    fn default() -> Self {
        Self {
            name: default_application_name(),
            urn: default_application_urn(),
            product_uri: default_product_uri(),
        }
    }
}

// =============================================================================
// CertificatePaths
// =============================================================================

/// Client certificate and private key, relative to a base directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificatePaths {
    /// Directory the two paths are joined to.
    #[serde(default)]
    pub base_dir: PathBuf,

    /// Public certificate file (DER).
    #[serde(default)]
    pub public_certificate: String,

    /// Private key file (PEM).
    #[serde(default)]
    pub private_key: String,
}

impl CertificatePaths {
    /// Returns the joined paths, or `None` unless both are set.
    pub fn resolve(&self) -> Option<(PathBuf, PathBuf)> {
        if self.public_certificate.trim().is_empty() || self.private_key.trim().is_empty() {
            return None;
        }
        Some((
            self.base_dir.join(&self.public_certificate),
            self.base_dir.join(&self.private_key),
        ))
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Username and password for session activation.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// User name.
    #[serde(default)]
    pub username: String,

    /// Password.
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// Parameters for subscription groups and their monitored items.
///
/// A zero publishing or sampling interval asks the server for its fastest
/// supported rate; the server revises it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Requested publishing interval.
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Lifetime count (publishing intervals before the subscription expires).
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Max keep-alive count.
    #[serde(default = "default_keepalive_count")]
    pub keepalive_count: u32,

    /// Maximum notifications per publish. Zero means no limit.
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    /// Priority relative to other subscriptions of the session.
    #[serde(default)]
    pub priority: u8,

    /// Whether publishing starts enabled.
    #[serde(default = "default_true")]
    pub publishing_enabled: bool,

    /// Requested sampling interval of each monitored item.
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub sampling_interval: Duration,

    /// Server-side queue size of each monitored item.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Drop the oldest queued value on overflow instead of the newest.
    #[serde(default)]
    pub discard_oldest: bool,
}

fn default_lifetime_count() -> u32 {
    1000
}

fn default_keepalive_count() -> u32 {
    10
}

fn default_queue_size() -> u32 {
    100
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            publishing_interval: Duration::ZERO,
            lifetime_count: default_lifetime_count(),
            keepalive_count: default_keepalive_count(),
            max_notifications_per_publish: 0,
            priority: 0,
            publishing_enabled: true,
            sampling_interval: Duration::ZERO,
            queue_size: default_queue_size(),
            discard_oldest: false,
        }
    }
}

// =============================================================================
// InterfaceConfigBuilder
// =============================================================================

/// Builder for [`InterfaceConfig`].
#[derive(Debug, Default)]
pub struct InterfaceConfigBuilder {
    config: InterfaceConfig,
}

impl InterfaceConfigBuilder {
    /// Sets the server address and port.
    pub fn server(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.config.server_ip = ip.into();
        self.config.server_port = port;
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// Sets the session name.
    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.config.session_name = name.into();
        self
    }

    /// Sets the default import start node.
    pub fn top_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.config.top_node_id = node_id.into();
        self
    }

    /// Sets the application identity.
    pub fn application(
        mut self,
        name: impl Into<String>,
        urn: impl Into<String>,
        product_uri: impl Into<String>,
    ) -> Self {
        self.config.application = ApplicationIdentity {
            name: name.into(),
            urn: urn.into(),
            product_uri: product_uri.into(),
        };
        self
    }

    /// Sets the client certificate pair.
    pub fn certificates(
        mut self,
        base_dir: impl Into<PathBuf>,
        public_certificate: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        self.config.certificates = Some(CertificatePaths {
            base_dir: base_dir.into(),
            public_certificate: public_certificate.into(),
            private_key: private_key.into(),
        });
        self
    }

    /// Sets username and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the reconnect interval.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval = interval;
        self
    }

    /// Sets the maximum monitored items per subscription group.
    pub fn max_nodes_per_subscription(mut self, max: usize) -> Self {
        self.config.max_nodes_per_subscription = max;
        self
    }

    /// Adds a write-node regex.
    pub fn write_node_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.write_node_patterns.push(pattern.into());
        self
    }

    /// Sets whether writable variables become inputs.
    pub fn auto_input_on_write(mut self, enabled: bool) -> Self {
        self.config.auto_input_on_write = enabled;
        self
    }

    /// Sets whether imported readable variables are subscribed.
    pub fn auto_subscribe_on_import(mut self, enabled: bool) -> Self {
        self.config.auto_subscribe_on_import = enabled;
        self
    }

    /// Sets subscription parameters.
    pub fn subscription(mut self, settings: SubscriptionSettings) -> Self {
        self.config.subscription = settings;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<InterfaceConfig, OpcUaError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// humantime_serde helper
// =============================================================================

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InterfaceConfig::default();
        assert_eq!(config.endpoint_url(), "opc.tcp://127.0.0.1:4840");
        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert_eq!(config.reconnect_interval, Duration::from_secs(2));
        assert_eq!(config.max_nodes_per_subscription, 0);
        assert!(config.auto_subscribe_on_import);
        assert!(!config.auto_input_on_write);
        assert_eq!(config.subscription.lifetime_count, 1000);
        assert_eq!(config.subscription.queue_size, 100);
        assert!(config.top_node().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_validation() {
        assert!(InterfaceConfig::builder().server("", 4840).build().is_err());
        assert!(InterfaceConfig::builder().server("plc", 0).build().is_err());
        assert!(InterfaceConfig::builder()
            .session_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(InterfaceConfig::builder()
            .write_node_pattern("([unclosed")
            .build()
            .is_err());
        assert!(InterfaceConfig::builder()
            .top_node_id("ns=2;x=1")
            .build()
            .is_err());
    }

    #[test]
    fn test_certificate_pair_requires_both_paths() {
        let config = InterfaceConfig::builder()
            .certificates("/etc/plantlink/pki", "client.der", "")
            .build()
            .unwrap();
        assert!(config.certificate_pair().is_none());

        let config = InterfaceConfig::builder()
            .certificates("/etc/plantlink/pki", "client.der", "client.pem")
            .build()
            .unwrap();
        let (cert, key) = config.certificate_pair().unwrap();
        assert_eq!(cert, PathBuf::from("/etc/plantlink/pki/client.der"));
        assert_eq!(key, PathBuf::from("/etc/plantlink/pki/client.pem"));
    }

    #[test]
    fn test_empty_username_is_anonymous() {
        let config = InterfaceConfig::builder().credentials("", "pw").build().unwrap();
        assert!(config.active_credentials().is_none());

        let config = InterfaceConfig::builder()
            .credentials("operator", "pw")
            .build()
            .unwrap();
        assert_eq!(config.active_credentials().unwrap().username, "operator");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("operator", "hunter2"));
        assert!(debug.contains("operator"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_deserialize_humantime() {
        let json = r#"{
            "server_ip": "10.0.0.5",
            "reconnect_interval": "500ms",
            "subscription": { "publishing_interval": "100ms", "queue_size": 10 }
        }"#;
        let config: InterfaceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server_ip, "10.0.0.5");
        assert_eq!(config.server_port, 4840);
        assert_eq!(config.reconnect_interval, Duration::from_millis(500));
        assert_eq!(config.subscription.publishing_interval, Duration::from_millis(100));
        assert_eq!(config.subscription.queue_size, 10);
        assert_eq!(config.subscription.lifetime_count, 1000);
    }
}
