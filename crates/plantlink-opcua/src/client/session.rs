// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection and session lifecycle.
//!
//! [`ConnectionManager`] owns the transport and drives the connect
//! negotiation one step at a time:
//!
//! ```text
//! Transport ──► SecureChannel ──► CreateSession ──► ActivateSession
//!  (tcp open)    (None/None)       (app, name,       (anonymous "0" or
//!                                   timeout)          first UserName policy)
//! ```
//!
//! A failing step aborts the attempt and is reported as
//! [`ConnectionError::StepFailed`] naming the step. Reconnection is polled:
//! the host asks [`ConnectionManager::reconnect_due`] from its update loop.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::client::transport::{
    IdentityToken, OpcUaTransport, SessionRequest, TransportTarget, UserTokenType,
};
use crate::config::InterfaceConfig;
use crate::error::{ConfigurationError, ConnectionError, OpcUaError, OpcUaResult, SessionError};
use crate::types::StatusCode;

// =============================================================================
// ConnectStep
// =============================================================================

/// One step of the connect negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectStep {
    /// TCP transport open.
    Transport,
    /// Secure channel open.
    SecureChannel,
    /// CreateSession.
    CreateSession,
    /// ActivateSession, including endpoint discovery for user tokens.
    ActivateSession,
}

impl ConnectStep {
    /// Returns the step's position in the negotiation, starting at 1.
    pub const fn ordinal(&self) -> u8 {
        match self {
            Self::Transport => 1,
            Self::SecureChannel => 2,
            Self::CreateSession => 3,
            Self::ActivateSession => 4,
        }
    }

    /// Returns the step name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::SecureChannel => "secure-channel",
            Self::CreateSession => "create-session",
            Self::ActivateSession => "activate-session",
        }
    }
}

impl fmt::Display for ConnectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ReconnectPolicy
// =============================================================================

/// Fixed-interval reconnect policy with unbounded retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    interval: Duration,
}

impl ReconnectPolicy {
    /// Creates a policy. A zero interval disables reconnecting.
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Returns the interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` if the policy reconnects at all.
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Returns `true` once strictly more than the interval has elapsed.
    pub fn is_due(&self, last_attempt: Option<Instant>, now: Instant) -> bool {
        if !self.is_enabled() {
            return false;
        }
        match last_attempt {
            Some(last) => now.saturating_duration_since(last) > self.interval,
            None => true,
        }
    }
}

// =============================================================================
// ConnectionManager
// =============================================================================

/// Owns the transport and the connected/reconnecting status.
pub struct ConnectionManager<T: OpcUaTransport> {
    transport: T,
    config: InterfaceConfig,
    policy: ReconnectPolicy,
    connected: bool,
    reconnecting: bool,
    last_connect_attempt: Option<Instant>,
    stats: SessionStats,
}

impl<T: OpcUaTransport> ConnectionManager<T> {
    /// Creates a manager. Nothing is contacted until [`connect`](Self::connect).
    pub fn new(transport: T, config: InterfaceConfig) -> Self {
        let policy = ReconnectPolicy::new(config.reconnect_interval);
        Self {
            transport,
            config,
            policy,
            connected: false,
            reconnecting: false,
            last_connect_attempt: None,
            stats: SessionStats::new(),
        }
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Returns the configuration.
    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    /// Returns the reconnect policy.
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Returns the session statistics.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Returns `true` while a session is active.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns `true` while the reconnect loop is armed.
    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting
    }

    /// Returns the instant of the last connect attempt.
    pub fn last_connect_attempt(&self) -> Option<Instant> {
        self.last_connect_attempt
    }

    /// Arms the reconnect loop after the server dropped the connection.
    pub fn mark_connection_lost(&mut self) {
        self.reconnecting = true;
    }

    /// Disarms the reconnect loop.
    pub fn cancel_reconnect(&mut self) {
        if self.reconnecting {
            tracing::info!(server = %self.config.endpoint_url(), "Reconnect cancelled");
        }
        self.reconnecting = false;
    }

    /// Returns `true` if the host should attempt a reconnect at `now`.
    pub fn reconnect_due(&self, now: Instant) -> bool {
        !self.connected && self.reconnecting && self.policy.is_due(self.last_connect_attempt, now)
    }

    /// Connects now.
    pub async fn connect(&mut self) -> OpcUaResult<()> {
        self.connect_at(Instant::now()).await
    }

    /// Connects, stamping `now` as the attempt instant.
    ///
    /// The attempt first arms the reconnect loop and clears `connected`, so
    /// a failed first connect keeps retrying. Success disarms it.
    pub async fn connect_at(&mut self, now: Instant) -> OpcUaResult<()> {
        self.last_connect_attempt = Some(now);
        self.reconnecting = true;
        self.connected = false;
        self.stats.record_attempt();

        if self.config.server_ip.trim().is_empty() {
            let error = OpcUaError::configuration(ConfigurationError::missing_field("server_ip"));
            error.log("connect");
            self.stats.record_failure();
            return Err(error);
        }

        if self.transport.is_open() {
            tracing::debug!("Closing stale transport before connecting");
            if let Err(e) = self.transport.close().await {
                tracing::debug!(error = %e, "Stale transport close failed");
            }
        }

        match self.negotiate().await {
            Ok(()) => {
                self.connected = true;
                self.reconnecting = false;
                self.stats.record_connect();
                tracing::info!(
                    server = %self.config.endpoint_url(),
                    transport = %self.transport.display_name(),
                    "Connected to OPC UA server"
                );
                Ok(())
            }
            Err(error) => {
                self.stats.record_failure();
                error.log("connect");
                if let Err(e) = self.transport.close().await {
                    tracing::debug!(error = %e, "Transport close after failed connect");
                }
                Err(error)
            }
        }
    }

    /// Closes the transport and clears `connected`. The reconnect flag is
    /// left as is.
    pub async fn close(&mut self) {
        if let Err(e) = self.transport.close().await {
            e.log("disconnect");
        }
        if self.connected {
            self.stats.record_disconnect();
        }
        self.connected = false;
    }

    async fn negotiate(&mut self) -> OpcUaResult<()> {
        let target = self.target();
        tracing::debug!(
            endpoint = %target.endpoint_url(),
            certificates = target.certificates.is_some(),
            "Opening transport"
        );
        self.transport
            .open(&target)
            .await
            .map_err(|e| step_error(ConnectStep::Transport, e))?;

        tracing::debug!("Opening secure channel (None)");
        self.transport
            .open_secure_channel()
            .await
            .map_err(|e| step_error(ConnectStep::SecureChannel, e))?;

        let request = SessionRequest {
            application: self.config.application.clone(),
            session_name: self.config.session_name.clone(),
            session_timeout: self.config.session_timeout,
        };
        tracing::debug!(session = %request.session_name, "Creating session");
        self.transport
            .create_session(&request)
            .await
            .map_err(|e| step_error(ConnectStep::CreateSession, e))?;

        let identity = self
            .identity()
            .await
            .map_err(|e| step_error(ConnectStep::ActivateSession, e))?;
        tracing::debug!(policy_id = identity.policy_id(), "Activating session");
        self.transport
            .activate_session(&identity)
            .await
            .map_err(|e| step_error(ConnectStep::ActivateSession, e))
    }

    fn target(&self) -> TransportTarget {
        let certificates = self.config.certificate_pair();
        if certificates.is_none() && self.config.certificates.is_some() {
            tracing::info!("Certificate pair incomplete, connecting without certificates");
        }
        TransportTarget {
            host: self.config.server_ip.clone(),
            port: self.config.server_port,
            certificates,
        }
    }

    async fn identity(&mut self) -> OpcUaResult<IdentityToken> {
        let Some(credentials) = self.config.active_credentials().cloned() else {
            return Ok(IdentityToken::anonymous());
        };

        let endpoints = self.transport.get_endpoints().await?;
        let server_certificate = endpoints
            .iter()
            .find_map(|e| e.server_certificate.clone());
        let policy_id = endpoints
            .iter()
            .flat_map(|e| e.user_identity_tokens.iter())
            .find(|p| p.token_type == UserTokenType::UserName)
            .map(|p| p.policy_id.clone())
            .ok_or_else(|| {
                OpcUaError::session(SessionError::no_user_token_policy(self.config.endpoint_url()))
            })?;

        Ok(IdentityToken::UserName {
            policy_id,
            username: credentials.username,
            password: credentials.password,
            server_certificate,
        })
    }
}

impl<T: OpcUaTransport> fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.config.endpoint_url())
            .field("connected", &self.connected)
            .field("reconnecting", &self.reconnecting)
            .finish()
    }
}

fn step_error(step: ConnectStep, error: OpcUaError) -> OpcUaError {
    let status = error
        .status_code()
        .unwrap_or(StatusCode::BAD_COMMUNICATION_ERROR);
    OpcUaError::connection(ConnectionError::step_failed(step, status, error.to_string()))
}

// =============================================================================
// SessionStats
// =============================================================================

/// Counters for connect activity.
#[derive(Debug, Default)]
pub struct SessionStats {
    attempts: AtomicU64,
    connects: AtomicU64,
    failures: AtomicU64,
    disconnects: AtomicU64,
}

impl SessionStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of connect attempts.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Returns the number of successful connects.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Returns the number of failed connects.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns the number of disconnects of a live session.
    pub fn disconnects(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================
