// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Production transport over the `opcua` crate client.
//!
//! The `opcua` client opens the TCP connection, the secure channel and the
//! session in one activation, so the connect steps map onto it as follows:
//!
//! | Step | Work done |
//! |------|-----------|
//! | `open` | TCP reachability probe of host and port |
//! | `open_secure_channel` | GetEndpoints over a None channel, a None endpoint must exist |
//! | `create_session` | builds the client from the session request |
//! | `activate_session` | creates the session on the None endpoint and activates it |
//!
//! Security policy and message mode are always None. The session's publish
//! loop runs on the `opcua` runtime; data changes and connection loss are
//! pushed through the installed [`TransportEventSender`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::{
    BrowseDescription, BrowseDescriptionResultMask, BrowseDirection, Client, ClientBuilder,
    ConnectionStatusCallback, DataChangeCallback, ExtensionObject, MessageSecurityMode,
    MonitoredItemCreateRequest, MonitoringMode, MonitoringParameters, ReadValueId,
    ReferenceTypeId, SecurityPolicy, Session, SessionCommand, TimestampsToReturn, WriteValue,
};
use opcua::client::prelude::{
    AttributeService, MonitoredItemService, SubscriptionService, ViewService,
};
use opcua::sync::RwLock as OpcUaRwLock;

use crate::client::transport::{
    DataValue, EndpointDescription, IdentityToken, MonitoredItemRequest, MonitoredItemResult,
    OpcUaTransport, OpcUaValue, ReferenceDescription, SessionRequest, TransportEvent,
    TransportEventSender, TransportTarget, UserTokenPolicy, UserTokenType,
};
use crate::config::{ApplicationIdentity, SubscriptionSettings};
use crate::error::{
    BrowseError, ConnectionError, OpcUaError, OpcUaResult, OperationError, SessionError,
    SubscriptionError,
};
use crate::types::{AttributeId, NodeClass, NodeId, NodeIdentifier, StatusCode};

type SharedSession = Arc<OpcUaRwLock<Session>>;

fn status_of(code: opcua::types::StatusCode) -> StatusCode {
    StatusCode(code.bits())
}

// =============================================================================
// RealOpcUaTransport
// =============================================================================

/// Transport backed by the `opcua` 0.12 client.
pub struct RealOpcUaTransport {
    target: Option<TransportTarget>,
    request: Option<SessionRequest>,
    endpoints: Vec<opcua::types::EndpointDescription>,
    session: Option<SharedSession>,
    session_stop: Option<tokio::sync::oneshot::Sender<SessionCommand>>,
    events: Option<TransportEventSender>,
    /// Monitored item id to client handle.
    item_handles: Arc<Mutex<HashMap<u32, u32>>>,
    open: bool,
}

impl RealOpcUaTransport {
    /// Creates an unopened transport.
    pub fn new() -> Self {
        Self {
            target: None,
            request: None,
            endpoints: Vec::new(),
            session: None,
            session_stop: None,
            events: None,
            item_handles: Arc::new(Mutex::new(HashMap::new())),
            open: false,
        }
    }

    fn endpoint_url(&self) -> String {
        self.target
            .as_ref()
            .map(TransportTarget::endpoint_url)
            .unwrap_or_default()
    }

    fn build_client(
        application: &ApplicationIdentity,
        request: Option<&SessionRequest>,
        target: &TransportTarget,
    ) -> OpcUaResult<Client> {
        let mut builder = ClientBuilder::new()
            .application_name(application.name.as_str())
            .application_uri(application.urn.as_str())
            .product_uri(application.product_uri.as_str())
            .trust_server_certs(true)
            .session_retry_limit(0);

        if let Some(request) = request {
            builder = builder
                .session_name(request.session_name.as_str())
                .session_timeout(u32::try_from(request.session_timeout.as_millis()).unwrap_or(u32::MAX));
        }

        builder = match &target.certificates {
            Some((certificate, private_key)) => builder
                .create_sample_keypair(false)
                .certificate_path(certificate)
                .private_key_path(private_key),
            None => builder.create_sample_keypair(true),
        };

        builder.client().ok_or_else(|| {
            OpcUaError::connection(ConnectionError::unreachable(
                target.endpoint_url(),
                "Invalid OPC UA client configuration",
            ))
        })
    }

    fn none_endpoint(&self) -> Option<&opcua::types::EndpointDescription> {
        let none_uri = SecurityPolicy::None.to_uri();
        self.endpoints.iter().find(|e| {
            e.security_policy_uri.as_ref() == none_uri && e.security_mode == MessageSecurityMode::None
        })
    }

    fn session(&self) -> OpcUaResult<SharedSession> {
        self.session.clone().ok_or_else(OpcUaError::not_connected)
    }

    fn read_value_id(node_id: &NodeId, attribute: AttributeId) -> ReadValueId {
        ReadValueId {
            node_id: Self::to_opcua_node_id(node_id),
            attribute_id: attribute.value(),
            index_range: opcua::types::UAString::null(),
            data_encoding: opcua::types::QualifiedName::null(),
        }
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    fn to_opcua_node_id(node_id: &NodeId) -> opcua::types::NodeId {
        let ns = node_id.namespace_index;
        match &node_id.identifier {
            NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(ns, *v),
            NodeIdentifier::String(v) => opcua::types::NodeId::new(ns, v.clone()),
            NodeIdentifier::Guid(v) => opcua::types::NodeId::new(ns, opcua::types::Guid::from(*v)),
            NodeIdentifier::Opaque(v) => {
                opcua::types::NodeId::new(ns, opcua::types::ByteString::from(v.as_slice()))
            }
        }
    }

    fn from_opcua_node_id(node_id: &opcua::types::NodeId) -> NodeId {
        let ns = node_id.namespace;
        match &node_id.identifier {
            opcua::types::Identifier::Numeric(v) => NodeId::numeric(ns, *v),
            opcua::types::Identifier::String(v) => NodeId::string(ns, v.as_ref()),
            opcua::types::Identifier::Guid(v) => {
                NodeId::guid(ns, uuid::Uuid::from_bytes(*v.as_bytes()))
            }
            opcua::types::Identifier::ByteString(v) => {
                NodeId::opaque(ns, v.value.clone().unwrap_or_default())
            }
        }
    }

    fn from_opcua_variant(variant: &opcua::types::Variant) -> OpcUaValue {
        use opcua::types::Variant;

        match variant {
            Variant::Empty => OpcUaValue::Null,
            Variant::Boolean(v) => OpcUaValue::Boolean(*v),
            Variant::SByte(v) => OpcUaValue::SByte(*v),
            Variant::Byte(v) => OpcUaValue::Byte(*v),
            Variant::Int16(v) => OpcUaValue::Int16(*v),
            Variant::UInt16(v) => OpcUaValue::UInt16(*v),
            Variant::Int32(v) => OpcUaValue::Int32(*v),
            Variant::UInt32(v) => OpcUaValue::UInt32(*v),
            Variant::Int64(v) => OpcUaValue::Int64(*v),
            Variant::UInt64(v) => OpcUaValue::UInt64(*v),
            Variant::Float(v) => OpcUaValue::Float(*v),
            Variant::Double(v) => OpcUaValue::Double(*v),
            Variant::String(v) => OpcUaValue::String(v.as_ref().to_string()),
            Variant::DateTime(v) => OpcUaValue::DateTime(v.as_chrono()),
            Variant::Guid(v) => OpcUaValue::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
            Variant::ByteString(v) => OpcUaValue::ByteString(v.value.clone().unwrap_or_default()),
            Variant::LocalizedText(v) => OpcUaValue::LocalizedText(v.text.as_ref().to_string()),
            Variant::NodeId(v) => OpcUaValue::NodeId(Self::from_opcua_node_id(v)),
            Variant::Array(arr) => {
                OpcUaValue::Array(arr.values.iter().map(Self::from_opcua_variant).collect())
            }
            other => OpcUaValue::String(format!("{other:?}")),
        }
    }

    fn to_opcua_variant(value: &OpcUaValue) -> opcua::types::Variant {
        use opcua::types::Variant;

        match value {
            OpcUaValue::Null => Variant::Empty,
            OpcUaValue::Boolean(v) => Variant::Boolean(*v),
            OpcUaValue::SByte(v) => Variant::SByte(*v),
            OpcUaValue::Byte(v) => Variant::Byte(*v),
            OpcUaValue::Int16(v) => Variant::Int16(*v),
            OpcUaValue::UInt16(v) => Variant::UInt16(*v),
            OpcUaValue::Int32(v) => Variant::Int32(*v),
            OpcUaValue::UInt32(v) => Variant::UInt32(*v),
            OpcUaValue::Int64(v) => Variant::Int64(*v),
            OpcUaValue::UInt64(v) => Variant::UInt64(*v),
            OpcUaValue::Float(v) => Variant::Float(*v),
            OpcUaValue::Double(v) => Variant::Double(*v),
            OpcUaValue::String(v) => Variant::String(opcua::types::UAString::from(v.as_str())),
            OpcUaValue::LocalizedText(v) => Variant::LocalizedText(Box::new(
                opcua::types::LocalizedText::new("", v.as_str()),
            )),
            OpcUaValue::DateTime(v) => Variant::DateTime(Box::new(opcua::types::DateTime::from(*v))),
            OpcUaValue::Guid(v) => Variant::Guid(Box::new(opcua::types::Guid::from(*v))),
            OpcUaValue::ByteString(v) => {
                Variant::ByteString(opcua::types::ByteString::from(v.as_slice()))
            }
            OpcUaValue::NodeId(v) => Variant::NodeId(Box::new(Self::to_opcua_node_id(v))),
            OpcUaValue::Array(arr) => {
                let variants: Vec<Variant> = arr.iter().map(Self::to_opcua_variant).collect();
                opcua::types::Array::new(opcua::types::VariantTypeId::Variant, variants)
                    .map(|a| Variant::Array(Box::new(a)))
                    .unwrap_or(Variant::Empty)
            }
        }
    }

    fn from_opcua_endpoint(endpoint: &opcua::types::EndpointDescription) -> EndpointDescription {
        let user_identity_tokens = endpoint
            .user_identity_tokens
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|policy| UserTokenPolicy {
                policy_id: policy.policy_id.as_ref().to_string(),
                token_type: match policy.token_type {
                    opcua::types::UserTokenType::Anonymous => UserTokenType::Anonymous,
                    opcua::types::UserTokenType::UserName => UserTokenType::UserName,
                    opcua::types::UserTokenType::Certificate => UserTokenType::Certificate,
                    opcua::types::UserTokenType::IssuedToken => UserTokenType::IssuedToken,
                },
            })
            .collect();

        EndpointDescription {
            endpoint_url: endpoint.endpoint_url.as_ref().to_string(),
            server_certificate: endpoint.server_certificate.value.clone(),
            user_identity_tokens,
        }
    }

    fn to_opcua_identity(identity: &IdentityToken) -> opcua::client::prelude::IdentityToken {
        match identity {
            IdentityToken::Anonymous { .. } => opcua::client::prelude::IdentityToken::Anonymous,
            IdentityToken::UserName {
                username, password, ..
            } => opcua::client::prelude::IdentityToken::UserName(username.clone(), password.clone()),
        }
    }
}

impl Default for RealOpcUaTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn open(&mut self, target: &TransportTarget) -> OpcUaResult<()> {
        let url = target.endpoint_url();
        tokio::net::TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(|e| OpcUaError::connection(ConnectionError::unreachable(&url, e.to_string())))?;

        debug!(endpoint = %url, "Server reachable");
        self.target = Some(target.clone());
        self.open = true;
        Ok(())
    }

    async fn open_secure_channel(&mut self) -> OpcUaResult<()> {
        let target = self.target.clone().ok_or_else(OpcUaError::not_connected)?;
        let url = target.endpoint_url();
        let client = Self::build_client(&ApplicationIdentity::default(), None, &target)?;

        self.endpoints = client.get_server_endpoints_from_url(url.as_str()).map_err(|e| {
            OpcUaError::connection(ConnectionError::unreachable(&url, format!("GetEndpoints: {e}")))
        })?;

        if self.none_endpoint().is_none() {
            return Err(OpcUaError::bad_status(
                url,
                StatusCode::BAD_SECURITY_POLICY_REJECTED,
            ));
        }
        debug!(endpoints = self.endpoints.len(), "Discovered endpoints");
        Ok(())
    }

    async fn create_session(&mut self, request: &SessionRequest) -> OpcUaResult<()> {
        let target = self.target.clone().ok_or_else(OpcUaError::not_connected)?;
        // Validates the client settings before activation builds it for real.
        Self::build_client(&request.application, Some(request), &target).map_err(|e| {
            OpcUaError::session(SessionError::create_failed(
                StatusCode::BAD_UNEXPECTED_ERROR,
                e.to_string(),
            ))
        })?;
        self.request = Some(request.clone());
        Ok(())
    }

    async fn get_endpoints(&mut self) -> OpcUaResult<Vec<EndpointDescription>> {
        Ok(self.endpoints.iter().map(Self::from_opcua_endpoint).collect())
    }

    async fn activate_session(&mut self, identity: &IdentityToken) -> OpcUaResult<()> {
        let target = self.target.clone().ok_or_else(OpcUaError::not_connected)?;
        let request = self.request.clone().ok_or_else(OpcUaError::not_connected)?;
        let endpoint = self.none_endpoint().cloned().ok_or_else(|| {
            OpcUaError::session(SessionError::activate_failed(
                StatusCode::BAD_SECURITY_POLICY_REJECTED,
                "No endpoint with security policy None",
            ))
        })?;

        let mut client = Self::build_client(&request.application, Some(&request), &target)?;
        let session = client
            .new_session_from_endpoint(endpoint, Self::to_opcua_identity(identity))
            .map_err(|e| {
                OpcUaError::session(SessionError::create_failed(status_of(e), e.to_string()))
            })?;

        session.write().connect_and_activate().map_err(|e| {
            OpcUaError::session(SessionError::activate_failed(status_of(e), e.to_string()))
        })?;

        if let Some(sender) = self.events.clone() {
            session
                .write()
                .set_connection_status_callback(ConnectionStatusCallback::new(move |connected| {
                    if !connected {
                        let _ = sender.send(TransportEvent::ConnectionClosed);
                    }
                }));
        }

        self.session_stop = Some(Session::run_async(session.clone()));
        self.session = Some(session);
        info!(
            endpoint = %target.endpoint_url(),
            policy_id = identity.policy_id(),
            "Session activated"
        );
        Ok(())
    }

    async fn close(&mut self) -> OpcUaResult<()> {
        if let Some(stop) = self.session_stop.take() {
            let _ = stop.send(SessionCommand::Stop);
        }
        if let Some(session) = self.session.take() {
            session.read().disconnect();
            debug!(endpoint = %self.endpoint_url(), "Session closed");
        }
        self.item_handles.lock().clear();
        self.endpoints.clear();
        self.request = None;
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_event_sender(&mut self, sender: TransportEventSender) {
        self.events = Some(sender);
    }

    async fn read(&self, node_id: &NodeId, attribute: AttributeId) -> OpcUaResult<DataValue> {
        let session = self.session()?;
        trace!(node_id = %node_id, attribute = ?attribute, "Reading attribute");

        let results = session
            .read()
            .read(&[Self::read_value_id(node_id, attribute)], TimestampsToReturn::Neither, 0.0)
            .map_err(|e| {
                OpcUaError::operation(OperationError::read_failed(
                    node_id.to_string(),
                    status_of(e),
                    e.to_string(),
                ))
            })?;

        let Some(data_value) = results.first() else {
            return Ok(DataValue::bad(StatusCode::BAD_UNEXPECTED_ERROR));
        };
        Ok(DataValue {
            value: data_value.value.as_ref().map(Self::from_opcua_variant),
            status: data_value.status.map(status_of).unwrap_or(StatusCode::GOOD),
        })
    }

    async fn write(&self, node_id: &NodeId, value: &OpcUaValue) -> OpcUaResult<StatusCode> {
        let session = self.session()?;
        trace!(node_id = %node_id, value = %value, "Writing value");

        let write = WriteValue {
            node_id: Self::to_opcua_node_id(node_id),
            attribute_id: AttributeId::Value.value(),
            index_range: opcua::types::UAString::null(),
            value: opcua::types::DataValue::new_now(Self::to_opcua_variant(value)),
        };

        let results = session.read().write(&[write]).map_err(|e| {
            OpcUaError::operation(OperationError::write_failed(
                node_id.to_string(),
                status_of(e),
                e.to_string(),
            ))
        })?;

        Ok(results
            .first()
            .copied()
            .map(status_of)
            .unwrap_or(StatusCode::BAD_UNEXPECTED_ERROR))
    }

    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<ReferenceDescription>> {
        let session = self.session()?;
        trace!(node_id = %node_id, "Browsing node");

        let browse_failed = |e: opcua::types::StatusCode| {
            OpcUaError::browse(BrowseError::browse_failed(
                node_id.to_string(),
                status_of(e),
                e.to_string(),
            ))
        };

        let description = BrowseDescription {
            node_id: Self::to_opcua_node_id(node_id),
            browse_direction: BrowseDirection::Forward,
            reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: BrowseDescriptionResultMask::all().bits(),
        };

        let mut references = Vec::new();
        let mut results = session
            .read()
            .browse(&[description])
            .map_err(browse_failed)?
            .unwrap_or_default();

        while let Some(result) = results.pop() {
            if result.status_code.is_bad() {
                return Err(browse_failed(result.status_code));
            }

            for reference in result.references.as_deref().unwrap_or_default() {
                let Some(node_class) = NodeClass::from_value(reference.node_class as u32) else {
                    continue;
                };
                references.push(ReferenceDescription {
                    node_id: Self::from_opcua_node_id(&reference.node_id.node_id),
                    browse_name: reference.browse_name.name.as_ref().to_string(),
                    display_name: reference.display_name.text.as_ref().to_string(),
                    node_class,
                });
            }

            // Servers page large reference lists behind continuation points.
            if !result.continuation_point.is_null() {
                results = session
                    .read()
                    .browse_next(false, &[result.continuation_point.clone()])
                    .map_err(browse_failed)?
                    .unwrap_or_default();
            }
        }

        Ok(references)
    }

    async fn create_subscription(&self, settings: &SubscriptionSettings) -> OpcUaResult<u32> {
        let session = self.session()?;
        let sender = self.events.clone();
        let handles = Arc::clone(&self.item_handles);

        let callback = DataChangeCallback::new(move |items| {
            let Some(sender) = &sender else {
                return;
            };
            for item in items {
                let Some(client_handle) = handles.lock().get(&item.id()).copied() else {
                    continue;
                };
                let value = item
                    .last_value()
                    .value
                    .as_ref()
                    .map(Self::from_opcua_variant)
                    .unwrap_or_default();
                let _ = sender.send(TransportEvent::DataChange {
                    client_handle,
                    value,
                });
            }
        });

        let subscription_id = session
            .read()
            .create_subscription(
                settings.publishing_interval.as_secs_f64() * 1000.0,
                settings.lifetime_count,
                settings.keepalive_count,
                settings.max_notifications_per_publish,
                settings.priority,
                settings.publishing_enabled,
                callback,
            )
            .map_err(|e| {
                OpcUaError::subscription(SubscriptionError::create_failed(status_of(e), e.to_string()))
            })?;

        debug!(subscription_id, "Created subscription");
        Ok(subscription_id)
    }

    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        request: &MonitoredItemRequest,
    ) -> OpcUaResult<MonitoredItemResult> {
        let session = self.session()?;

        let item = MonitoredItemCreateRequest {
            item_to_monitor: Self::read_value_id(&request.node_id, AttributeId::Value),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: request.client_handle,
                sampling_interval: request.sampling_interval.as_secs_f64() * 1000.0,
                filter: ExtensionObject::null(),
                queue_size: request.queue_size,
                discard_oldest: request.discard_oldest,
            },
        };

        let results = session
            .read()
            .create_monitored_items(subscription_id, TimestampsToReturn::Both, &[item])
            .map_err(|e| {
                OpcUaError::subscription(SubscriptionError::monitored_item_failed(
                    request.node_id.to_string(),
                    status_of(e),
                    e.to_string(),
                ))
            })?;

        let Some(result) = results.first() else {
            return Ok(MonitoredItemResult {
                status: StatusCode::BAD_UNEXPECTED_ERROR,
                monitored_item_id: 0,
            });
        };

        if result.status_code.is_good() {
            self.item_handles
                .lock()
                .insert(result.monitored_item_id, request.client_handle);
        } else {
            warn!(
                node_id = %request.node_id,
                status = %status_of(result.status_code),
                "Server rejected monitored item"
            );
        }

        Ok(MonitoredItemResult {
            status: status_of(result.status_code),
            monitored_item_id: result.monitored_item_id,
        })
    }

    async fn delete_monitored_items(&self, subscription_id: u32, item_ids: &[u32]) -> OpcUaResult<()> {
        if item_ids.is_empty() {
            return Ok(());
        }
        let session = self.session()?;

        {
            let mut handles = self.item_handles.lock();
            for id in item_ids {
                handles.remove(id);
            }
        }

        session
            .read()
            .delete_monitored_items(subscription_id, item_ids)
            .map_err(|e| {
                OpcUaError::subscription(SubscriptionError::delete_failed(subscription_id, e.to_string()))
            })?;
        trace!(subscription_id, count = item_ids.len(), "Deleted monitored items");
        Ok(())
    }

    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
        let session = self.session()?;
        session
            .read()
            .delete_subscription(subscription_id)
            .map_err(|e| {
                OpcUaError::subscription(SubscriptionError::delete_failed(subscription_id, e.to_string()))
            })?;
        trace!(subscription_id, "Deleted subscription");
        Ok(())
    }

    fn display_name(&self) -> String {
        format!("RealOpcUaTransport({})", self.endpoint_url())
    }
}

// =============================================================================
// Tests
// =============================================================================
