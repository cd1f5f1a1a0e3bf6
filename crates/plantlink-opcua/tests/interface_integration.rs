// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OpcUaInterface integration tests.
//!
//! Most tests run against [`MockTransport`], which records every service
//! call and serves a scripted address space. Tests against a live server are
//! `#[ignore]`d and need the `real-transport` feature:
//!
//! ```bash
//! PLANTLINK_TEST_ENDPOINT=127.0.0.1:4840 \
//!     cargo test -p plantlink-opcua --features real-transport -- --ignored
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use plantlink_opcua::client::{
    DataValue, EndpointDescription, IdentityToken, MonitoredItemRequest, MonitoredItemResult,
    ReferenceDescription, SessionRequest, TransportEventSender, TransportTarget, UserTokenPolicy,
    UserTokenType, FIRST_CLIENT_HANDLE,
};
use plantlink_opcua::{
    AccessLevel, AttributeId, BrowseError, CollectorListener, ConfigurationError, ConnectStep,
    ConnectionError, ConnectionManager, EventListener, FnListener, InterfaceConfig,
    InterfaceEvent, InterfaceHook, NodeCatalog, NodeClass, NodeId, NodeSubscription,
    NodeUpdateListener, OpcUaError, OpcUaInterface, OpcUaResult, OpcUaTransport, OpcUaValue,
    StatusCode, SubscriptionError, SubscriptionSettings, TransportEvent,
};

// =============================================================================
// Mock Transport
// =============================================================================

/// A recorded service call.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Open,
    SecureChannel,
    CreateSession,
    GetEndpoints,
    Activate(IdentityToken),
    Close,
    Read(String, AttributeId),
    Write(String, OpcUaValue),
    Browse(String),
    CreateSubscription,
    CreateMonitoredItem {
        subscription_id: u32,
        node_id: String,
        client_handle: u32,
    },
    DeleteMonitoredItems(u32, Vec<u32>),
    DeleteSubscription(u32),
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    tree: HashMap<String, Vec<ReferenceDescription>>,
    attributes: HashMap<(String, AttributeId), DataValue>,
    write_status: HashMap<String, StatusCode>,
    browse_failures: HashSet<String>,
    endpoints: Vec<EndpointDescription>,
    fail_step: Option<ConnectStep>,
    reject_subscriptions: bool,
    closed: bool,
    open: bool,
    next_subscription_id: u32,
    next_item_id: u32,
    sender: Option<TransportEventSender>,
}

/// Scripted OPC UA server. Clones share state, so a test keeps one clone
/// for inspection while the interface owns another.
#[derive(Clone, Default)]
struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

fn id(s: &str) -> NodeId {
    s.parse().unwrap()
}

fn type_node(type_name: &str) -> NodeId {
    match type_name {
        "Boolean" => NodeId::numeric(0, 1),
        "Int32" => NodeId::numeric(0, 6),
        "Double" => NodeId::numeric(0, 11),
        "String" => NodeId::numeric(0, 12),
        _ => NodeId::numeric(0, 24),
    }
}

impl MockTransport {
    fn new() -> Self {
        Self::default()
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn fail_step(&self, step: Option<ConnectStep>) {
        self.state.lock().fail_step = step;
    }

    fn set_closed(&self, closed: bool) {
        self.state.lock().closed = closed;
    }

    fn reject_subscriptions(&self, reject: bool) {
        self.state.lock().reject_subscriptions = reject;
    }

    fn set_endpoints(&self, endpoints: Vec<EndpointDescription>) {
        self.state.lock().endpoints = endpoints;
    }

    fn fail_browse(&self, node_id: &str) {
        self.state.lock().browse_failures.insert(id(node_id).to_string());
    }

    fn set_write_status(&self, node_id: &str, status: StatusCode) {
        self.state.lock().write_status.insert(id(node_id).to_string(), status);
    }

    fn set_attribute(&self, node_id: &str, attribute: AttributeId, value: DataValue) {
        self.state
            .lock()
            .attributes
            .insert((id(node_id).to_string(), attribute), value);
    }

    fn set_value(&self, node_id: &str, value: OpcUaValue) {
        self.set_attribute(node_id, AttributeId::Value, DataValue::good(value));
    }

    fn set_access_level(&self, node_id: &str, bits: u8) {
        self.set_attribute(node_id, AttributeId::AccessLevel, DataValue::good(OpcUaValue::Byte(bits)));
    }

    fn add_reference(&self, parent: &str, node_id: &str, name: &str, node_class: NodeClass) {
        self.state
            .lock()
            .tree
            .entry(id(parent).to_string())
            .or_default()
            .push(ReferenceDescription {
                node_id: id(node_id),
                browse_name: name.to_string(),
                display_name: name.to_string(),
                node_class,
            });
    }

    fn add_object(&self, parent: &str, node_id: &str, name: &str) {
        self.add_reference(parent, node_id, name, NodeClass::Object);
        self.set_access_level(node_id, AccessLevel::CURRENT_READ);
    }

    fn add_variable(&self, parent: &str, node_id: &str, name: &str, value: OpcUaValue, type_name: &str) {
        self.add_reference(parent, node_id, name, NodeClass::Variable);
        self.set_access_level(node_id, AccessLevel::CURRENT_READ);
        let data_type = type_node(type_name);
        self.set_attribute(
            node_id,
            AttributeId::DataType,
            DataValue::good(OpcUaValue::NodeId(data_type.clone())),
        );
        self.set_attribute(
            &data_type.to_string(),
            AttributeId::DisplayName,
            DataValue::good(OpcUaValue::LocalizedText(type_name.to_string())),
        );
        self.set_value(node_id, value);
    }

    fn push(&self, event: TransportEvent) {
        let sender = self.state.lock().sender.clone();
        sender.expect("event sender installed").send(event).unwrap();
    }

    fn step(&self, step: ConnectStep, call: Call) -> OpcUaResult<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.fail_step == Some(step) {
            return Err(OpcUaError::bad_status(
                "mock",
                match step {
                    ConnectStep::Transport => StatusCode::BAD_COMMUNICATION_ERROR,
                    ConnectStep::SecureChannel => StatusCode::BAD_SECURITY_POLICY_REJECTED,
                    ConnectStep::CreateSession => StatusCode::BAD_TOO_MANY_SUBSCRIPTIONS,
                    ConnectStep::ActivateSession => StatusCode::BAD_IDENTITY_TOKEN_REJECTED,
                },
            ));
        }
        Ok(())
    }

    fn request(&self, call: Call) -> OpcUaResult<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.closed {
            return Err(OpcUaError::connection_closed("server shut down"));
        }
        Ok(())
    }
}

#[async_trait]
impl OpcUaTransport for MockTransport {
    async fn open(&mut self, _target: &TransportTarget) -> OpcUaResult<()> {
        self.step(ConnectStep::Transport, Call::Open)?;
        self.state.lock().open = true;
        Ok(())
    }

    async fn open_secure_channel(&mut self) -> OpcUaResult<()> {
        self.step(ConnectStep::SecureChannel, Call::SecureChannel)
    }

    async fn create_session(&mut self, _request: &SessionRequest) -> OpcUaResult<()> {
        self.step(ConnectStep::CreateSession, Call::CreateSession)
    }

    async fn get_endpoints(&mut self) -> OpcUaResult<Vec<EndpointDescription>> {
        let mut state = self.state.lock();
        state.calls.push(Call::GetEndpoints);
        Ok(state.endpoints.clone())
    }

    async fn activate_session(&mut self, identity: &IdentityToken) -> OpcUaResult<()> {
        self.step(ConnectStep::ActivateSession, Call::Activate(identity.clone()))
    }

    async fn close(&mut self) -> OpcUaResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Close);
        state.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn set_event_sender(&mut self, sender: TransportEventSender) {
        self.state.lock().sender = Some(sender);
    }

    async fn read(&self, node_id: &NodeId, attribute: AttributeId) -> OpcUaResult<DataValue> {
        self.request(Call::Read(node_id.to_string(), attribute))?;
        Ok(self
            .state
            .lock()
            .attributes
            .get(&(node_id.to_string(), attribute))
            .cloned()
            .unwrap_or_else(|| DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID)))
    }

    async fn write(&self, node_id: &NodeId, value: &OpcUaValue) -> OpcUaResult<StatusCode> {
        self.request(Call::Write(node_id.to_string(), value.clone()))?;
        Ok(self
            .state
            .lock()
            .write_status
            .get(&node_id.to_string())
            .copied()
            .unwrap_or(StatusCode::GOOD))
    }

    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<ReferenceDescription>> {
        let key = node_id.to_string();
        self.request(Call::Browse(key.clone()))?;
        let state = self.state.lock();
        if state.browse_failures.contains(&key) {
            return Err(OpcUaError::browse(BrowseError::browse_failed(
                key,
                StatusCode::BAD_NODE_ID_UNKNOWN,
                "unknown node",
            )));
        }
        Ok(state.tree.get(&key).cloned().unwrap_or_default())
    }

    async fn create_subscription(&self, _settings: &SubscriptionSettings) -> OpcUaResult<u32> {
        self.request(Call::CreateSubscription)?;
        let mut state = self.state.lock();
        if state.reject_subscriptions {
            return Err(OpcUaError::subscription(SubscriptionError::create_failed(
                StatusCode::BAD_TOO_MANY_SUBSCRIPTIONS,
                "limit reached",
            )));
        }
        state.next_subscription_id += 1;
        Ok(state.next_subscription_id)
    }

    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        request: &MonitoredItemRequest,
    ) -> OpcUaResult<MonitoredItemResult> {
        self.request(Call::CreateMonitoredItem {
            subscription_id,
            node_id: request.node_id.to_string(),
            client_handle: request.client_handle,
        })?;
        let mut state = self.state.lock();
        let monitored_item_id = 100 + state.next_item_id;
        state.next_item_id += 1;
        Ok(MonitoredItemResult {
            status: StatusCode::GOOD,
            monitored_item_id,
        })
    }

    async fn delete_monitored_items(&self, subscription_id: u32, item_ids: &[u32]) -> OpcUaResult<()> {
        self.request(Call::DeleteMonitoredItems(subscription_id, item_ids.to_vec()))
    }

    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
        self.request(Call::DeleteSubscription(subscription_id))
    }

    fn display_name(&self) -> String {
        "MockTransport".to_string()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn config() -> InterfaceConfig {
    InterfaceConfig::builder().server("127.0.0.1", 4840).build().unwrap()
}

async fn connected(mock: &MockTransport, config: InterfaceConfig) -> OpcUaInterface<MockTransport> {
    let mut interface = OpcUaInterface::new(mock.clone(), config).unwrap();
    assert!(interface.connect().await);
    interface
}

fn collector(interface: &mut OpcUaInterface<MockTransport>) -> (Arc<CollectorListener>, Arc<dyn EventListener>) {
    let collector = Arc::new(CollectorListener::new());
    let listener: Arc<dyn EventListener> = collector.clone();
    interface.add_event_listener(Arc::downgrade(&listener));
    (collector, listener)
}

fn recording_listener(
    log: &Arc<Mutex<Vec<String>>>,
    tag: &'static str,
) -> Arc<dyn NodeUpdateListener> {
    let log = Arc::clone(log);
    FnListener::new(move |sub: &NodeSubscription, value: &OpcUaValue| {
        log.lock().push(format!("{tag}:{}={value}", sub.node_id));
    })
}

fn noop_listener() -> Arc<dyn NodeUpdateListener> {
    FnListener::new(|_: &NodeSubscription, _: &OpcUaValue| {})
}

/// Line -> Conveyor (Object) -> Speed (Double), Running (Boolean)
fn conveyor_line(mock: &MockTransport) {
    mock.add_object("ns=2;s=Line", "ns=2;s=Line.Conveyor", "Conveyor");
    mock.add_variable(
        "ns=2;s=Line.Conveyor",
        "ns=2;s=Line.Conveyor.Speed",
        "Speed",
        OpcUaValue::Double(1.5),
        "Double",
    );
    mock.add_variable(
        "ns=2;s=Line.Conveyor",
        "ns=2;s=Line.Conveyor.Running",
        "Running",
        OpcUaValue::Boolean(true),
        "Boolean",
    );
}

#[derive(Default)]
struct RecordingHook {
    imports: AtomicUsize,
    imported_nodes: AtomicUsize,
    changes: Mutex<Vec<bool>>,
}

impl InterfaceHook for RecordingHook {
    fn on_connection_changed(&self, connected: bool) {
        self.changes.lock().push(connected);
    }

    fn on_nodes_imported(&self, catalog: &NodeCatalog) {
        self.imports.fetch_add(1, Ordering::SeqCst);
        self.imported_nodes.store(catalog.len(), Ordering::SeqCst);
    }
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_connect_runs_steps_in_order_with_anonymous_identity() {
    let mock = MockTransport::new();
    let interface = connected(&mock, config()).await;

    assert!(interface.is_connected());
    assert!(!interface.is_reconnecting());
    assert_eq!(
        mock.calls(),
        vec![
            Call::Open,
            Call::SecureChannel,
            Call::CreateSession,
            Call::Activate(IdentityToken::anonymous()),
        ]
    );
}

#[tokio::test]
async fn test_username_identity_uses_server_policy_and_certificate() {
    let mock = MockTransport::new();
    mock.set_endpoints(vec![
        EndpointDescription {
            endpoint_url: "opc.tcp://127.0.0.1:4840".into(),
            server_certificate: None,
            user_identity_tokens: vec![UserTokenPolicy {
                policy_id: "anonymous".into(),
                token_type: UserTokenType::Anonymous,
            }],
        },
        EndpointDescription {
            endpoint_url: "opc.tcp://127.0.0.1:4840".into(),
            server_certificate: Some(vec![0xde, 0xad]),
            user_identity_tokens: vec![UserTokenPolicy {
                policy_id: "username_basic".into(),
                token_type: UserTokenType::UserName,
            }],
        },
    ]);
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .credentials("operator", "secret")
        .build()
        .unwrap();

    let _interface = connected(&mock, config).await;

    let activate = mock
        .calls()
        .into_iter()
        .find(|c| matches!(c, Call::Activate(_)))
        .unwrap();
    assert_eq!(
        activate,
        Call::Activate(IdentityToken::UserName {
            policy_id: "username_basic".into(),
            username: "operator".into(),
            password: "secret".into(),
            server_certificate: Some(vec![0xde, 0xad]),
        })
    );
}

#[tokio::test]
async fn test_missing_username_policy_fails_activation() {
    let mock = MockTransport::new();
    mock.set_endpoints(vec![EndpointDescription::default()]);
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .credentials("operator", "secret")
        .build()
        .unwrap();

    let mut manager = ConnectionManager::new(mock.clone(), config);
    let err = manager.connect().await.unwrap_err();

    match err {
        OpcUaError::Connection(ConnectionError::StepFailed { step, .. }) => {
            assert_eq!(step, ConnectStep::ActivateSession)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!manager.is_connected());
    assert!(manager.is_reconnecting());
    assert_eq!(mock.count(|c| matches!(c, Call::Activate(_))), 0);
    assert!(!mock.state.lock().open);
}

#[tokio::test]
async fn test_failed_step_is_reported() {
    let mock = MockTransport::new();
    mock.fail_step(Some(ConnectStep::SecureChannel));

    let mut manager = ConnectionManager::new(mock.clone(), config());
    let err = manager.connect().await.unwrap_err();

    match &err {
        OpcUaError::Connection(e) => assert_eq!(e.step(), Some(ConnectStep::SecureChannel)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.status_code(), Some(StatusCode::BAD_SECURITY_POLICY_REJECTED));
    assert_eq!(manager.stats().failures(), 1);
    assert_eq!(mock.count(|c| *c == Call::CreateSession), 0);

    let mut interface = OpcUaInterface::new(mock.clone(), config()).unwrap();
    assert!(!interface.connect().await);
    assert!(interface.is_reconnecting());
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let mut config = config();
    config.write_node_patterns.push("([unclosed".into());

    let err = OpcUaInterface::new(MockTransport::new(), config).unwrap_err();
    assert!(matches!(
        err,
        OpcUaError::Configuration(ConfigurationError::InvalidPattern { .. })
    ));
}

#[tokio::test]
async fn test_events_are_deferred_to_tick() {
    let mock = MockTransport::new();
    let hook = Arc::new(RecordingHook::default());
    let mut interface = OpcUaInterface::new(mock.clone(), config())
        .unwrap()
        .with_hook(hook.clone());
    let (events, _keep) = collector(&mut interface);
    let mut broadcast = interface.subscribe_events();

    assert!(interface.connect().await);
    assert!(events.events().is_empty());
    assert_eq!(*hook.changes.lock(), vec![true]);

    interface.tick().await;
    assert_eq!(events.events(), vec![InterfaceEvent::Connected]);
    assert_eq!(broadcast.recv().await.unwrap(), InterfaceEvent::Connected);

    interface.disconnect().await;
    assert_eq!(events.events(), vec![InterfaceEvent::Connected, InterfaceEvent::Disconnected]);
    assert_eq!(*hook.changes.lock(), vec![true, false]);

    // Disconnect while disconnected is a no-op.
    interface.disconnect().await;
    assert_eq!(events.count(InterfaceEvent::Disconnected), 1);
}

// =============================================================================
// Reconnection
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnect_waits_strictly_longer_than_interval() {
    let mock = MockTransport::new();
    mock.fail_step(Some(ConnectStep::Transport));
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .reconnect_interval(Duration::from_millis(2000))
        .build()
        .unwrap();
    let mut interface = OpcUaInterface::new(mock.clone(), config).unwrap();

    let start = Instant::now();
    assert!(!interface.connect_at(start).await);
    assert!(interface.is_reconnecting());
    assert_eq!(interface.session_stats().attempts(), 1);

    interface.tick_at(start + Duration::from_millis(1000)).await;
    assert_eq!(interface.session_stats().attempts(), 1);

    interface.tick_at(start + Duration::from_millis(2000)).await;
    assert_eq!(interface.session_stats().attempts(), 1);

    mock.fail_step(None);
    interface.tick_at(start + Duration::from_millis(2001)).await;
    assert_eq!(interface.session_stats().attempts(), 2);
    assert!(interface.is_connected());
    assert!(!interface.is_reconnecting());
}

#[tokio::test(start_paused = true)]
async fn test_retries_keep_the_same_interval() {
    let mock = MockTransport::new();
    mock.fail_step(Some(ConnectStep::Transport));
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .reconnect_interval(Duration::from_millis(500))
        .build()
        .unwrap();
    let mut interface = OpcUaInterface::new(mock.clone(), config).unwrap();

    let start = Instant::now();
    interface.connect_at(start).await;
    for step in 1..=5u64 {
        interface.tick_at(start + Duration::from_millis(501 * step)).await;
    }
    assert_eq!(interface.session_stats().attempts(), 6);
    assert!(interface.is_reconnecting());

    interface.cancel_reconnect();
    interface.tick_at(start + Duration::from_secs(60)).await;
    assert_eq!(interface.session_stats().attempts(), 6);
    assert!(!interface.is_reconnecting());
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_disables_reconnect() {
    let mock = MockTransport::new();
    mock.fail_step(Some(ConnectStep::Transport));
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .reconnect_interval(Duration::ZERO)
        .build()
        .unwrap();
    let mut interface = OpcUaInterface::new(mock.clone(), config).unwrap();

    let start = Instant::now();
    interface.connect_at(start).await;
    interface.tick_at(start + Duration::from_secs(3600)).await;
    assert_eq!(interface.session_stats().attempts(), 1);
}

// =============================================================================
// Subscriptions
// =============================================================================

#[tokio::test]
async fn test_duplicate_subscribe_shares_one_monitored_item() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = recording_listener(&log, "first");
    let second = recording_listener(&log, "second");

    let a = interface.subscribe("ns=2;s=Speed", Arc::downgrade(&first)).await.unwrap();
    let b = interface.subscribe("ns=2;s=Speed", Arc::downgrade(&second)).await.unwrap();

    assert_eq!(a.subscription.client_handle, FIRST_CLIENT_HANDLE);
    assert_eq!(a.subscription.client_handle, b.subscription.client_handle);
    assert_ne!(a.registration, b.registration);
    assert_eq!(mock.count(|c| matches!(c, Call::CreateMonitoredItem { .. })), 1);
    assert_eq!(mock.count(|c| *c == Call::CreateSubscription), 1);
    assert_eq!(interface.registry().listener_count("ns=2;s=Speed"), 2);

    mock.push(TransportEvent::DataChange {
        client_handle: a.subscription.client_handle,
        value: OpcUaValue::Int32(7),
    });
    interface.tick().await;

    assert_eq!(
        *log.lock(),
        vec!["first:ns=2;s=Speed=7".to_string(), "second:ns=2;s=Speed=7".to_string()]
    );
}

#[tokio::test]
async fn test_spellings_of_one_node_share_a_monitored_item() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let listener = noop_listener();

    let short = interface.subscribe("i=2258", Arc::downgrade(&listener)).await.unwrap();
    let long = interface.subscribe("ns=0;i=2258", Arc::downgrade(&listener)).await.unwrap();

    assert_eq!(short.subscription.client_handle, long.subscription.client_handle);
    assert_eq!(long.subscription.node_id, "i=2258");
    assert_eq!(mock.count(|c| matches!(c, Call::CreateMonitoredItem { .. })), 1);
    assert_eq!(interface.registry().listener_count("ns=0;i=2258"), 2);
    assert!(interface.unsubscribe(&long));
    assert_eq!(interface.registry().listener_count("i=2258"), 1);
}

#[tokio::test]
async fn test_unsubscribe_keeps_monitored_item() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = recording_listener(&log, "first");
    let second = recording_listener(&log, "second");

    let a = interface.subscribe("ns=2;s=Speed", Arc::downgrade(&first)).await.unwrap();
    interface.subscribe("ns=2;s=Speed", Arc::downgrade(&second)).await.unwrap();

    assert!(interface.unsubscribe(&a));
    assert!(!interface.unsubscribe(&a));
    assert!(interface.registry().get("ns=2;s=Speed").is_some());

    mock.push(TransportEvent::DataChange {
        client_handle: a.subscription.client_handle,
        value: OpcUaValue::Int32(1),
    });
    interface.tick().await;
    assert_eq!(*log.lock(), vec!["second:ns=2;s=Speed=1".to_string()]);
}

#[tokio::test]
async fn test_dropped_listener_stops_receiving() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let listener = recording_listener(&log, "gone");

    let handle = interface.subscribe("ns=2;s=Speed", Arc::downgrade(&listener)).await.unwrap();
    drop(listener);

    mock.push(TransportEvent::DataChange {
        client_handle: handle.subscription.client_handle,
        value: OpcUaValue::Int32(1),
    });
    interface.tick().await;
    assert!(log.lock().is_empty());
    assert_eq!(interface.registry().listener_count("ns=2;s=Speed"), 0);
}

#[tokio::test]
async fn test_unknown_client_handle_is_dropped() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;

    mock.push(TransportEvent::DataChange {
        client_handle: 999,
        value: OpcUaValue::Int32(1),
    });
    interface.tick().await;
    assert_eq!(interface.registry_stats().dropped, 1);
    assert_eq!(interface.registry_stats().dispatched, 0);
}

#[tokio::test]
async fn test_groups_are_batched_by_max_nodes() {
    let mock = MockTransport::new();
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .max_nodes_per_subscription(2)
        .build()
        .unwrap();
    let mut interface = connected(&mock, config).await;
    let listener = noop_listener();

    for i in 0..5 {
        interface
            .subscribe(&format!("ns=2;i={}", 1000 + i), Arc::downgrade(&listener))
            .await
            .unwrap();
    }

    assert_eq!(interface.registry().group_sizes(), vec![2, 2, 1]);
    assert_eq!(mock.count(|c| *c == Call::CreateSubscription), 3);
    let stats = interface.registry_stats();
    assert_eq!(stats.groups, 3);
    assert_eq!(stats.subscribing_nodes, 5);
}

#[tokio::test]
async fn test_unbounded_group_when_max_is_zero() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let listener = noop_listener();

    for i in 0..4 {
        interface
            .subscribe(&format!("ns=2;i={i}"), Arc::downgrade(&listener))
            .await
            .unwrap();
    }
    assert_eq!(interface.registry().group_sizes(), vec![4]);
}

#[tokio::test]
async fn test_rejected_group_still_returns_handle() {
    let mock = MockTransport::new();
    mock.reject_subscriptions(true);
    let mut interface = connected(&mock, config()).await;
    let listener = noop_listener();

    let handle = interface.subscribe("ns=2;s=Speed", Arc::downgrade(&listener)).await.unwrap();

    assert_eq!(handle.subscription.subscription_id, None);
    assert_eq!(handle.subscription.monitored_item_id, None);
    assert_eq!(mock.count(|c| matches!(c, Call::CreateMonitoredItem { .. })), 0);
}

#[tokio::test]
async fn test_subscribe_requires_connection() {
    let mut interface = OpcUaInterface::new(MockTransport::new(), config()).unwrap();
    let listener = noop_listener();

    let err = interface
        .subscribe("ns=2;s=Speed", Arc::downgrade(&listener))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OpcUaError::Subscription(SubscriptionError::NotConnected { .. })
    ));
}

#[tokio::test]
async fn test_disconnect_tears_down_every_group() {
    let mock = MockTransport::new();
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .max_nodes_per_subscription(2)
        .build()
        .unwrap();
    let mut interface = connected(&mock, config).await;
    let (events, _keep) = collector(&mut interface);
    let listener = noop_listener();

    for node in ["ns=2;s=A", "ns=2;s=B", "ns=2;s=C"] {
        interface.subscribe(node, Arc::downgrade(&listener)).await.unwrap();
    }
    mock.clear_calls();

    interface.disconnect().await;

    assert_eq!(
        mock.calls(),
        vec![
            Call::DeleteMonitoredItems(1, vec![100, 101]),
            Call::DeleteSubscription(1),
            Call::DeleteMonitoredItems(2, vec![102]),
            Call::DeleteSubscription(2),
            Call::Close,
        ]
    );
    assert!(interface.registry().is_empty());
    assert_eq!(interface.registry().next_client_handle(), FIRST_CLIENT_HANDLE);
    assert_eq!(events.count(InterfaceEvent::Disconnected), 1);

    assert!(interface.connect().await);
    let handle = interface.subscribe("ns=2;s=D", Arc::downgrade(&listener)).await.unwrap();
    assert_eq!(handle.subscription.client_handle, FIRST_CLIENT_HANDLE);
}

#[tokio::test]
async fn test_data_change_updates_catalog_value() {
    let mock = MockTransport::new();
    conveyor_line(&mock);
    let mut interface = connected(&mock, config()).await;
    interface.import_nodes_from("ns=2;s=Line").await;

    let listener = noop_listener();
    let handles = interface.subscribe_catalog(listener.clone()).await;
    assert_eq!(handles.len(), 2);

    let speed = handles
        .iter()
        .find(|h| h.subscription.node_id == "ns=2;s=Line.Conveyor.Speed")
        .unwrap();
    mock.push(TransportEvent::DataChange {
        client_handle: speed.subscription.client_handle,
        value: OpcUaValue::Double(2.25),
    });
    interface.tick().await;

    let node = interface.node("ns=2;s=Line.Conveyor.Speed").unwrap();
    assert_eq!(node.value, Some(OpcUaValue::Double(2.25)));
}

#[tokio::test]
async fn test_spawned_dispatcher_delivers_without_tick() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let listener: Arc<dyn NodeUpdateListener> =
        FnListener::new(move |_: &NodeSubscription, value: &OpcUaValue| {
            let _ = tx.send(value.clone());
        });
    let handle = interface.subscribe("ns=2;s=Speed", Arc::downgrade(&listener)).await.unwrap();

    assert!(interface.spawn_dispatcher());
    assert!(!interface.spawn_dispatcher());

    mock.push(TransportEvent::DataChange {
        client_handle: handle.subscription.client_handle,
        value: OpcUaValue::Int32(42),
    });
    let value = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value, OpcUaValue::Int32(42));

    mock.push(TransportEvent::ConnectionClosed);
    tokio::time::sleep(Duration::from_millis(20)).await;
    interface.tick().await;
    assert!(!interface.is_connected());
    assert!(interface.is_reconnecting());
}

#[tokio::test]
async fn test_queued_data_change_does_not_reach_next_session() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let a = recording_listener(&log, "A");
    let b = recording_listener(&log, "B");

    let old = interface.subscribe("ns=2;s=A", Arc::downgrade(&a)).await.unwrap();
    mock.push(TransportEvent::DataChange {
        client_handle: old.subscription.client_handle,
        value: OpcUaValue::Int32(7),
    });

    interface.disconnect().await;
    assert!(interface.connect().await);
    let new = interface.subscribe("ns=2;s=B", Arc::downgrade(&b)).await.unwrap();
    assert_eq!(new.subscription.client_handle, old.subscription.client_handle);

    interface.tick().await;
    assert!(log.lock().is_empty());
    assert_eq!(interface.registry_stats().dispatched, 0);

    mock.push(TransportEvent::DataChange {
        client_handle: new.subscription.client_handle,
        value: OpcUaValue::Int32(8),
    });
    interface.tick().await;
    assert_eq!(*log.lock(), vec!["B:ns=2;s=B=8".to_string()]);
}

#[tokio::test]
async fn test_queued_closure_does_not_end_next_session() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let (events, _keep) = collector(&mut interface);

    mock.push(TransportEvent::ConnectionClosed);
    interface.disconnect().await;
    assert!(interface.connect().await);
    interface.tick().await;

    assert!(interface.is_connected());
    assert!(!interface.is_reconnecting());
    assert_eq!(events.events(), vec![InterfaceEvent::Disconnected, InterfaceEvent::Connected]);
}

#[tokio::test]
async fn test_pending_connected_is_dropped_when_session_ends() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let (events, _keep) = collector(&mut interface);

    interface.disconnect().await;
    interface.tick().await;

    assert_eq!(events.events(), vec![InterfaceEvent::Disconnected]);
}

#[tokio::test]
async fn test_dispatcher_follows_the_new_session() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    assert!(interface.spawn_dispatcher());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let listener: Arc<dyn NodeUpdateListener> =
        FnListener::new(move |sub: &NodeSubscription, value: &OpcUaValue| {
            let _ = tx.send((sub.node_id.clone(), value.clone()));
        });

    interface.disconnect().await;
    assert!(interface.connect().await);
    let handle = interface.subscribe("ns=2;s=B", Arc::downgrade(&listener)).await.unwrap();

    mock.push(TransportEvent::DataChange {
        client_handle: handle.subscription.client_handle,
        value: OpcUaValue::Int32(3),
    });
    let (node_id, value) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(node_id, "ns=2;s=B");
    assert_eq!(value, OpcUaValue::Int32(3));
}

// =============================================================================
// Import
// =============================================================================

#[tokio::test]
async fn test_import_object_with_two_variables() {
    let mock = MockTransport::new();
    conveyor_line(&mock);
    let mut interface = connected(&mock, config()).await;

    let summary = interface.import_nodes_from("ns=2;s=Line").await;

    assert_eq!(summary.imported, 3);
    assert_eq!(summary.created, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.to_string(), "imported 3 nodes, created 3 new nodes");

    let catalog = interface.catalog();
    let ids: Vec<_> = catalog.nodes().map(|n| n.node_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "ns=2;s=Line.Conveyor",
            "ns=2;s=Line.Conveyor.Speed",
            "ns=2;s=Line.Conveyor.Running",
        ]
    );

    let conveyor = catalog.get("ns=2;s=Line.Conveyor").unwrap();
    assert_eq!(conveyor.type_name, "Object");
    assert_eq!(conveyor.parent_id.as_deref(), Some("ns=2;s=Line"));
    assert_eq!(conveyor.identifier_type, "String");
    assert_eq!(conveyor.identifier, "Line.Conveyor");

    let speed = catalog.get("ns=2;s=Line.Conveyor.Speed").unwrap();
    assert_eq!(speed.type_name, "Double");
    assert_eq!(speed.parent_id.as_deref(), Some("ns=2;s=Line.Conveyor"));
    assert_eq!(speed.value, Some(OpcUaValue::Double(1.5)));
    assert!(speed.read_value && speed.subscribe_value && !speed.write_value);

    let children: Vec<_> = catalog
        .children("ns=2;s=Line.Conveyor")
        .map(|n| n.display_name.as_str())
        .collect();
    assert_eq!(children, vec!["Speed", "Running"]);
}

#[tokio::test]
async fn test_import_is_depth_first() {
    let mock = MockTransport::new();
    mock.add_object("ns=2;s=Line", "ns=2;s=Conveyor", "Conveyor");
    mock.add_variable("ns=2;s=Line", "ns=2;s=Lamp", "Lamp", OpcUaValue::Boolean(false), "Boolean");
    mock.add_object("ns=2;s=Conveyor", "ns=2;s=Motor", "Motor");
    mock.add_variable("ns=2;s=Conveyor", "ns=2;s=Speed", "Speed", OpcUaValue::Double(0.0), "Double");
    mock.add_variable("ns=2;s=Motor", "ns=2;s=Current", "Current", OpcUaValue::Double(3.1), "Double");
    mock.add_reference("ns=2;s=Line", "ns=2;s=Start", "Start", NodeClass::Method);
    let mut interface = connected(&mock, config()).await;

    interface.import_nodes_from("ns=2;s=Line").await;

    let names: Vec<_> = interface
        .catalog()
        .nodes()
        .map(|n| n.display_name.as_str())
        .collect();
    assert_eq!(names, vec!["Conveyor", "Motor", "Current", "Speed", "Lamp"]);
}

#[tokio::test]
async fn test_non_node_id_data_type_leaves_type_unresolved() {
    let mock = MockTransport::new();
    mock.add_variable("ns=2;s=Line", "ns=2;s=Level", "Level", OpcUaValue::Float(0.5), "Float");
    mock.set_attribute(
        "ns=2;s=Level",
        AttributeId::DataType,
        DataValue::good(OpcUaValue::Int32(10)),
    );
    let mut interface = connected(&mock, config()).await;

    let summary = interface.import_nodes_from("ns=2;s=Line").await;

    assert_eq!(summary.imported, 1);
    let node = interface.node("ns=2;s=Level").unwrap();
    assert_eq!(node.type_name, "");
    assert_eq!(node.value, Some(OpcUaValue::Float(0.5)));
    assert!(node.subscribe_value);
}

#[tokio::test]
async fn test_import_defaults_to_root_folder() {
    let mock = MockTransport::new();
    mock.add_object("i=84", "i=85", "Objects");
    let mut interface = connected(&mock, config()).await;

    let summary = interface.import_nodes().await;
    assert_eq!(summary.imported, 1);
    assert_eq!(mock.count(|c| *c == Call::Browse("i=84".into())), 1);
    assert_eq!(interface.node("i=85").unwrap().parent_id.as_deref(), Some("i=84"));
}

#[tokio::test]
async fn test_import_requires_connection_and_valid_root() {
    let mock = MockTransport::new();
    conveyor_line(&mock);
    let mut interface = OpcUaInterface::new(mock.clone(), config()).unwrap();

    let summary = interface.import_nodes_from("ns=2;s=Line").await;
    assert_eq!(summary.imported, 0);
    assert_eq!(mock.count(|c| matches!(c, Call::Browse(_))), 0);

    assert!(interface.connect().await);
    let summary = interface.import_nodes_from("ns=two;s=Line").await;
    assert_eq!(summary.imported, 0);
    assert_eq!(mock.count(|c| matches!(c, Call::Browse(_))), 0);
}

#[tokio::test]
async fn test_failed_sub_browse_moves_to_next_sibling() {
    let mock = MockTransport::new();
    mock.add_object("ns=2;s=Line", "ns=2;s=Broken", "Broken");
    mock.add_variable("ns=2;s=Line", "ns=2;s=Lamp", "Lamp", OpcUaValue::Boolean(true), "Boolean");
    mock.fail_browse("ns=2;s=Broken");
    let mut interface = connected(&mock, config()).await;

    let summary = interface.import_nodes_from("ns=2;s=Line").await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.imported, 2);
    assert!(interface.node("ns=2;s=Broken").is_some());
    assert!(interface.node("ns=2;s=Lamp").is_some());
    assert!(interface.is_connected());
}

#[tokio::test]
async fn test_failed_value_read_clears_subscribe() {
    let mock = MockTransport::new();
    conveyor_line(&mock);
    let mut interface = connected(&mock, config()).await;

    interface.import_nodes_from("ns=2;s=Line").await;
    assert!(interface.node("ns=2;s=Line.Conveyor.Speed").unwrap().subscribe_value);

    mock.set_attribute(
        "ns=2;s=Line.Conveyor.Speed",
        AttributeId::Value,
        DataValue::bad(StatusCode::BAD_NOT_READABLE),
    );
    let summary = interface.import_nodes_from("ns=2;s=Line").await;

    assert_eq!(summary.created, 0);
    assert_eq!(interface.catalog().len(), 3);
    let speed = interface.node("ns=2;s=Line.Conveyor.Speed").unwrap();
    assert!(!speed.subscribe_value);
    assert_eq!(speed.value, None);
    assert!(interface.node("ns=2;s=Line.Conveyor.Running").unwrap().subscribe_value);
}

#[tokio::test]
async fn test_bad_status_node_is_inert_despite_write_pattern() {
    let mock = MockTransport::new();
    mock.add_variable("ns=2;s=Line", "ns=2;s=Line.Cmd", "Cmd", OpcUaValue::Int32(0), "Int32");
    mock.add_variable("ns=2;s=Line", "ns=2;s=Line.Door.Cmd", "DoorCmd", OpcUaValue::Int32(0), "Int32");
    mock.set_attribute(
        "ns=2;s=Line.Cmd",
        AttributeId::AccessLevel,
        DataValue::bad(StatusCode::BAD_NOT_READABLE),
    );
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .write_node_pattern(r"Cmd$")
        .build()
        .unwrap();
    let mut interface = connected(&mock, config).await;

    interface.import_nodes_from("ns=2;s=Line").await;

    let inert = interface.node("ns=2;s=Line.Cmd").unwrap();
    assert_eq!(inert.status, StatusCode::BAD_NOT_READABLE);
    assert!(!inert.read_value && !inert.write_value && !inert.subscribe_value && !inert.poll_input);

    let door = interface.node("ns=2;s=Line.Door.Cmd").unwrap();
    assert!(door.write_value && !door.read_value && !door.subscribe_value);
}

#[tokio::test]
async fn test_auto_input_on_write_marks_writable_nodes() {
    let mock = MockTransport::new();
    mock.add_variable("ns=2;s=Line", "ns=2;s=Setpoint", "Setpoint", OpcUaValue::Double(0.0), "Double");
    mock.add_variable("ns=2;s=Line", "ns=2;s=Actual", "Actual", OpcUaValue::Double(0.0), "Double");
    mock.set_access_level(
        "ns=2;s=Setpoint",
        AccessLevel::CURRENT_READ | AccessLevel::CURRENT_WRITE,
    );
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .auto_input_on_write(true)
        .auto_subscribe_on_import(false)
        .build()
        .unwrap();
    let mut interface = connected(&mock, config).await;

    interface.import_nodes_from("ns=2;s=Line").await;

    let setpoint = interface.node("ns=2;s=Setpoint").unwrap();
    assert!(setpoint.write_value && !setpoint.read_value);
    assert!(setpoint.access_level.can_write());

    let actual = interface.node("ns=2;s=Actual").unwrap();
    assert!(actual.read_value && !actual.subscribe_value);
}

#[tokio::test]
async fn test_import_hook_and_import_once() {
    let mock = MockTransport::new();
    conveyor_line(&mock);
    let hook = Arc::new(RecordingHook::default());
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .top_node_id("ns=2;s=Line")
        .build()
        .unwrap();
    let mut interface = OpcUaInterface::new(mock.clone(), config)
        .unwrap()
        .with_hook(hook.clone());

    let summary = interface.import_once().await.unwrap();

    assert_eq!(summary.imported, 3);
    assert!(!interface.is_connected());
    assert_eq!(hook.imports.load(Ordering::SeqCst), 1);
    assert_eq!(hook.imported_nodes.load(Ordering::SeqCst), 3);
    assert_eq!(*hook.changes.lock(), vec![true, false]);
    assert_eq!(interface.catalog().len(), 3);
}

// =============================================================================
// Value Access
// =============================================================================

#[tokio::test]
async fn test_read_and_write_round_trip_through_transport() {
    let mock = MockTransport::new();
    mock.set_value("ns=2;s=Speed", OpcUaValue::Double(12.5));
    mock.set_write_status("ns=2;s=Locked", StatusCode::BAD_NOT_WRITABLE);
    let mut interface = connected(&mock, config()).await;

    assert_eq!(
        interface.read_node_value("ns=2;s=Speed").await,
        Some(OpcUaValue::Double(12.5))
    );
    let missing = interface.read_node_value_with_status("ns=2;s=Missing").await;
    assert_eq!(missing.value, None);
    assert_eq!(missing.status, StatusCode::BAD_ATTRIBUTE_ID_INVALID);

    let invalid = interface.read_node_value_with_status("not-a-node").await;
    assert_eq!(invalid.status, StatusCode::BAD_NODE_ID_INVALID);

    assert!(interface.write_node_value("ns=2;s=Speed", &OpcUaValue::Double(3.0)).await);
    assert_eq!(
        interface
            .write_node_value_with_status("ns=2;s=Locked", &OpcUaValue::Boolean(true))
            .await,
        StatusCode::BAD_NOT_WRITABLE
    );
    assert!(interface.is_connected());
}

#[tokio::test]
async fn test_offline_write_makes_no_transport_call() {
    let mock = MockTransport::new();
    let mut interface = OpcUaInterface::new(mock.clone(), config()).unwrap();

    assert!(!interface.write_node_value("ns=2;s=Speed", &OpcUaValue::Double(1.0)).await);
    let read = interface.read_node_value_with_status("ns=2;s=Speed").await;
    assert_eq!(read.status, StatusCode::BAD_NOT_CONNECTED);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_write_does_not_touch_catalog_or_listeners() {
    let mock = MockTransport::new();
    conveyor_line(&mock);
    let mut interface = connected(&mock, config()).await;
    interface.import_nodes_from("ns=2;s=Line").await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let listener = recording_listener(&log, "l");
    interface
        .subscribe("ns=2;s=Line.Conveyor.Speed", Arc::downgrade(&listener))
        .await
        .unwrap();

    assert!(
        interface
            .write_node_value("ns=2;s=Line.Conveyor.Speed", &OpcUaValue::Double(9.0))
            .await
    );
    interface.tick().await;

    assert!(log.lock().is_empty());
    assert_eq!(
        interface.node("ns=2;s=Line.Conveyor.Speed").unwrap().value,
        Some(OpcUaValue::Double(1.5))
    );
}

#[tokio::test]
async fn test_poll_inputs_and_refresh_node() {
    let mock = MockTransport::new();
    conveyor_line(&mock);
    let mut interface = connected(&mock, config()).await;
    interface.import_nodes_from("ns=2;s=Line").await;

    interface.node_mut("ns=2;s=Line.Conveyor.Speed").unwrap().poll_input = true;
    mock.set_value("ns=2;s=Line.Conveyor.Speed", OpcUaValue::Double(4.0));

    assert_eq!(interface.poll_inputs().await, 1);
    assert_eq!(
        interface.node("ns=2;s=Line.Conveyor.Speed").unwrap().value,
        Some(OpcUaValue::Double(4.0))
    );

    mock.set_attribute(
        "ns=2;s=Line.Conveyor.Running",
        AttributeId::Value,
        DataValue {
            value: None,
            status: StatusCode::GOOD,
        },
    );
    interface.refresh_node("ns=2;s=Line.Conveyor.Running").await;
    let running = interface.node("ns=2;s=Line.Conveyor.Running").unwrap();
    assert_eq!(running.value, None);
    assert_eq!(running.status, StatusCode::BAD_NO_DATA);
}

// =============================================================================
// Server-initiated closure
// =============================================================================

#[tokio::test]
async fn test_closed_read_triggers_disconnect_and_reconnect() {
    let mock = MockTransport::new();
    let config = InterfaceConfig::builder()
        .server("127.0.0.1", 4840)
        .reconnect_interval(Duration::from_millis(100))
        .build()
        .unwrap();
    let mut interface = connected(&mock, config).await;
    let (events, _keep) = collector(&mut interface);
    interface.tick().await;

    let listener = noop_listener();
    interface.subscribe("ns=2;s=Speed", Arc::downgrade(&listener)).await.unwrap();
    mock.set_attribute(
        "ns=2;s=Speed",
        AttributeId::Value,
        DataValue::bad(StatusCode::BAD_CONNECTION_CLOSED),
    );

    let read = interface.read_node_value_with_status("ns=2;s=Speed").await;

    assert_eq!(read.status, StatusCode::BAD_CONNECTION_CLOSED);
    assert!(!interface.is_connected());
    assert!(interface.is_reconnecting());
    assert!(interface.registry().is_empty());
    assert_eq!(events.count(InterfaceEvent::Disconnected), 1);

    let later = Instant::now() + Duration::from_secs(1);
    interface.tick_at(later).await;
    assert!(interface.is_connected());
    interface.tick_at(later).await;

    assert_eq!(
        events.events(),
        vec![
            InterfaceEvent::Connected,
            InterfaceEvent::Disconnected,
            InterfaceEvent::Connected,
            InterfaceEvent::Reconnected,
        ]
    );
}

#[tokio::test]
async fn test_closed_write_error_triggers_disconnect() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let (events, _keep) = collector(&mut interface);

    mock.set_closed(true);
    assert!(!interface.write_node_value("ns=2;s=Speed", &OpcUaValue::Int32(1)).await);

    assert!(!interface.is_connected());
    assert!(interface.is_reconnecting());
    assert_eq!(events.count(InterfaceEvent::Disconnected), 1);
}

#[tokio::test]
async fn test_pushed_closure_is_handled_on_tick() {
    let mock = MockTransport::new();
    let mut interface = connected(&mock, config()).await;
    let (events, _keep) = collector(&mut interface);
    let listener = noop_listener();
    interface.subscribe("ns=2;s=Speed", Arc::downgrade(&listener)).await.unwrap();

    mock.push(TransportEvent::ConnectionClosed);
    assert!(interface.is_connected());
    interface.tick().await;

    assert!(!interface.is_connected());
    assert!(interface.is_reconnecting());
    assert!(interface.registry().is_empty());
    assert_eq!(events.count(InterfaceEvent::Disconnected), 1);
}

#[tokio::test]
async fn test_closure_during_import_stops_walk() {
    let mock = MockTransport::new();
    conveyor_line(&mock);
    mock.set_attribute(
        "ns=2;s=Line.Conveyor.Speed",
        AttributeId::AccessLevel,
        DataValue::bad(StatusCode::BAD_CONNECTION_CLOSED),
    );
    let mut interface = connected(&mock, config()).await;

    let summary = interface.import_nodes_from("ns=2;s=Line").await;

    assert!(summary.connection_closed);
    assert_eq!(summary.imported, 1);
    assert!(interface.node("ns=2;s=Line.Conveyor.Running").is_none());
    assert!(!interface.is_connected());
    assert!(interface.is_reconnecting());
}

// =============================================================================
// Live server
// =============================================================================

#[cfg(feature = "real-transport")]
mod live_server {
    use super::*;
    use plantlink_opcua::RealOpcUaTransport;

    /// `host:port` of the test server.
    fn endpoint() -> (String, u16) {
        let raw = std::env::var("PLANTLINK_TEST_ENDPOINT").unwrap_or_else(|_| "127.0.0.1:4840".into());
        let raw = raw.trim_start_matches("opc.tcp://");
        let (host, port) = raw.rsplit_once(':').unwrap_or((raw, "4840"));
        (host.to_string(), port.parse().unwrap_or(4840))
    }

    async fn live_interface() -> OpcUaInterface<RealOpcUaTransport> {
        let (host, port) = endpoint();
        let config = InterfaceConfig::builder().server(host, port).build().unwrap();
        OpcUaInterface::new(RealOpcUaTransport::new(), config).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires an OPC UA server at PLANTLINK_TEST_ENDPOINT"]
    async fn test_live_connect_and_read_server_status() {
        let mut interface = live_interface().await;
        assert!(interface.connect().await);

        // Server_ServerStatus_State
        let read = interface.read_node_value_with_status("i=2259").await;
        assert!(read.is_good(), "status {}", read.status);

        interface.disconnect().await;
        assert!(!interface.is_connected());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires an OPC UA server at PLANTLINK_TEST_ENDPOINT"]
    async fn test_live_import_objects_folder() {
        let mut interface = live_interface().await;
        assert!(interface.connect().await);

        let summary = interface.import_nodes_from("i=85").await;
        assert!(summary.imported > 0);
        assert!(!summary.connection_closed);

        interface.disconnect().await;
    }
}

