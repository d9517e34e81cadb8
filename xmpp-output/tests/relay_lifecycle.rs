//! Integration tests for the relay lifecycle: construction, the single
//! reconnect-and-retry, batch semantics, stop, and concurrent writes.
//!
//! All tests run against a scripted fake connector injected through
//! `XmppOutput::with_connector`; no network is involved.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use xmpp_output::output::LogMessage;
use xmpp_output::relay::{OutputConfig, XmppOutput};
use xmpp_output::xmpp::{
    ChatKind, ConnectionProfile, OutboundMessage, SessionConnector, SessionError, XmppSession,
};
use xmpp_output::OutputError;

/// Shared script and call recording for the fake connector.
#[derive(Default)]
struct FakeState {
    connects: usize,
    live_sessions: usize,
    closes: usize,
    joins: Vec<(String, String)>,
    sent: Vec<(String, ChatKind, String)>,
    /// Outcome of upcoming connect calls; empty means success.
    connect_results: VecDeque<Result<(), SessionError>>,
    /// Outcome of upcoming join calls; empty means success.
    join_results: VecDeque<Result<(), SessionError>>,
    /// Outcome of upcoming send attempts; empty means success.
    send_results: VecDeque<Result<(), SessionError>>,
}

#[derive(Clone)]
struct FakeConnector {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnector {
    fn new() -> (Self, Arc<Mutex<FakeState>>) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl SessionConnector for FakeConnector {
    type Session = FakeSession;

    fn connect(&self, _profile: &ConnectionProfile) -> Result<FakeSession, SessionError> {
        let mut state = self.state.lock().unwrap();
        if let Some(Err(error)) = state.connect_results.pop_front() {
            return Err(error);
        }
        state.connects += 1;
        state.live_sessions += 1;
        Ok(FakeSession {
            state: self.state.clone(),
        })
    }
}

struct FakeSession {
    state: Arc<Mutex<FakeState>>,
}

impl XmppSession for FakeSession {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if let Some(Err(error)) = state.send_results.pop_front() {
            return Err(error);
        }
        state
            .sent
            .push((message.to.to_string(), message.kind, message.body.clone()));
        Ok(())
    }

    fn join_room(
        &mut self,
        room: &xmpp_parsers::jid::BareJid,
        nick: &str,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if let Some(Err(error)) = state.join_results.pop_front() {
            return Err(error);
        }
        state.joins.push((room.to_string(), nick.to_string()));
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closes += 1;
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.state.lock().unwrap().live_sessions -= 1;
    }
}

fn config_for(recipient: &str) -> OutputConfig {
    OutputConfig {
        hostname: "jabber.example.org".to_string(),
        service_name: Some("example.org".to_string()),
        port: 5222,
        accept_selfsigned: false,
        username: "relay".to_string(),
        password: "secret".to_string(),
        require_security: true,
        recipient: recipient.to_string(),
        format: "{source} {message}".to_string(),
        resource: "logbot".to_string(),
    }
}

fn sample_message() -> LogMessage {
    LogMessage::new()
        .with_field("source", "web1")
        .with_field("message", "disk full")
}

#[test]
fn test_construction_connects_once_for_direct_recipient() {
    let (connector, state) = FakeConnector::new();
    let relay = XmppOutput::with_connector(config_for("ops@example.org"), "node-1", connector)
        .expect("construction succeeds");

    let state = state.lock().unwrap();
    assert_eq!(state.connects, 1);
    assert_eq!(state.live_sessions, 1);
    assert!(state.joins.is_empty());
    assert!(relay.is_running());
}

#[test]
fn test_construction_joins_room_with_nickname() {
    let (connector, state) = FakeConnector::new();
    let relay = XmppOutput::with_connector(
        config_for("muc:logs@conference.example.org"),
        "node-1",
        connector,
    )
    .expect("construction succeeds");

    {
        let state = state.lock().unwrap();
        assert_eq!(
            state.joins,
            vec![(
                "logs@conference.example.org".to_string(),
                "logbot".to_string()
            )]
        );
    }

    relay.write(&sample_message()).expect("write succeeds");
    let state = state.lock().unwrap();
    assert_eq!(
        state.sent,
        vec![(
            "logs@conference.example.org".to_string(),
            ChatKind::Room,
            "web1 disk full".to_string()
        )]
    );
}

#[test]
fn test_connect_failure_is_construction_fatal() {
    let (connector, state) = FakeConnector::new();
    state
        .lock()
        .unwrap()
        .connect_results
        .push_back(Err(SessionError::Auth("not-authorized".to_string())));

    let result = XmppOutput::with_connector(config_for("ops@example.org"), "node-1", connector);
    let error = result.err().expect("construction fails");
    assert!(error.is_configuration());
    let rendered = error.to_string();
    assert!(rendered.contains("jabber.example.org:5222"));
    assert!(rendered.contains("not-authorized"));
}

#[test]
fn test_join_failure_is_construction_fatal() {
    let (connector, state) = FakeConnector::new();
    {
        let mut state = state.lock().unwrap();
        state.join_results.push_back(Err(SessionError::RoomJoin {
            room: "logs@conference.example.org".parse().unwrap(),
            reason: "registration-required".to_string(),
        }));
    }

    let result = XmppOutput::with_connector(
        config_for("muc:logs@conference.example.org"),
        "node-1",
        connector,
    );
    let error = result.err().expect("construction fails");
    assert!(error.is_configuration());
    assert!(error.to_string().contains("logs@conference.example.org"));
}

#[test]
fn test_invalid_recipient_fails_without_connecting() {
    let (connector, state) = FakeConnector::new();
    let result = XmppOutput::with_connector(config_for("not a jid"), "node-1", connector);
    assert!(result.is_err());
    assert_eq!(state.lock().unwrap().connects, 0);
}

#[test]
fn test_write_formats_and_sends_direct_chat() {
    let (connector, state) = FakeConnector::new();
    let relay = XmppOutput::with_connector(config_for("ops@example.org"), "node-1", connector)
        .expect("construction succeeds");

    relay.write(&sample_message()).expect("write succeeds");

    let state = state.lock().unwrap();
    assert_eq!(
        state.sent,
        vec![(
            "ops@example.org".to_string(),
            ChatKind::Direct,
            "web1 disk full".to_string()
        )]
    );
}

#[test]
fn test_disconnected_send_reconnects_once_and_retries() {
    let (connector, state) = FakeConnector::new();
    let relay = XmppOutput::with_connector(
        config_for("muc:logs@conference.example.org"),
        "node-1",
        connector,
    )
    .expect("construction succeeds");

    state
        .lock()
        .unwrap()
        .send_results
        .push_back(Err(SessionError::NotConnected));

    relay.write(&sample_message()).expect("retry succeeds");

    let state = state.lock().unwrap();
    assert_eq!(state.connects, 2);
    // The reconnect re-ran the room join.
    assert_eq!(state.joins.len(), 2);
    assert_eq!(state.sent.len(), 1);
    assert!(relay.is_running());
}

#[test]
fn test_failed_retry_surfaces_delivery_error() {
    let (connector, state) = FakeConnector::new();
    let relay = XmppOutput::with_connector(config_for("ops@example.org"), "node-1", connector)
        .expect("construction succeeds");

    {
        let mut state = state.lock().unwrap();
        state
            .send_results
            .push_back(Err(SessionError::NotConnected));
        state
            .send_results
            .push_back(Err(SessionError::Stream("connection reset".to_string())));
    }

    let error = relay.write(&sample_message()).err().expect("write fails");
    match &error {
        OutputError::Delivery { recipient, .. } => {
            assert_eq!(recipient, "ops@example.org");
        }
        other => panic!("expected delivery error, got {other:?}"),
    }

    {
        let state = state.lock().unwrap();
        assert_eq!(state.connects, 2);
        assert!(state.sent.is_empty());
    }

    // The fresh session survived the non-disconnect failure; the next
    // write reuses it.
    relay.write(&sample_message()).expect("write succeeds");
    let state = state.lock().unwrap();
    assert_eq!(state.connects, 2);
    assert_eq!(state.sent.len(), 1);
}

#[test]
fn test_failed_reconnect_surfaces_configuration_error_and_relay_recovers() {
    let (connector, state) = FakeConnector::new();
    let relay = XmppOutput::with_connector(config_for("ops@example.org"), "node-1", connector)
        .expect("construction succeeds");

    {
        let mut state = state.lock().unwrap();
        state
            .send_results
            .push_back(Err(SessionError::NotConnected));
        state
            .connect_results
            .push_back(Err(SessionError::Connection("host unreachable".to_string())));
    }

    let error = relay.write(&sample_message()).err().expect("write fails");
    assert!(error.is_configuration());
    assert!(!relay.is_running());
    assert_eq!(state.lock().unwrap().live_sessions, 0);

    // A later write attempts reconnection again and succeeds.
    relay.write(&sample_message()).expect("write succeeds");
    assert!(relay.is_running());
    let state = state.lock().unwrap();
    assert_eq!(state.connects, 2);
    assert_eq!(state.sent.len(), 1);
}

#[test]
fn test_non_disconnect_send_error_does_not_reconnect() {
    let (connector, state) = FakeConnector::new();
    let relay = XmppOutput::with_connector(config_for("ops@example.org"), "node-1", connector)
        .expect("construction succeeds");

    state
        .lock()
        .unwrap()
        .send_results
        .push_back(Err(SessionError::Timeout(Duration::from_secs(30))));

    let error = relay.write(&sample_message()).err().expect("write fails");
    assert!(matches!(error, OutputError::Delivery { .. }));
    let state = state.lock().unwrap();
    assert_eq!(state.connects, 1);
    assert_eq!(state.live_sessions, 1);
}

#[test]
fn test_write_batch_attempts_all_messages() {
    let (connector, state) = FakeConnector::new();
    let relay = XmppOutput::with_connector(config_for("ops@example.org"), "node-1", connector)
        .expect("construction succeeds");

    {
        let mut state = state.lock().unwrap();
        // First message delivers; the second dies on its retry too; the
        // third delivers on the session the retry left behind.
        state.send_results.push_back(Ok(()));
        state
            .send_results
            .push_back(Err(SessionError::NotConnected));
        state
            .send_results
            .push_back(Err(SessionError::Stream("connection reset".to_string())));
    }

    let messages = vec![
        LogMessage::new().with_field("message", "one"),
        LogMessage::new().with_field("message", "two"),
        LogMessage::new().with_field("message", "three"),
    ];
    let error = relay.write_batch(&messages).err().expect("batch reports");

    assert_eq!(error.attempted, 3);
    assert_eq!(error.failures.len(), 1);
    assert_eq!(error.failures[0].0, 1);

    let state = state.lock().unwrap();
    assert_eq!(state.sent.len(), 2);
}

#[test]
fn test_stop_is_idempotent() {
    let (connector, state) = FakeConnector::new();
    let relay = XmppOutput::with_connector(config_for("ops@example.org"), "node-1", connector)
        .expect("construction succeeds");

    assert!(relay.is_running());
    relay.stop();
    assert!(!relay.is_running());
    relay.stop();
    assert!(!relay.is_running());

    let state = state.lock().unwrap();
    assert_eq!(state.closes, 1);
    assert_eq!(state.live_sessions, 0);
}

#[test]
fn test_concurrent_writes_never_corrupt_the_connection() {
    let (connector, state) = FakeConnector::new();
    let relay = Arc::new(
        XmppOutput::with_connector(config_for("ops@example.org"), "node-1", connector)
            .expect("construction succeeds"),
    );

    // One disconnect somewhere in the stream forces a reconnect while the
    // other thread is competing for the connection.
    state
        .lock()
        .unwrap()
        .send_results
        .push_back(Err(SessionError::NotConnected));

    let mut handles = Vec::new();
    for worker in 0..2 {
        let relay = relay.clone();
        handles.push(thread::spawn(move || {
            for i in 0..5 {
                let message = LogMessage::new()
                    .with_field("source", format!("worker-{worker}"))
                    .with_field("message", format!("event {i}"));
                relay.write(&message).expect("write succeeds");
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker finishes");
    }

    let state = state.lock().unwrap();
    // Exactly zero or one valid connection after both return.
    assert!(state.live_sessions <= 1);
    assert_eq!(state.live_sessions, 1);
    assert_eq!(state.connects, 2);
    assert_eq!(state.sent.len(), 10);
    assert!(relay.is_running());
}
