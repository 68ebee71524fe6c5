#![allow(non_snake_case)]

use super::*;
use crate::test_support::{FakeEngine, FakeMainThread, ScriptedPeer, reply_to, test_config};
use liveconnect_core::ObjectId;
use std::time::Instant;
use tokio::io::DuplexStream;

fn services() -> (Arc<FakeEngine>, HostServices) {
    let engine = Arc::new(FakeEngine::default());
    let services = HostServices::new(engine.clone(), FakeMainThread::spawn());
    (engine, services)
}

fn sink_session() -> (Arc<ScriptedPeer>, BridgeSession) {
    let peer = ScriptedPeer::unattached();
    let (_engine, services) = services();
    let session = BridgeSession::with_sink(test_config(), services, peer.clone()).unwrap();
    peer.attach(Arc::clone(session.bus()));
    (peer, session)
}

/// Counterpart end of an in-memory stream, driven by its own runtime
struct DuplexPeer {
    runtime: tokio::runtime::Runtime,
    channel: TransportChannel<tokio::io::ReadHalf<DuplexStream>, tokio::io::WriteHalf<DuplexStream>>,
}

impl DuplexPeer {
    fn read(&mut self) -> Option<String> {
        let frame = self.runtime.block_on(self.channel.read_message()).unwrap();
        frame.map(|bytes| String::from_utf8(bytes).unwrap())
    }

    fn write(&mut self, wire: &str) {
        self.runtime
            .block_on(self.channel.write_message(wire.as_bytes()))
            .unwrap();
    }
}

fn duplex_session() -> (DuplexPeer, BridgeSession) {
    let (bridge_end, peer_end) = tokio::io::duplex(64 * 1024);
    let (read_half, write_half) = tokio::io::split(bridge_end);
    let (_engine, services) = services();
    let session = BridgeSession::over_channel(
        test_config(),
        services,
        TransportChannel::new(read_half, write_half),
    )
    .unwrap();

    let (read_half, write_half) = tokio::io::split(peer_end);
    let peer = DuplexPeer {
        runtime: tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap(),
        channel: TransportChannel::new(read_half, write_half),
    };
    (peer, session)
}

fn wait_for_state(session: &BridgeSession, expected: SessionState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while session.state() != expected {
        assert!(Instant::now() < deadline, "state stuck at {}", session.state());
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn BridgeSession___with_sink___starts_connected() {
    let (_peer, session) = sink_session();

    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.bus().subscriber_count(), 1);
}

#[test]
fn BridgeSession___with_sink___rejects_invalid_config() {
    let (_engine, services) = services();
    let config = test_config().with_queue_workers(0);

    let result = BridgeSession::with_sink(config, services, ScriptedPeer::unattached());

    assert!(matches!(result, Err(BridgeError::Config(_))));
}

#[test]
fn BridgeSession___proxy___round_trips_through_sink() {
    let (peer, session) = sink_session();
    peer.respond_with(|m| Some(reply_to(m, "FindClass").arg(21)));

    let class = session.proxy().find_class("java/lang/Object").unwrap();

    assert_eq!(class, ObjectId::new(21));
    assert!(session.references().contains(class));
}

#[test]
fn BridgeSession___environment___shares_reference_table() {
    let (peer, session) = sink_session();
    peer.respond_with(|m| Some(reply_to(m, "FindClass").arg(21)));
    let env = session.environment(7);

    env.find_class("java/lang/Object").unwrap();

    assert_eq!(env.context_id(), 7);
    assert_eq!(peer.sent()[0].scope_id, 7);
    assert!(session.references().contains(ObjectId::new(21)));
}

#[test]
fn BridgeSession___deliver___get_window_answered() {
    let (peer, session) = sink_session();

    let consumed = session.deliver("instance 2 reference 4 GetWindow").unwrap();

    assert!(consumed);
    assert_eq!(
        peer.sent()[0].to_wire(),
        "context 0 reference 4 JavaScriptGetWindow 1"
    );
    assert_eq!(
        session.script_objects().resolve(1),
        Some(FakeEngine::window_of(2))
    );
}

#[test]
fn BridgeSession___deliver___malformed_is_protocol_error() {
    let (_peer, session) = sink_session();

    let err = session.deliver("nonsense 1 2").unwrap_err();

    assert!(matches!(err, BridgeError::Protocol(_)));
}

#[test]
fn BridgeSession___close___fails_later_requests_and_is_idempotent() {
    let (peer, session) = sink_session();
    peer.respond_with(|m| Some(reply_to(m, "FindClass").arg(21)));

    session.close();
    session.close();

    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.bus().is_closed());
    let err = session.proxy().find_class("java/lang/Object").unwrap_err();
    assert!(matches!(err, BridgeError::Transport(_)));
}

#[test]
fn BridgeSession___over_channel___answers_inbound_get_window() {
    let (mut peer, session) = duplex_session();

    peer.write("instance 3 reference 5 GetWindow");

    assert_eq!(
        peer.read().as_deref(),
        Some("context 0 reference 5 JavaScriptGetWindow 1")
    );
    assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn BridgeSession___over_channel___java_bound_call_gets_reply() {
    let (mut peer, session) = duplex_session();

    std::thread::scope(|scope| {
        let caller = scope.spawn(|| session.proxy().find_class("java/lang/Object"));

        let request = Message::parse(&peer.read().unwrap()).unwrap();
        assert_eq!(request.command, "FindClass");
        peer.write(&reply_to(&request, "FindClass").arg(33).to_wire());

        assert_eq!(caller.join().unwrap().unwrap(), ObjectId::new(33));
    });
}

#[test]
fn BridgeSession___over_channel___skips_malformed_frames() {
    let (mut peer, _session) = duplex_session();

    peer.write("garbage without envelope");
    peer.write("instance 3 reference 6 GetWindow");

    assert_eq!(
        peer.read().as_deref(),
        Some("context 0 reference 6 JavaScriptGetWindow 1")
    );
}

#[test]
fn BridgeSession___transport_loss___fails_session_and_pending_requests() {
    let (mut peer, session) = duplex_session();

    std::thread::scope(|scope| {
        let caller = scope.spawn(|| session.proxy().find_class("java/lang/Object"));

        let request = peer.read().unwrap();
        assert!(request.contains("FindClass"));
        drop(peer);

        let err = caller.join().unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    });

    wait_for_state(&session, SessionState::Failed);
    assert!(session.bus().is_closed());

    session.close();
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn BridgeSession___bind___listens_on_ephemeral_port() {
    let (_engine, services) = services();

    let listening = BridgeSession::bind(test_config(), services).unwrap();

    assert_eq!(listening.state(), SessionState::Listening);
    assert_ne!(listening.local_addr().unwrap().port(), 0);
}

#[test]
fn ListeningSession___viewer_command___passes_port() {
    let (_engine, services) = services();
    let mut config = test_config();
    config.viewer_executable = Some("bin/viewer".into());
    let listening = BridgeSession::bind(config, services).unwrap();
    let port = listening.local_addr().unwrap().port().to_string();

    let command = listening
        .viewer_command(Path::new("/opt/liveconnect"))
        .unwrap()
        .unwrap();

    assert_eq!(command.get_program(), "/opt/liveconnect/bin/viewer");
    let args: Vec<_> = command.get_args().collect();
    assert_eq!(args, vec![port.as_str()]);
}

#[test]
fn ListeningSession___viewer_command___none_without_executable() {
    let (_engine, services) = services();
    let listening = BridgeSession::bind(test_config(), services).unwrap();

    assert!(listening
        .viewer_command(Path::new("/opt/liveconnect"))
        .unwrap()
        .is_none());
}

#[test]
fn ListeningSession___accept___times_out_without_counterpart() {
    let (_engine, services) = services();
    let config = test_config().with_reply_timeout(Duration::from_millis(50));
    let listening = BridgeSession::bind(config, services).unwrap();

    let err = listening.accept().err().unwrap();

    assert!(matches!(err, BridgeError::Timeout { ref command, .. } if command == "accept"));
}
