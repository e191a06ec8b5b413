//! End-to-end flows through a running coordinator on a mock bus.
//!
//! Time is paused so poll intervals and session timeouts elapse instantly
//! once every task is idle.

use std::sync::Arc;

use lockmon_core::{Error, ReaderAddress, UserId};
use lockmon_credentials::{
    CredentialKind, EventKind, KeyRecord, MemoryCredentialStore, Notification,
};
use lockmon_engine::mock::{MockTransport, MockTransportHandle, RecordingNotifier, RecordingRecorder};
use lockmon_engine::{
    Collaborators, Coordinator, CoordinatorHandle, EngineConfig, RelaySettingsProvider,
    StaticRelaySettings,
};
use lockmon_protocol::{FrameType, IncomingFrame, RelaySettings, RelaySlot};

const REBOOT: [u8; 4] = [0x00, 0x03, 0x01, b'R'];
const READER: ReaderAddress = ReaderAddress::new(5);

struct Harness {
    handle: CoordinatorHandle,
    sent: MockTransportHandle,
    recorder: Arc<RecordingRecorder>,
    notifier: Arc<RecordingNotifier>,
}

fn store() -> MemoryCredentialStore {
    let store = MemoryCredentialStore::new();
    store.insert(b"1234", KeyRecord::new(UserId::new(1), CredentialKind::Pin));
    store.insert(
        b"7777",
        KeyRecord::new(UserId::new(3), CredentialKind::Pin).with_second_factor(),
    );
    store.insert(b"CARD-3", KeyRecord::new(UserId::new(3), CredentialKind::Rfid));
    store
}

/// Start a coordinator and consume the boot-time reboot command.
async fn start(config: EngineConfig) -> Harness {
    let relays = StaticRelaySettings::new(RelaySettings {
        mechanical: [RelaySlot::new(true, 3000), RelaySlot::disabled()],
        ..RelaySettings::default()
    });
    start_with_relays(config, Some(Arc::new(relays))).await
}

async fn start_with_relays(
    config: EngineConfig,
    relays: Option<Arc<dyn RelaySettingsProvider>>,
) -> Harness {
    let recorder = Arc::new(RecordingRecorder::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let collaborators = Collaborators {
        store: Arc::new(store()),
        relays,
        recorder: recorder.clone(),
        notifier: notifier.clone(),
    };

    let (transport, mut sent) = MockTransport::new();
    let handle = Coordinator::new(config, collaborators)
        .start(transport)
        .await
        .unwrap();
    assert_eq!(sent.recv().await.unwrap(), REBOOT);

    Harness {
        handle,
        sent,
        recorder,
        notifier,
    }
}

fn event(address: ReaderAddress, payload: &[u8]) -> IncomingFrame {
    IncomingFrame::new(address, FrameType::EventWithProtocol, payload.to_vec())
}

fn second_key(address: ReaderAddress, payload: &[u8]) -> IncomingFrame {
    IncomingFrame::new(address, FrameType::SecondKey, payload.to_vec())
}

fn status(address: ReaderAddress, payload: &[u8]) -> IncomingFrame {
    IncomingFrame::new(address, FrameType::Status, payload.to_vec())
}

#[tokio::test(start_paused = true)]
async fn test_controller_reboot_is_first_command() {
    let (transport, mut sent) = MockTransport::new();
    let collaborators = Collaborators {
        store: Arc::new(MemoryCredentialStore::new()),
        relays: None,
        recorder: Arc::new(RecordingRecorder::new()),
        notifier: Arc::new(RecordingNotifier::new()),
    };

    let handle = Coordinator::new(EngineConfig::default(), collaborators)
        .start(transport)
        .await
        .unwrap();

    assert!(sent.is_open());
    assert_eq!(sent.recv().await.unwrap(), REBOOT);

    handle.shutdown().await;
    assert!(!handle.is_running());
    assert!(sent.is_stopped());
    assert_eq!(handle.pending_commands(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pin_approval_carries_relay_settings() {
    let mut h = start(EngineConfig::default()).await;

    h.handle
        .on_frame(&[0x05, 0x20, 0x07, b'P', b'I', b'N', b'1', b'2', b'3', b'4'])
        .unwrap();

    let reply = h.sent.recv().await.unwrap();
    assert_eq!(reply.len(), 23);
    assert_eq!(&reply[..3], &[0x05, 0x05, 20]);

    h.handle.shutdown().await;
    let events = h.recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Access);
    assert_eq!(events[0].user, Some(UserId::new(1)));
    assert_eq!(events[0].credential, Some(CredentialKind::Pin));
    assert!(h.notifier.notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_pin_is_denied_and_notified() {
    let mut h = start(EngineConfig::default()).await;

    h.handle.deliver(event(READER, b"PIN9999"));
    assert_eq!(h.sent.recv().await.unwrap(), vec![0x05, 0x04, 0x00]);

    h.handle.shutdown().await;
    let events = h.recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Denied);
    assert_eq!(events[0].user, None);
    assert!(matches!(
        h.notifier.notifications()[..],
        [Notification::Denied { .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_second_factor_flow() {
    let mut h = start(EngineConfig::default()).await;

    h.handle.deliver(event(READER, b"PIN7777"));
    assert_eq!(
        h.sent.recv().await.unwrap(),
        vec![0x05, 0x02, 0x03, b'2', b'F', b'A']
    );

    h.handle.deliver(second_key(READER, b"CARD-3"));
    let reply = h.sent.recv().await.unwrap();
    assert_eq!(reply[1], 0x05);

    h.handle.shutdown().await;
    let events = h.recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Access);
    assert_eq!(events[0].user, Some(UserId::new(3)));
}

#[tokio::test(start_paused = true)]
async fn test_wrong_second_factor_is_denied() {
    let mut h = start(EngineConfig::default()).await;

    h.handle.deliver(event(READER, b"PIN7777"));
    h.sent.recv().await.unwrap();

    h.handle.deliver(second_key(READER, b"CARD-1"));
    assert_eq!(h.sent.recv().await.unwrap(), vec![0x05, 0x04, 0x00]);

    h.handle.shutdown().await;
    assert_eq!(h.recorder.events()[0].user, Some(UserId::new(3)));
}

#[tokio::test(start_paused = true)]
async fn test_session_times_out_waiting_for_second_key() {
    let mut config = EngineConfig::default();
    config.session.timeout_ms = 500;
    let mut h = start(config).await;

    h.handle.deliver(event(READER, b"PIN7777"));
    h.sent.recv().await.unwrap();

    // Nothing arrives; the deadline fires long before the first poll
    assert_eq!(h.sent.recv().await.unwrap(), vec![0x05, 0x04, 0x00]);

    // A late second key finds no session and is dropped
    h.handle.deliver(second_key(READER, b"CARD-3"));

    h.handle.shutdown().await;
    let events = h.recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Denied);
    assert_eq!(events[0].user, Some(UserId::new(3)));
}

#[tokio::test(start_paused = true)]
async fn test_reader_opens_new_session_after_decision() {
    let mut h = start(EngineConfig::default()).await;

    h.handle.deliver(event(READER, b"PIN1234"));
    assert_eq!(h.sent.recv().await.unwrap()[..3], [0x05, 0x05, 20]);

    h.handle.deliver(event(READER, b"PIN1234"));
    assert_eq!(h.sent.recv().await.unwrap()[..3], [0x05, 0x05, 20]);

    h.handle.shutdown().await;
    let events = h.recorder.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.kind == EventKind::Access));
}

#[tokio::test(start_paused = true)]
async fn test_reader_opens_new_session_after_timeout() {
    let mut config = EngineConfig::default();
    config.session.timeout_ms = 500;
    let mut h = start(config).await;

    h.handle.deliver(event(READER, b"PIN7777"));
    h.sent.recv().await.unwrap();
    assert_eq!(h.sent.recv().await.unwrap(), vec![0x05, 0x04, 0x00]);

    h.handle.deliver(event(READER, b"PIN1234"));
    assert_eq!(h.sent.recv().await.unwrap()[..3], [0x05, 0x05, 20]);

    h.handle.shutdown().await;
    let kinds: Vec<_> = h.recorder.events().iter().map(|e| e.kind.clone()).collect();
    assert_eq!(kinds, vec![EventKind::Denied, EventKind::Access]);
}

#[tokio::test(start_paused = true)]
async fn test_configured_relays_fire_without_provider() {
    let mut config = EngineConfig::default();
    config.relays.mechanical[0] = RelaySlot::new(true, 3000);
    let mut h = start_with_relays(config, None).await;

    h.handle.deliver(event(READER, b"PIN1234"));
    let reply = h.sent.recv().await.unwrap();
    assert_eq!(reply.len(), 23);
    assert_eq!(&reply[..3], &[0x05, 0x05, 20]);
    assert_eq!(&reply[3..8], &[1, 0, 0, 0x0B, 0xB8]);
    assert_eq!(&reply[8..13], &[0; 5]);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_sessions_on_different_readers_are_independent() {
    let mut h = start(EngineConfig::default()).await;
    let other = ReaderAddress::new(6);

    h.handle.deliver(event(READER, b"PIN7777"));
    h.sent.recv().await.unwrap();

    h.handle.deliver(event(other, b"PIN1234"));
    assert_eq!(h.sent.recv().await.unwrap()[..2], [0x06, 0x05]);

    h.handle.deliver(second_key(READER, b"CARD-3"));
    assert_eq!(h.sent.recv().await.unwrap()[..2], [0x05, 0x05]);

    h.handle.shutdown().await;
    assert_eq!(h.recorder.events().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_status_frames_update_reader_meta() {
    let h = start(EngineConfig::default()).await;
    let reader = ReaderAddress::new(3);
    h.handle.register_reader(reader);

    h.handle.deliver(status(ReaderAddress::CONTROLLER, b"U\x01:S3.1"));
    h.handle.deliver(status(reader, b"T22:V5:D1"));
    h.handle.deliver(status(reader, b"U\x39\x30:S2.0.1"));
    h.handle.shutdown().await;

    let controller = h.handle.reader_meta(ReaderAddress::CONTROLLER).unwrap();
    assert!(controller.is_registered());
    assert_eq!(controller.firmware_version.as_deref(), Some("3.1"));

    let meta = h.handle.reader_meta(reader).unwrap();
    assert!(meta.active);
    assert_eq!(meta.serial.as_deref(), Some("12345"));
    let counters = meta.status.unwrap();
    assert_eq!(counters.temperature, Some(22));
    assert_eq!(counters.validations, Some(5));

    let devices = h.recorder.devices();
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[2].serial.as_deref(), Some("12345"));
    assert_eq!(devices[2].temperature, Some(22));
    assert_eq!(h.handle.reader_metas().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_poll_round_asks_unregistered_devices_for_registration() {
    let mut h = start(EngineConfig::default()).await;
    h.handle.register_reader(ReaderAddress::new(2));
    h.handle.register_reader(ReaderAddress::new(4));
    h.handle.set_reader_active(ReaderAddress::new(4), false);

    assert_eq!(h.sent.recv().await.unwrap(), vec![0x00, 0x03, 0x01, b'A']);
    assert_eq!(h.sent.recv().await.unwrap(), vec![0x02, 0x03, 0x01, b'A']);

    h.handle.deliver(status(ReaderAddress::CONTROLLER, b"U\x01"));
    h.handle.deliver(status(ReaderAddress::new(2), b"U\x02"));

    // Next round: both registered, plain status requests
    assert_eq!(h.sent.recv().await.unwrap(), vec![0x00, 0x03, 0x01, b'S']);
    assert_eq!(h.sent.recv().await.unwrap(), vec![0x02, 0x03, 0x00]);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_are_rejected() {
    let h = start(EngineConfig::default()).await;

    assert!(matches!(
        h.handle.on_frame(&[0x05]),
        Err(Error::MalformedFrame { .. })
    ));
    assert!(matches!(
        h.handle.on_frame(&[0x05, 0x50, 0x00]),
        Err(Error::UnknownFrameType { code: 0x50 })
    ));
    assert!(h.handle.is_running());

    h.handle.shutdown().await;
    assert!(h.recorder.events().is_empty());
}

#[tokio::test]
async fn test_unavailable_transport_fails_start() {
    let (transport, _sent) = MockTransport::unavailable();
    let collaborators = Collaborators {
        store: Arc::new(MemoryCredentialStore::new()),
        relays: None,
        recorder: Arc::new(RecordingRecorder::new()),
        notifier: Arc::new(RecordingNotifier::new()),
    };

    let result = Coordinator::new(EngineConfig::default(), collaborators)
        .start(transport)
        .await;
    assert!(matches!(result, Err(Error::TransportUnavailable(_))));
}

#[tokio::test]
async fn test_invalid_config_fails_start() {
    let (transport, sent) = MockTransport::new();
    let mut config = EngineConfig::default();
    config.poll.interval_secs = 0;
    let collaborators = Collaborators {
        store: Arc::new(MemoryCredentialStore::new()),
        relays: None,
        recorder: Arc::new(RecordingRecorder::new()),
        notifier: Arc::new(RecordingNotifier::new()),
    };

    let result = Coordinator::new(config, collaborators).start(transport).await;
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(!sent.is_open());
}
