//! In-memory collaborators for tests and development.
//!
//! [`MockTransport`] records everything the coordinator writes and exposes it
//! through a [`MockTransportHandle`]. [`RecordingRecorder`] and
//! [`RecordingNotifier`] keep what they receive.
//!
//! # Examples
//!
//! ```
//! use lockmon_engine::Transport;
//! use lockmon_engine::mock::MockTransport;
//!
//! #[tokio::main]
//! async fn main() -> lockmon_core::Result<()> {
//!     let (mut transport, mut handle) = MockTransport::new();
//!     transport.open().await?;
//!     transport.send(&[0x01, 0x04, 0x00]).await?;
//!
//!     assert_eq!(handle.recv().await, Some(vec![0x01, 0x04, 0x00]));
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::transport::Transport;
use lockmon_core::{Error, Result};
use lockmon_credentials::{
    AccessEvent, DeviceReport, EventRecorder, Notification, Notifier, ReportError,
};

/// Transport that keeps written frames in memory.
#[derive(Debug)]
pub struct MockTransport {
    sent_tx: mpsc::UnboundedSender<Vec<u8>>,
    state: Arc<MockState>,
    fail_open: bool,
}

#[derive(Debug, Default)]
struct MockState {
    open: AtomicBool,
    stopped: AtomicBool,
}

impl MockTransport {
    /// Create a working transport.
    pub fn new() -> (Self, MockTransportHandle) {
        Self::build(false)
    }

    /// Create a transport whose `open` fails.
    pub fn unavailable() -> (Self, MockTransportHandle) {
        Self::build(true)
    }

    fn build(fail_open: bool) -> (Self, MockTransportHandle) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let state = Arc::new(MockState::default());
        (
            MockTransport {
                sent_tx,
                state: Arc::clone(&state),
                fail_open,
            },
            MockTransportHandle { sent_rx, state },
        )
    }
}

impl Transport for MockTransport {
    async fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(Error::TransportUnavailable("mock device absent".into()));
        }
        self.state.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        if !self.state.open.load(Ordering::SeqCst) {
            return Err(Error::TransportUnavailable("mock device not open".into()));
        }
        self.sent_tx
            .send(frame.to_vec())
            .map_err(|_| Error::TransportUnavailable("mock handle dropped".into()))
    }

    async fn stop(&mut self) {
        self.state.open.store(false, Ordering::SeqCst);
        self.state.stopped.store(true, Ordering::SeqCst);
    }
}

/// Test side of a [`MockTransport`].
#[derive(Debug)]
pub struct MockTransportHandle {
    sent_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    state: Arc<MockState>,
}

impl MockTransportHandle {
    /// Next frame written by the coordinator.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.sent_rx.recv().await
    }

    /// Next frame if one was already written.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.sent_rx.try_recv().ok()
    }

    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }
}

/// Recorder that keeps events in memory.
#[derive(Debug, Default)]
pub struct RecordingRecorder {
    events: Mutex<Vec<AccessEvent>>,
    devices: Mutex<Vec<DeviceReport>>,
    fail: bool,
}

impl RecordingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder that rejects every event.
    pub fn failing() -> Self {
        RecordingRecorder {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<AccessEvent> {
        self.events.lock().clone()
    }

    pub fn devices(&self) -> Vec<DeviceReport> {
        self.devices.lock().clone()
    }
}

impl EventRecorder for RecordingRecorder {
    fn record(&self, event: &AccessEvent) -> std::result::Result<(), ReportError> {
        if self.fail {
            return Err(ReportError::Unavailable("recorder offline".into()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn record_device(&self, report: &DeviceReport) -> std::result::Result<(), ReportError> {
        if self.fail {
            return Err(ReportError::Unavailable("recorder offline".into()));
        }
        self.devices.lock().push(report.clone());
        Ok(())
    }
}

/// Notifier that keeps notifications in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> std::result::Result<(), ReportError> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}
