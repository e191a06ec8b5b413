//! Coordinator: owns the sessions, the queue and the bus.
//!
//! # Architecture
//!
//! ```text
//!                 on_frame                  ┌─────────────┐
//!  transport ───────────────► inbound ─────►│ event loop  │──► bookkeeping
//!   reader                    (mpsc)        │ sessions    │    worker
//!                                           │ deadlines   │
//!                                           └──────┬──────┘
//!                                                  │ replies
//!  ┌───────────┐   poll commands        ┌──────────▼──────┐        ┌────────────┐
//!  │ poll loop │───────────────────────►│ DispatchQueue   │───────►│ drain loop │──► Transport::send
//!  └───────────┘                        └─────────────────┘        └────────────┘
//! ```
//!
//! The event loop is the only task touching the session table and the
//! deadline heap. Reader metadata is shared behind a lock so handles can
//! read snapshots. The drain loop owns the transport.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use lockmon_credentials::MemoryCredentialStore;
//! use lockmon_engine::mock::{MockTransport, RecordingNotifier, RecordingRecorder};
//! use lockmon_engine::{Collaborators, Coordinator, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> lockmon_core::Result<()> {
//!     let collaborators = Collaborators {
//!         store: Arc::new(MemoryCredentialStore::new()),
//!         relays: None,
//!         recorder: Arc::new(RecordingRecorder::new()),
//!         notifier: Arc::new(RecordingNotifier::new()),
//!     };
//!     let (transport, mut sent) = MockTransport::new();
//!
//!     let handle = Coordinator::new(EngineConfig::default(), collaborators)
//!         .start(transport)
//!         .await?;
//!
//!     // The controller is rebooted first
//!     assert_eq!(sent.recv().await, Some(vec![0x00, 0x03, 0x01, b'R']));
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::bookkeeping::{Bookkeeper, BookkeepingJob, BookkeepingWorker};
use crate::config::{EngineConfig, PollConfig, SessionConfig};
use crate::deadline::{DeadlineHeap, DeadlineToken};
use crate::meta::{ReaderMeta, ReaderMetaTable};
use crate::queue::{DispatchQueue, Outbound};
use crate::relay::{RelaySettingsProvider, StaticRelaySettings};
use crate::session::{ReaderSession, SessionContext, SessionInput, Transition};
use crate::transport::Transport;
use lockmon_core::constants::PRIORITY_HIGHEST;
use lockmon_core::{Error, ReaderAddress, Result};
use lockmon_credentials::{AccessEvent, CredentialStore, DeviceReport, EventRecorder, Notifier};
use lockmon_protocol::{
    ControllerCommand, ControllerOpcode, FrameType, IncomingFrame, OutgoingCommand,
};

/// External collaborators of the coordinator.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn CredentialStore>,
    /// Sensor mapping and relay settings. `None` fires the relays of
    /// [`EngineConfig::relays`] for every sensor.
    pub relays: Option<Arc<dyn RelaySettingsProvider>>,
    pub recorder: Arc<dyn EventRecorder>,
    pub notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Coordinator ready to start.
#[derive(Debug)]
pub struct Coordinator {
    config: EngineConfig,
    collaborators: Collaborators,
}

impl Coordinator {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        Coordinator {
            config,
            collaborators,
        }
    }

    /// Open the transport and start every task.
    ///
    /// A controller reboot is queued at the highest priority before the poll
    /// loop starts, so it is always the first command on the bus. The first
    /// poll round runs one interval after start.
    ///
    /// # Errors
    /// - `Error::Config` if the configuration fails validation.
    /// - `Error::TransportUnavailable` if the transport cannot be opened.
    pub async fn start<T: Transport>(self, mut transport: T) -> Result<CoordinatorHandle> {
        let Coordinator {
            config,
            collaborators,
        } = self;
        config.validate()?;

        transport.open().await.map_err(|e| match e {
            Error::TransportUnavailable(_) => e,
            other => Error::TransportUnavailable(other.to_string()),
        })?;
        info!("transport open");

        let queue = Arc::new(DispatchQueue::new());
        queue.enqueue(
            ControllerCommand::new(ControllerOpcode::Reboot).into(),
            PRIORITY_HIGHEST,
        );

        let meta = Arc::new(ReaderMetaTable::new());
        let (shutdown_tx, _) = watch::channel(false);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let worker = BookkeepingWorker::new(
            collaborators.recorder,
            collaborators.notifier,
            config.notifications.clone(),
        );
        let (bookkeeper, bookkeeping_task) = Bookkeeper::new(config.bookkeeping.capacity, worker);
        let relays = collaborators.relays.unwrap_or_else(|| {
            Arc::new(StaticRelaySettings::new(config.relays)) as Arc<dyn RelaySettingsProvider>
        });

        let mut tasks = JoinSet::new();
        tasks.spawn(bookkeeping_task.run());
        tasks.spawn(drain_loop(
            transport,
            Arc::clone(&queue),
            shutdown_tx.subscribe(),
        ));
        tasks.spawn(
            EventLoop {
                sessions: HashMap::new(),
                deadlines: DeadlineHeap::new(),
                inbound: inbound_rx,
                queue: Arc::clone(&queue),
                meta: Arc::clone(&meta),
                bookkeeper,
                store: collaborators.store,
                relays,
                session: config.session.clone(),
                shutdown: shutdown_tx.subscribe(),
            }
            .run(),
        );
        tasks.spawn(poll_loop(
            Arc::clone(&meta),
            Arc::clone(&queue),
            config.poll.clone(),
            shutdown_tx.subscribe(),
        ));

        info!(
            poll_interval_secs = config.poll.interval_secs,
            session_timeout_ms = config.session.timeout_ms,
            "coordinator started"
        );

        Ok(CoordinatorHandle {
            inner: Arc::new(Shared {
                inbound: inbound_tx,
                meta,
                queue,
                shutdown: shutdown_tx,
                tasks: tokio::sync::Mutex::new(tasks),
            }),
        })
    }
}

struct Shared {
    inbound: mpsc::UnboundedSender<IncomingFrame>,
    meta: Arc<ReaderMetaTable>,
    queue: Arc<DispatchQueue<Outbound>>,
    shutdown: watch::Sender<bool>,
    tasks: tokio::sync::Mutex<JoinSet<()>>,
}

/// Cheap, cloneable handle to a running coordinator.
///
/// Dropping every handle stops the coordinator as well; call
/// [`shutdown`](Self::shutdown) to wait for it.
#[derive(Clone)]
pub struct CoordinatorHandle {
    inner: Arc<Shared>,
}

impl CoordinatorHandle {
    /// Entry point for the transport: decode and route one message.
    ///
    /// # Errors
    /// Returns the decode error for malformed frames and frames of unknown
    /// type. Bus noise is already logged here, so transports are expected to
    /// discard the error and keep reading.
    pub fn on_frame(&self, bytes: &[u8]) -> Result<()> {
        match IncomingFrame::decode(bytes) {
            Ok(frame) => {
                self.deliver(frame);
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, len = bytes.len(), "discarding frame");
                Err(e)
            }
        }
    }

    /// Route an already decoded frame.
    pub fn deliver(&self, frame: IncomingFrame) {
        if self.inner.inbound.send(frame).is_err() {
            warn!("coordinator stopped, frame dropped");
        }
    }

    /// Add a reader to the poll set.
    pub fn register_reader(&self, address: ReaderAddress) {
        self.inner.meta.register(address);
        info!(%address, "reader registered");
    }

    /// Start or stop polling a known reader. Returns `false` for unknown
    /// addresses and the controller.
    pub fn set_reader_active(&self, address: ReaderAddress, active: bool) -> bool {
        self.inner.meta.set_active(address, active)
    }

    pub fn reader_meta(&self, address: ReaderAddress) -> Option<ReaderMeta> {
        self.inner.meta.get(address)
    }

    /// Snapshot of every known device, controller first.
    pub fn reader_metas(&self) -> Vec<ReaderMeta> {
        self.inner.meta.snapshot()
    }

    /// Commands waiting for the drain loop.
    pub fn pending_commands(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn is_running(&self) -> bool {
        !*self.inner.shutdown.borrow()
    }

    /// Stop polling and draining, release the transport and drop pending
    /// commands. Waits for every task to finish. Later calls return
    /// immediately.
    pub async fn shutdown(&self) {
        if self.inner.shutdown.send_replace(true) {
            return;
        }

        let mut tasks = self.inner.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result
                && e.is_panic()
            {
                error!(error = %e, "coordinator task panicked");
            }
        }
        self.inner.queue.clear();
        info!("coordinator stopped");
    }
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("running", &self.is_running())
            .field("pending_commands", &self.pending_commands())
            .finish()
    }
}

struct LiveSession {
    session: ReaderSession,
    deadline: DeadlineToken,
}

struct EventLoop {
    sessions: HashMap<ReaderAddress, LiveSession>,
    deadlines: DeadlineHeap,
    inbound: mpsc::UnboundedReceiver<IncomingFrame>,
    queue: Arc<DispatchQueue<Outbound>>,
    meta: Arc<ReaderMetaTable>,
    bookkeeper: Bookkeeper,
    store: Arc<dyn CredentialStore>,
    relays: Arc<dyn RelaySettingsProvider>,
    session: SessionConfig,
    shutdown: watch::Receiver<bool>,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            let next_deadline = self.deadlines.next_deadline();
            tokio::select! {
                _ = self.shutdown.changed() => break,
                frame = self.inbound.recv() => match frame {
                    Some(frame) => self.route(frame),
                    None => break,
                },
                _ = wait_until(next_deadline) => self.expire(Instant::now()),
            }
        }

        // Frames accepted before shutdown are still routed
        while let Ok(frame) = self.inbound.try_recv() {
            self.route(frame);
        }
        debug!(open_sessions = self.sessions.len(), "event loop stopped");
    }

    fn route(&mut self, frame: IncomingFrame) {
        let address = frame.address();

        if let Some(live) = self.sessions.get_mut(&address) {
            let ctx = SessionContext {
                store: &self.store,
                relays: self.relays.as_ref(),
            };
            let transition = live.session.step(SessionInput::Frame(&frame), &ctx);
            self.apply(address, transition);
            return;
        }

        if frame.is_status() || frame.is_registration() {
            let meta = self.meta.apply_frame(&frame, Utc::now());
            debug!(
                %address,
                registered = meta.is_registered(),
                "device metadata updated"
            );
            self.bookkeeper
                .dispatch(BookkeepingJob::Device(DeviceReport::from(&meta)));
            return;
        }

        if frame.frame_type() == FrameType::EventWithProtocol {
            self.open_session(&frame);
        } else {
            trace!(%address, frame_type = %frame.frame_type(), "no session, frame dropped");
        }
    }

    fn open_session(&mut self, frame: &IncomingFrame) {
        let address = frame.address();
        let sensor = self.relays.sensor_for(address);
        let deadline_at = Instant::now() + self.session.timeout();
        let deadline = self.deadlines.schedule(address, deadline_at);

        let mut session = ReaderSession::new(address, sensor, deadline_at);
        let ctx = SessionContext {
            store: &self.store,
            relays: self.relays.as_ref(),
        };
        let transition = session.step(SessionInput::Frame(frame), &ctx);

        debug!(%address, %sensor, "session opened");
        self.sessions.insert(address, LiveSession { session, deadline });
        self.apply(address, transition);
    }

    fn expire(&mut self, now: Instant) {
        for (address, token) in self.deadlines.pop_expired(now) {
            let Some(live) = self.sessions.get_mut(&address) else {
                continue;
            };
            if live.deadline != token {
                continue;
            }

            info!(%address, "{}", Error::SessionTimeout { address: address.as_u8() });
            let ctx = SessionContext {
                store: &self.store,
                relays: self.relays.as_ref(),
            };
            let transition = live.session.step(SessionInput::Timeout, &ctx);
            self.apply(address, transition);
        }
    }

    fn apply(&mut self, address: ReaderAddress, transition: Transition) {
        if let Some(reply) = &transition.reply {
            self.send(reply.clone());
        }

        if transition.reset_deadline
            && let Some(live) = self.sessions.get_mut(&address)
        {
            let at = Instant::now() + self.session.timeout();
            live.deadline = self.deadlines.schedule(address, at);
            live.session.set_deadline(at);
        }

        if !transition.is_terminal() {
            return;
        }

        let Some(live) = self.sessions.remove(&address) else {
            return;
        };
        self.deadlines.cancel(address, live.deadline);

        if let Some(outcome) = &transition.outcome {
            info!(%address, decision = %transition.to, user = ?outcome.user(), "access decided");
            if let Some(event) = AccessEvent::from_outcome(
                address,
                live.session.sensor(),
                live.session.credential(),
                outcome,
                Utc::now(),
            ) {
                self.bookkeeper.dispatch(BookkeepingJob::Access(event));
            }
        }
    }

    fn send(&self, command: OutgoingCommand) {
        self.queue.enqueue(command.into(), self.session.priority);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Queue one poll round. Returns the number of commands queued.
pub(crate) fn poll_once(
    meta: &ReaderMetaTable,
    queue: &DispatchQueue<Outbound>,
    priority: i32,
) -> usize {
    let opcode = if meta.controller().is_registered() {
        ControllerOpcode::Status
    } else {
        ControllerOpcode::RegData
    };
    queue.enqueue(ControllerCommand::new(opcode).into(), priority);

    let readers = meta.active_readers();
    for reader in &readers {
        let command = if reader.is_registered() {
            OutgoingCommand::status_request(reader.address)
        } else {
            OutgoingCommand::registration_request(reader.address)
        };
        queue.enqueue(command.into(), priority);
    }

    trace!(readers = readers.len(), "poll round queued");
    readers.len() + 1
}

async fn poll_loop(
    meta: Arc<ReaderMetaTable>,
    queue: Arc<DispatchQueue<Outbound>>,
    poll: PollConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = poll.interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                poll_once(&meta, &queue, poll.priority);
            }
        }
    }
    debug!("poll loop stopped");
}

async fn drain_loop<T: Transport>(
    mut transport: T,
    queue: Arc<DispatchQueue<Outbound>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let item = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            item = queue.dequeue() => item,
        };

        let frame = item.encode();
        match transport.send(&frame).await {
            Ok(()) => trace!(address = %item.address(), len = frame.len(), "command sent"),
            Err(e) => error!(address = %item.address(), error = %e, "failed to send command"),
        }
    }

    transport.stop().await;
    debug!("drain loop stopped, transport released");
}
