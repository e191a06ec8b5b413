//! Coordinator core of the lock monitor.
//!
//! The engine sits between the serial bus and the credential layer:
//!
//! - Incoming frames are routed to a per-reader [`ReaderSession`], or update
//!   the cached [`ReaderMeta`] of the device that sent them.
//! - Every command for the bus goes through one [`DispatchQueue`] and is
//!   written by a single drain loop, so decisions overtake routine polling.
//! - A poll loop periodically asks the controller and every active reader
//!   for status, or for registration data while they are unregistered.
//! - Recording and notification run on a separate worker and never delay a
//!   decision.
//!
//! # Design Philosophy
//!
//! - **Single writer**: only the drain loop touches [`Transport::send`].
//! - **Single owner**: only the event loop touches sessions and deadlines.
//! - **Async-first**: native `async fn` in traits (Edition 2024 RPITIT).
//!
//! See [`coordinator`] for a complete example.

pub mod bookkeeping;
pub mod config;
pub mod coordinator;
pub mod deadline;
pub mod meta;
pub mod mock;
pub mod queue;
pub mod relay;
pub mod session;
pub mod transport;

pub use bookkeeping::{Bookkeeper, BookkeepingJob, BookkeepingTask, BookkeepingWorker};
pub use config::{BookkeepingConfig, EngineConfig, PollConfig, SessionConfig};
pub use coordinator::{Collaborators, Coordinator, CoordinatorHandle};
pub use deadline::{DeadlineHeap, DeadlineToken};
pub use meta::{ReaderMeta, ReaderMetaTable};
pub use queue::{DispatchQueue, Outbound};
pub use relay::{RelaySettingsProvider, StaticRelaySettings};
pub use session::{ReaderSession, SessionContext, SessionInput, SessionState, Transition};
pub use transport::Transport;
