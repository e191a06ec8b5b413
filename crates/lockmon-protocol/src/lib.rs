//! Binary framing for the lock-monitor serial bus.
//!
//! Three wire shapes travel over the bus:
//!
//! - [`IncomingFrame`]: reader/controller → host
//! - [`OutgoingCommand`]: host → reader
//! - [`ControllerCommand`]: host → controller (fixed 4 bytes)
//!
//! Frames arrive already separated from the byte stream; this crate only
//! deals with the content of a single frame.

pub mod command;
pub mod controller;
pub mod frame;
pub mod relay;
pub mod status;

pub use command::{CommandKind, OutgoingCommand, decode_command, encode_command};
pub use controller::{ControllerCommand, ControllerOpcode};
pub use frame::{FrameType, IncomingFrame};
pub use relay::{RelaySettings, RelaySlot};
pub use status::{Registration, StatusReport, parse_status_payload};
