//! Core constants for the lock-monitor serial protocol.
//!
//! Every message exchanged between the host and the controller (or the
//! readers behind it) is a short binary frame:
//!
//! ```text
//! [address:1][type:1][size:1][payload:size]
//! ```
//!
//! Where:
//! - `address` - Bus address (0 = controller, 1-255 = readers)
//! - `type` - Frame type (inbound) or command kind (outbound)
//! - `size` - Payload length in bytes (0-255)
//! - `payload` - Raw payload bytes
//!
//! Controller commands use a fixed 4-byte form:
//!
//! ```text
//! [0x00][0x03][0x01][opcode]
//! ```
//!
//! # Usage
//!
//! ```
//! use lockmon_core::constants::*;
//!
//! assert_eq!(FRAME_HEADER_LEN, 3);
//! assert_eq!(MAX_PAYLOAD_LEN, 255);
//! assert_eq!(CONTROLLER_COMMAND_PREFIX, [0x00, 0x03, 0x01]);
//! ```
//!
//! # Protocol Compliance
//!
//! The values below are fixed by the controller firmware. Modifying them
//! breaks compatibility with deployed readers.

// ============================================================================
// Frame Layout
// ============================================================================

/// Number of header bytes preceding the payload (address, type, size).
pub const FRAME_HEADER_LEN: usize = 3;

/// Largest payload a single frame can carry (the size field is one byte).
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Bus address of the controller.
pub const CONTROLLER_ADDRESS: u8 = 0x00;

// ============================================================================
// Inbound Frame Types
// ============================================================================

/// Reader heartbeat without a credential event.
pub const FRAME_NO_EVENT: u8 = 0x10;

/// Credential presented; payload starts with a 3-byte protocol tag.
pub const FRAME_EVENT_WITH_PROTOCOL: u8 = 0x20;

/// Answer to a second-key request.
pub const FRAME_SECOND_KEY: u8 = 0x30;

/// Status or registration report (ASCII token payload).
pub const FRAME_STATUS: u8 = 0x40;

// ============================================================================
// Outbound Command Kinds
// ============================================================================

/// Ask a reader for its pending event.
pub const CMD_REQUEST_EVENT: u8 = 0x01;

/// Ask a reader to collect a second key; payload is the challenge.
pub const CMD_REQUEST_SECOND_KEY: u8 = 0x02;

/// Ask a reader for its status report.
pub const CMD_REQUEST_STATUS: u8 = 0x03;

/// Tell a reader access is denied.
pub const CMD_REQUEST_DENIED: u8 = 0x04;

/// Tell a reader access is approved; payload is the relay settings.
pub const CMD_REQUEST_APPROVED: u8 = 0x05;

// ============================================================================
// Controller Commands
// ============================================================================

/// Fixed prefix of every controller command.
pub const CONTROLLER_COMMAND_PREFIX: [u8; 3] = [0x00, 0x03, 0x01];

/// Total length of a controller command.
pub const CONTROLLER_COMMAND_LEN: usize = 4;

// ============================================================================
// Status Payload
// ============================================================================

/// Separator between status tokens.
pub const STATUS_TOKEN_SEPARATOR: u8 = b':';

/// Length of the credential protocol tag at the start of an event payload.
pub const CREDENTIAL_TAG_LEN: usize = 3;

// ============================================================================
// Relay Settings
// ============================================================================

/// Number of relay slots in an approval payload.
pub const RELAY_SLOT_COUNT: usize = 4;

/// Encoded size of one relay slot (enabled byte + big-endian u32 delay).
pub const RELAY_SLOT_LEN: usize = 5;

/// Encoded size of the complete approval payload.
pub const RELAY_SETTINGS_LEN: usize = RELAY_SLOT_COUNT * RELAY_SLOT_LEN;

// ============================================================================
// Timing and Priorities
// ============================================================================

/// Default lifetime of a validation session in milliseconds.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 10_000;

/// Default status poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 45;

/// Priority used for the startup reboot (most urgent).
pub const PRIORITY_HIGHEST: i32 = i32::MIN;

/// Default priority for session-originated commands.
pub const DEFAULT_SESSION_PRIORITY: i32 = 100;

/// Default priority for poll-originated commands (less urgent).
pub const DEFAULT_POLL_PRIORITY: i32 = 200;
