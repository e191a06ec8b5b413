//! Host-to-reader commands.
//!
//! # Wire Format
//!
//! ```text
//! [address:1][kind:1][size:1][payload:size]
//! ```
//!
//! The size field is a single byte. A payload longer than 255 bytes is not
//! rejected: the frame is emitted with `size = 0` and no payload at all.
//! Readers treat that exactly like a command without payload.

use bytes::Bytes;
use std::fmt;
use tracing::warn;

use crate::controller::ControllerOpcode;
use crate::relay::RelaySettings;
use lockmon_core::{Error, ReaderAddress, Result, constants::*};

const REGISTRATION_REQUEST_PAYLOAD: &[u8] = &[ControllerOpcode::RegData as u8];

/// Kind byte of an outgoing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    RequestEvent = CMD_REQUEST_EVENT,
    RequestSecondKey = CMD_REQUEST_SECOND_KEY,
    RequestStatus = CMD_REQUEST_STATUS,
    RequestDenied = CMD_REQUEST_DENIED,
    RequestApproved = CMD_REQUEST_APPROVED,
}

impl CommandKind {
    /// # Errors
    /// Returns `Error::UnknownCommandKind` for bytes outside `0x01..=0x05`.
    pub fn from_u8(code: u8) -> Result<Self> {
        match code {
            CMD_REQUEST_EVENT => Ok(CommandKind::RequestEvent),
            CMD_REQUEST_SECOND_KEY => Ok(CommandKind::RequestSecondKey),
            CMD_REQUEST_STATUS => Ok(CommandKind::RequestStatus),
            CMD_REQUEST_DENIED => Ok(CommandKind::RequestDenied),
            CMD_REQUEST_APPROVED => Ok(CommandKind::RequestApproved),
            _ => Err(Error::UnknownCommandKind { code }),
        }
    }

    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` for kinds that end a validation attempt.
    #[inline]
    #[must_use]
    pub fn is_decision(self) -> bool {
        matches!(self, CommandKind::RequestApproved | CommandKind::RequestDenied)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::RequestEvent => "RequestEvent",
            CommandKind::RequestSecondKey => "RequestSecondKey",
            CommandKind::RequestStatus => "RequestStatus",
            CommandKind::RequestDenied => "RequestDenied",
            CommandKind::RequestApproved => "RequestApproved",
        };
        write!(f, "{name}")
    }
}

/// A command addressed to one reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingCommand {
    pub address: ReaderAddress,
    pub kind: CommandKind,
    pub payload: Bytes,
}

impl OutgoingCommand {
    pub fn new(address: ReaderAddress, kind: CommandKind, payload: impl Into<Bytes>) -> Self {
        OutgoingCommand {
            address,
            kind,
            payload: payload.into(),
        }
    }

    /// Approval carrying the reader's relay configuration.
    pub fn approved(address: ReaderAddress, relays: &RelaySettings) -> Self {
        Self::new(
            address,
            CommandKind::RequestApproved,
            Bytes::copy_from_slice(&relays.encode()),
        )
    }

    pub fn denied(address: ReaderAddress) -> Self {
        Self::new(address, CommandKind::RequestDenied, Bytes::new())
    }

    /// Ask the reader for a second key, forwarding an opaque challenge.
    pub fn second_key(address: ReaderAddress, challenge: impl Into<Bytes>) -> Self {
        Self::new(address, CommandKind::RequestSecondKey, challenge)
    }

    pub fn status_request(address: ReaderAddress) -> Self {
        Self::new(address, CommandKind::RequestStatus, Bytes::new())
    }

    /// Ask an unregistered reader for its uuid and firmware version.
    ///
    /// Same kind as a status request; the payload carries the `RegData`
    /// opcode the controller understands.
    pub fn registration_request(address: ReaderAddress) -> Self {
        Self::new(
            address,
            CommandKind::RequestStatus,
            Bytes::from_static(REGISTRATION_REQUEST_PAYLOAD),
        )
    }

    pub fn is_decision(&self) -> bool {
        self.kind.is_decision()
    }

    /// Encode to wire form. See [`encode_command`].
    pub fn encode(&self) -> Vec<u8> {
        encode_command(self.address, self.kind, &self.payload)
    }
}

/// Encode a reader command.
///
/// Payloads longer than [`MAX_PAYLOAD_LEN`] are dropped: the frame carries
/// `size = 0` and nothing after it.
///
/// # Examples
///
/// ```
/// use lockmon_core::ReaderAddress;
/// use lockmon_protocol::{CommandKind, encode_command};
///
/// let bytes = encode_command(ReaderAddress::new(3), CommandKind::RequestSecondKey, b"ab");
/// assert_eq!(bytes, vec![0x03, 0x02, 0x02, b'a', b'b']);
///
/// let oversized = vec![0u8; 300];
/// let bytes = encode_command(ReaderAddress::new(3), CommandKind::RequestApproved, &oversized);
/// assert_eq!(bytes, vec![0x03, 0x05, 0x00]);
/// ```
pub fn encode_command(address: ReaderAddress, kind: CommandKind, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len().min(MAX_PAYLOAD_LEN));
    buf.push(address.as_u8());
    buf.push(kind.to_u8());

    if payload.len() <= MAX_PAYLOAD_LEN {
        buf.push(payload.len() as u8);
        buf.extend_from_slice(payload);
    } else {
        warn!(
            %address,
            %kind,
            len = payload.len(),
            "payload exceeds {MAX_PAYLOAD_LEN} bytes, sending without data"
        );
        buf.push(0);
    }

    buf
}

/// Decode a reader command from wire form.
///
/// The mirror of [`encode_command`]; used by in-process transports and tests.
///
/// # Errors
///
/// Returns an error if the header is truncated, the kind byte is unknown or
/// the declared size exceeds the bytes present.
pub fn decode_command(bytes: &[u8]) -> Result<OutgoingCommand> {
    if bytes.len() < FRAME_HEADER_LEN {
        return Err(Error::malformed(format!(
            "command has {} bytes, header needs {FRAME_HEADER_LEN}",
            bytes.len()
        )));
    }

    let kind = CommandKind::from_u8(bytes[1])?;
    let size = bytes[2] as usize;
    let end = FRAME_HEADER_LEN + size;
    if bytes.len() < end {
        return Err(Error::malformed(format!(
            "declared {size} payload bytes, only {} present",
            bytes.len() - FRAME_HEADER_LEN
        )));
    }

    Ok(OutgoingCommand::new(
        ReaderAddress::new(bytes[0]),
        kind,
        Bytes::copy_from_slice(&bytes[FRAME_HEADER_LEN..end]),
    ))
}
