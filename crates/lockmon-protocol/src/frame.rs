use bytes::Bytes;
use std::fmt;

use crate::status::{Registration, StatusReport, parse_status_payload};
use lockmon_core::{Error, ReaderAddress, Result, constants::*};

/// Type byte of an inbound frame.
///
/// The set is closed: any other value marks the frame as line noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Heartbeat, nothing presented.
    NoEvent = FRAME_NO_EVENT,

    /// A credential was presented. The payload starts with a 3-byte tag.
    EventWithProtocol = FRAME_EVENT_WITH_PROTOCOL,

    /// Second key of a two-round exchange.
    SecondKey = FRAME_SECOND_KEY,

    /// Status or registration report.
    Status = FRAME_STATUS,
}

impl FrameType {
    /// Map a raw type byte to a frame type.
    ///
    /// # Errors
    /// Returns `Error::UnknownFrameType` for bytes outside `{0x10,0x20,0x30,0x40}`.
    #[inline]
    pub fn from_u8(code: u8) -> Result<Self> {
        match code {
            FRAME_NO_EVENT => Ok(FrameType::NoEvent),
            FRAME_EVENT_WITH_PROTOCOL => Ok(FrameType::EventWithProtocol),
            FRAME_SECOND_KEY => Ok(FrameType::SecondKey),
            FRAME_STATUS => Ok(FrameType::Status),
            _ => Err(Error::UnknownFrameType { code }),
        }
    }

    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameType::NoEvent => "NoEvent",
            FrameType::EventWithProtocol => "EventWithProtocol",
            FrameType::SecondKey => "SecondKey",
            FrameType::Status => "Status",
        };
        write!(f, "{name}")
    }
}

/// A decoded frame received from the controller or one of its readers.
///
/// # Wire Format
///
/// ```text
/// [address:1][type:1][size:1][payload:size]
///  ^^^^^^^^^  ^^^^^^  ^^^^^^  ^^^^^^^^^^^^^
///  0=ctrl     0x10    0-255   raw bytes
///             0x20
///             0x30
///             0x40
/// ```
///
/// For `Status` frames the payload is an ASCII token list which is parsed
/// eagerly into [`StatusReport`] and [`Registration`].
///
/// # Protocol Flow Example
///
/// **1. Reader presents a PIN**
/// ```text
/// 05 20 07 'P' 'I' 'N' '1' '2' '3' '4'
/// ^^ ^^ ^^ ^^^^^^^^^^^ ^^^^^^^^^^^^^^^
/// ID EV SZ Tag         Key
/// ```
///
/// **2. Controller reports status**
/// ```text
/// 00 40 09 "T22:V5:D1"
/// ```
///
/// # Examples
///
/// ```
/// use lockmon_protocol::{FrameType, IncomingFrame};
///
/// let frame = IncomingFrame::decode(&[0x05, 0x20, 0x07, b'P', b'I', b'N', b'1', b'2', b'3', b'4']).unwrap();
/// assert_eq!(frame.address().as_u8(), 5);
/// assert_eq!(frame.frame_type(), FrameType::EventWithProtocol);
/// assert_eq!(frame.payload(), b"PIN1234");
///
/// // Unknown type bytes are rejected
/// assert!(IncomingFrame::decode(&[0x05, 0x50, 0x00]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFrame {
    address: ReaderAddress,
    frame_type: FrameType,
    payload: Bytes,
    status: Option<StatusReport>,
    registration: Option<Registration>,
}

impl IncomingFrame {
    /// Decode a single de-framed message.
    ///
    /// Bytes beyond `3 + size` are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The buffer is shorter than the 3-byte header (`MalformedFrame`)
    /// - The type byte is outside the closed set (`UnknownFrameType`)
    /// - The declared size exceeds the bytes present (`MalformedFrame`)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(Error::malformed(format!(
                "frame has {} bytes, header needs {FRAME_HEADER_LEN}",
                bytes.len()
            )));
        }

        let address = ReaderAddress::new(bytes[0]);
        let frame_type = FrameType::from_u8(bytes[1])?;
        let size = bytes[2] as usize;

        let end = FRAME_HEADER_LEN + size;
        if bytes.len() < end {
            return Err(Error::malformed(format!(
                "declared {size} payload bytes, only {} present",
                bytes.len() - FRAME_HEADER_LEN
            )));
        }
        let payload = Bytes::copy_from_slice(&bytes[FRAME_HEADER_LEN..end]);

        let (status, registration) = if frame_type == FrameType::Status && size > 0 {
            parse_status_payload(&payload)
        } else {
            (None, None)
        };

        Ok(IncomingFrame {
            address,
            frame_type,
            payload,
            status,
            registration,
        })
    }

    /// Build a frame directly (used by tests and in-process transports).
    pub fn new(address: ReaderAddress, frame_type: FrameType, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let (status, registration) = if frame_type == FrameType::Status && !payload.is_empty() {
            parse_status_payload(&payload)
        } else {
            (None, None)
        };
        IncomingFrame {
            address,
            frame_type,
            payload,
            status,
            registration,
        }
    }

    pub fn address(&self) -> ReaderAddress {
        self.address
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Parsed `T`/`V`/`D` tokens, if any were present.
    pub fn status(&self) -> Option<&StatusReport> {
        self.status.as_ref()
    }

    /// Parsed `U`/`S` tokens, if any were present.
    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    pub fn is_status(&self) -> bool {
        self.status.is_some()
    }

    pub fn is_registration(&self) -> bool {
        self.registration.is_some()
    }

    /// Encode back to wire form.
    ///
    /// Payloads over 255 bytes cannot come out of [`decode`](Self::decode);
    /// frames built with [`new`](Self::new) are truncated to 255 bytes.
    pub fn encode(&self) -> Vec<u8> {
        let len = self.payload.len().min(MAX_PAYLOAD_LEN);
        let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + len);
        buf.push(self.address.as_u8());
        buf.push(self.frame_type.to_u8());
        buf.push(len as u8);
        buf.extend_from_slice(&self.payload[..len]);
        buf
    }
}
