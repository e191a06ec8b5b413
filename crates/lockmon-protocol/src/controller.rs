//! Commands addressed to the controller itself.
//!
//! A controller command is always four bytes: the fixed prefix
//! `[0x00, 0x03, 0x01]` followed by a one-byte ASCII opcode. On the wire this
//! is indistinguishable from a `RequestStatus` reader command to address 0
//! with a one-byte payload.

use std::fmt;

use lockmon_core::{Error, Result, constants::*};

/// Controller opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControllerOpcode {
    Reboot = b'R',
    Temp = b'T',
    Flash = b'F',
    LongFlash = b'L',
    Status = b'S',
    RegData = b'A',
}

impl ControllerOpcode {
    /// # Errors
    /// Returns `Error::UnknownCommandKind` for unassigned opcode bytes.
    pub fn from_u8(code: u8) -> Result<Self> {
        match code {
            b'R' => Ok(ControllerOpcode::Reboot),
            b'T' => Ok(ControllerOpcode::Temp),
            b'F' => Ok(ControllerOpcode::Flash),
            b'L' => Ok(ControllerOpcode::LongFlash),
            b'S' => Ok(ControllerOpcode::Status),
            b'A' => Ok(ControllerOpcode::RegData),
            _ => Err(Error::UnknownCommandKind { code }),
        }
    }

    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ControllerOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerOpcode::Reboot => "Reboot",
            ControllerOpcode::Temp => "Temp",
            ControllerOpcode::Flash => "Flash",
            ControllerOpcode::LongFlash => "LongFlash",
            ControllerOpcode::Status => "Status",
            ControllerOpcode::RegData => "RegData",
        };
        write!(f, "{name}")
    }
}

/// A command for the controller at address 0.
///
/// # Examples
///
/// ```
/// use lockmon_protocol::{ControllerCommand, ControllerOpcode};
///
/// let reboot = ControllerCommand::new(ControllerOpcode::Reboot);
/// assert_eq!(reboot.encode(), [0x00, 0x03, 0x01, b'R']);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerCommand {
    pub opcode: ControllerOpcode,
}

impl ControllerCommand {
    pub const fn new(opcode: ControllerOpcode) -> Self {
        ControllerCommand { opcode }
    }

    pub fn encode(&self) -> [u8; CONTROLLER_COMMAND_LEN] {
        let [a, b, c] = CONTROLLER_COMMAND_PREFIX;
        [a, b, c, self.opcode.to_u8()]
    }

    /// Recognise a controller command in wire form.
    ///
    /// # Errors
    /// Returns an error if the length, prefix or opcode does not match.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CONTROLLER_COMMAND_LEN || bytes[..3] != CONTROLLER_COMMAND_PREFIX {
            return Err(Error::malformed("not a controller command"));
        }
        Ok(ControllerCommand::new(ControllerOpcode::from_u8(bytes[3])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ControllerOpcode::Reboot, b'R')]
    #[case(ControllerOpcode::Temp, b'T')]
    #[case(ControllerOpcode::Flash, b'F')]
    #[case(ControllerOpcode::LongFlash, b'L')]
    #[case(ControllerOpcode::Status, b'S')]
    #[case(ControllerOpcode::RegData, b'A')]
    fn test_encode_opcode(#[case] opcode: ControllerOpcode, #[case] byte: u8) {
        let bytes = ControllerCommand::new(opcode).encode();
        assert_eq!(bytes, [0x00, 0x03, 0x01, byte]);
        assert_eq!(ControllerCommand::decode(&bytes).unwrap().opcode, opcode);
    }

    #[test]
    fn test_decode_rejects_foreign_bytes() {
        assert!(ControllerCommand::decode(&[0x00, 0x03, 0x01]).is_err());
        assert!(ControllerCommand::decode(&[0x01, 0x03, 0x01, b'R']).is_err());
        assert!(ControllerCommand::decode(&[0x00, 0x03, 0x01, b'Z']).is_err());
    }
}
