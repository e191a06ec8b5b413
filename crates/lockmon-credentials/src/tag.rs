use serde::{Deserialize, Serialize};
use std::fmt;

use lockmon_core::{Error, Result, constants::CREDENTIAL_TAG_LEN};

/// The 3-byte ASCII tag at the start of an event payload.
///
/// A tag names the protocol the reader used, which is not always the store
/// the key lives in: numeric codes typed on a keypad all arrive as `PIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialTag {
    Pin,
    Otp,
    Rfid,
    U2f,
    Totp,
}

impl CredentialTag {
    /// Parse the tag from the first three payload bytes.
    ///
    /// # Errors
    /// Returns `Error::UnknownCredentialTag` if the payload is too short or
    /// the tag is not one of `PIN`, `OTP`, `RFD`, `U2F`, `TOT`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmon_credentials::CredentialTag;
    ///
    /// let (tag, key) = CredentialTag::split(b"RFD\x01\x02").unwrap();
    /// assert_eq!(tag, CredentialTag::Rfid);
    /// assert_eq!(key, &[0x01, 0x02]);
    ///
    /// assert!(CredentialTag::split(b"XYZ123").is_err());
    /// ```
    pub fn split(payload: &[u8]) -> Result<(Self, &[u8])> {
        if payload.len() < CREDENTIAL_TAG_LEN {
            return Err(Error::UnknownCredentialTag {
                tag: String::from_utf8_lossy(payload).into_owned(),
            });
        }
        let (tag, key) = payload.split_at(CREDENTIAL_TAG_LEN);
        let tag = match tag {
            b"PIN" => CredentialTag::Pin,
            b"OTP" => CredentialTag::Otp,
            b"RFD" => CredentialTag::Rfid,
            b"U2F" => CredentialTag::U2f,
            b"TOT" => CredentialTag::Totp,
            other => {
                return Err(Error::UnknownCredentialTag {
                    tag: String::from_utf8_lossy(other).into_owned(),
                });
            }
        };
        Ok((tag, key))
    }

    pub fn as_bytes(self) -> &'static [u8; CREDENTIAL_TAG_LEN] {
        match self {
            CredentialTag::Pin => b"PIN",
            CredentialTag::Otp => b"OTP",
            CredentialTag::Rfid => b"RFD",
            CredentialTag::U2f => b"U2F",
            CredentialTag::Totp => b"TOT",
        }
    }
}

impl fmt::Display for CredentialTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tags are ASCII by construction
        let tag = self.as_bytes();
        write!(f, "{}{}{}", tag[0] as char, tag[1] as char, tag[2] as char)
    }
}

/// The store a credential lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Pin,
    Otp,
    Rfid,
    Totp,
    U2f,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialKind::Pin => "PIN",
            CredentialKind::Otp => "OTP",
            CredentialKind::Rfid => "RFID",
            CredentialKind::Totp => "TOTP",
            CredentialKind::U2f => "U2F",
        };
        write!(f, "{name}")
    }
}
