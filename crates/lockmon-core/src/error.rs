use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("Unknown frame type: 0x{code:02X}")]
    UnknownFrameType { code: u8 },

    #[error("Unknown command kind: 0x{code:02X}")]
    UnknownCommandKind { code: u8 },

    // Credential errors
    #[error("Unknown credential tag: {tag}")]
    UnknownCredentialTag { tag: String },

    #[error("Credential not found in any store")]
    CredentialLookupFailure,

    // Session errors
    #[error("Session timeout for reader {address}")]
    SessionTimeout { address: u8 },

    // Infrastructure errors
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Async dispatch unavailable: {0}")]
    AsyncDispatchUnavailable(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed frame error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::TransportUnavailable(_) | Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
