use lockmon_core::UserId;

/// The key presented in one round of an exchange.
///
/// Exactly one key travels per round, so the round and the key are a single
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRound<'a> {
    /// Key from the `EventWithProtocol` frame, tag stripped.
    First(&'a [u8]),
    /// Key from the `SecondKey` frame.
    Second(&'a [u8]),
}

impl<'a> KeyRound<'a> {
    pub fn key(&self) -> &'a [u8] {
        match self {
            KeyRound::First(key) | KeyRound::Second(key) => key,
        }
    }
}

/// Result of one validation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Credential accepted.
    Ok(UserId),
    /// Credential known but refused (disabled, wrong second factor).
    Denied(Option<UserId>),
    /// Credential absent from every relevant store.
    NotFound,
    /// Validation could not be carried out.
    Error(String),
    /// A second round is needed; the challenge goes back to the reader.
    First(Vec<u8>),
}

impl ValidationOutcome {
    pub fn user(&self) -> Option<UserId> {
        match self {
            ValidationOutcome::Ok(user) => Some(*user),
            ValidationOutcome::Denied(user) => *user,
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationOutcome::Ok(_))
    }

    /// Returns `true` if this outcome ends the exchange.
    pub fn is_final(&self) -> bool {
        !matches!(self, ValidationOutcome::First(_))
    }
}
