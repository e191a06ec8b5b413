use std::sync::Arc;

use super::{CredentialValidator, StoreRef, single_round, unexpected_second_round};
use crate::outcome::{KeyRound, ValidationOutcome};
use crate::store::CredentialStore;
use crate::tag::CredentialKind;

/// Length of the public identity that prefixes every OTP token.
pub const OTP_IDENTITY_LEN: usize = 12;

/// Hardware OTP token.
///
/// The token's public identity (its first 12 characters) selects the record;
/// the remainder changes on every press and is not stored.
#[derive(Debug)]
pub struct OtpValidator {
    store: StoreRef,
}

impl OtpValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        OtpValidator {
            store: StoreRef(store),
        }
    }
}

impl CredentialValidator for OtpValidator {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Otp
    }

    fn validate(&mut self, round: KeyRound<'_>) -> ValidationOutcome {
        match round {
            KeyRound::First(token) if token.len() < OTP_IDENTITY_LEN => ValidationOutcome::Error(
                format!("OTP token of {} bytes has no public identity", token.len()),
            ),
            KeyRound::First(token) => {
                single_round(&*self.store, CredentialKind::Otp, &token[..OTP_IDENTITY_LEN])
            }
            KeyRound::Second(_) => unexpected_second_round(CredentialKind::Otp),
        }
    }
}
