//! Per-kind credential validators.
//!
//! Each credential kind has its own validator type. They share the
//! [`CredentialValidator`] trait and are dispatched through the
//! [`AnyValidator`] enum, which keeps the set of kinds closed and lets the
//! session own a validator by value.
//!
//! | Kind | Rounds | Round 1 | Round 2 |
//! |------|--------|---------|---------|
//! | PIN | 1 (2 with second factor) | PIN code | RFID uid or OTP of the same user |
//! | OTP | 1 | OTP token | - |
//! | RFID | 1 | card uid | - |
//! | TOTP | 2 | enrolment id | 6-digit code |
//! | U2F | 2 | key handle | Ed25519 signature over the nonce |
//!
//! Challenges sent between rounds are opaque to everything but the validator
//! that produced them.

mod otp;
mod pin;
mod rfid;
mod totp;
mod u2f;

pub use otp::{OTP_IDENTITY_LEN, OtpValidator};
pub use pin::PinValidator;
pub use rfid::RfidValidator;
pub use totp::{TOTP_DIGITS, TOTP_STEP_SECS, TotpValidator, totp_code};
pub use u2f::{U2F_NONCE_LEN, U2fValidator};

use std::sync::Arc;

use crate::outcome::{KeyRound, ValidationOutcome};
use crate::store::CredentialStore;
use crate::tag::CredentialKind;
use lockmon_core::UserId;

/// Validation of one credential over one or two rounds.
pub trait CredentialValidator: Send {
    /// Kind of credential this validator checks.
    fn kind(&self) -> CredentialKind;

    /// Run one round.
    ///
    /// A validator that answers [`ValidationOutcome::First`] keeps whatever
    /// it needs to finish the exchange when called again with
    /// [`KeyRound::Second`].
    fn validate(&mut self, round: KeyRound<'_>) -> ValidationOutcome;

    /// User whose second round is outstanding, if any.
    fn pending_user(&self) -> Option<UserId> {
        None
    }
}

/// Enum wrapper for validator dispatch.
#[derive(Debug)]
pub enum AnyValidator {
    Pin(PinValidator),
    Otp(OtpValidator),
    Rfid(RfidValidator),
    Totp(TotpValidator),
    U2f(U2fValidator),
}

impl AnyValidator {
    /// Build the validator for `kind` over `store`.
    pub fn for_kind(kind: CredentialKind, store: Arc<dyn CredentialStore>) -> Self {
        match kind {
            CredentialKind::Pin => Self::Pin(PinValidator::new(store)),
            CredentialKind::Otp => Self::Otp(OtpValidator::new(store)),
            CredentialKind::Rfid => Self::Rfid(RfidValidator::new(store)),
            CredentialKind::Totp => Self::Totp(TotpValidator::new(store)),
            CredentialKind::U2f => Self::U2f(U2fValidator::new(store)),
        }
    }
}

impl CredentialValidator for AnyValidator {
    fn kind(&self) -> CredentialKind {
        match self {
            Self::Pin(v) => v.kind(),
            Self::Otp(v) => v.kind(),
            Self::Rfid(v) => v.kind(),
            Self::Totp(v) => v.kind(),
            Self::U2f(v) => v.kind(),
        }
    }

    fn validate(&mut self, round: KeyRound<'_>) -> ValidationOutcome {
        match self {
            Self::Pin(v) => v.validate(round),
            Self::Otp(v) => v.validate(round),
            Self::Rfid(v) => v.validate(round),
            Self::Totp(v) => v.validate(round),
            Self::U2f(v) => v.validate(round),
        }
    }

    fn pending_user(&self) -> Option<UserId> {
        match self {
            Self::Pin(v) => v.pending_user(),
            Self::Otp(v) => v.pending_user(),
            Self::Rfid(v) => v.pending_user(),
            Self::Totp(v) => v.pending_user(),
            Self::U2f(v) => v.pending_user(),
        }
    }
}

/// Outcome of a single-round lookup: enabled → `Ok`, disabled → `Denied`,
/// absent → `NotFound`.
fn single_round(store: &dyn CredentialStore, kind: CredentialKind, key: &[u8]) -> ValidationOutcome {
    match store.lookup(kind, key) {
        Some(record) if record.enabled => ValidationOutcome::Ok(record.user),
        Some(record) => ValidationOutcome::Denied(Some(record.user)),
        None => ValidationOutcome::NotFound,
    }
}

fn unexpected_second_round(kind: CredentialKind) -> ValidationOutcome {
    ValidationOutcome::Error(format!("{kind} validator received an unexpected second key"))
}

/// Shared store handle with an opaque `Debug` impl.
struct StoreRef(Arc<dyn CredentialStore>);

impl std::fmt::Debug for StoreRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialStore")
    }
}

impl std::ops::Deref for StoreRef {
    type Target = dyn CredentialStore;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
