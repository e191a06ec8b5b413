use std::sync::Arc;

use super::{CredentialValidator, OTP_IDENTITY_LEN, StoreRef};
use crate::outcome::{KeyRound, ValidationOutcome};
use crate::store::CredentialStore;
use crate::tag::CredentialKind;
use lockmon_core::UserId;

/// Challenge sent when a PIN needs a second factor. Readers answer with the
/// next credential the visitor presents.
const SECOND_FACTOR_CHALLENGE: &[u8] = b"2FA";

/// Kinds accepted as second factor after a PIN, in lookup order.
const SECOND_FACTOR_KINDS: [CredentialKind; 2] = [CredentialKind::Rfid, CredentialKind::Otp];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PinState {
    Fresh,
    AwaitingSecondFactor(UserId),
}

/// Numeric PIN.
///
/// A PIN record flagged `second_factor` is not enough on its own: the first
/// round answers with a challenge and the second round must present an
/// enabled RFID badge or OTP token of the same user.
#[derive(Debug)]
pub struct PinValidator {
    store: StoreRef,
    state: PinState,
}

impl PinValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        PinValidator {
            store: StoreRef(store),
            state: PinState::Fresh,
        }
    }

    fn first_round(&mut self, code: &[u8]) -> ValidationOutcome {
        let Some(record) = self.store.lookup(CredentialKind::Pin, code) else {
            return ValidationOutcome::NotFound;
        };

        if !record.enabled {
            return ValidationOutcome::Denied(Some(record.user));
        }

        if record.second_factor {
            self.state = PinState::AwaitingSecondFactor(record.user);
            return ValidationOutcome::First(SECOND_FACTOR_CHALLENGE.to_vec());
        }

        ValidationOutcome::Ok(record.user)
    }

    fn second_round(&mut self, user: UserId, key: &[u8]) -> ValidationOutcome {
        self.state = PinState::Fresh;

        let matched = SECOND_FACTOR_KINDS.iter().any(|&kind| {
            let lookup_key = match kind {
                CredentialKind::Otp if key.len() >= OTP_IDENTITY_LEN => &key[..OTP_IDENTITY_LEN],
                CredentialKind::Otp => return false,
                _ => key,
            };
            self.store
                .lookup(kind, lookup_key)
                .is_some_and(|record| record.enabled && record.user == user)
        });

        if matched {
            ValidationOutcome::Ok(user)
        } else {
            ValidationOutcome::Denied(Some(user))
        }
    }
}

impl CredentialValidator for PinValidator {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Pin
    }

    fn pending_user(&self) -> Option<UserId> {
        match self.state {
            PinState::AwaitingSecondFactor(user) => Some(user),
            PinState::Fresh => None,
        }
    }

    fn validate(&mut self, round: KeyRound<'_>) -> ValidationOutcome {
        match (round, self.state) {
            (KeyRound::First(code), PinState::Fresh) => self.first_round(code),
            (KeyRound::Second(key), PinState::AwaitingSecondFactor(user)) => {
                self.second_round(user, key)
            }
            (KeyRound::First(_), PinState::AwaitingSecondFactor(user)) => {
                self.state = PinState::Fresh;
                ValidationOutcome::Denied(Some(user))
            }
            (KeyRound::Second(_), PinState::Fresh) => {
                ValidationOutcome::Error("PIN second key without a first round".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyRecord, MemoryCredentialStore};

    fn store() -> Arc<MemoryCredentialStore> {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(b"1234", KeyRecord::new(UserId::new(1), CredentialKind::Pin));
        store.insert(b"0000", KeyRecord::new(UserId::new(2), CredentialKind::Pin).disabled());
        store.insert(
            b"5555",
            KeyRecord::new(UserId::new(3), CredentialKind::Pin).with_second_factor(),
        );
        store.insert(b"CARD-3", KeyRecord::new(UserId::new(3), CredentialKind::Rfid));
        store.insert(b"CARD-1", KeyRecord::new(UserId::new(1), CredentialKind::Rfid));
        store
    }

    #[test]
    fn test_enabled_pin_is_ok() {
        let mut validator = PinValidator::new(store());
        assert_eq!(
            validator.validate(KeyRound::First(b"1234")),
            ValidationOutcome::Ok(UserId::new(1))
        );
    }

    #[test]
    fn test_disabled_pin_is_denied() {
        let mut validator = PinValidator::new(store());
        assert_eq!(
            validator.validate(KeyRound::First(b"0000")),
            ValidationOutcome::Denied(Some(UserId::new(2)))
        );
    }

    #[test]
    fn test_unknown_pin_is_not_found() {
        let mut validator = PinValidator::new(store());
        assert_eq!(
            validator.validate(KeyRound::First(b"9999")),
            ValidationOutcome::NotFound
        );
    }

    #[test]
    fn test_pending_user_while_awaiting_second_factor() {
        let mut validator = PinValidator::new(store());
        assert_eq!(validator.pending_user(), None);

        validator.validate(KeyRound::First(b"5555"));
        assert_eq!(validator.pending_user(), Some(UserId::new(3)));

        validator.validate(KeyRound::Second(b"CARD-3"));
        assert_eq!(validator.pending_user(), None);
    }

    #[test]
    fn test_second_factor_same_user() {
        let mut validator = PinValidator::new(store());
        assert_eq!(
            validator.validate(KeyRound::First(b"5555")),
            ValidationOutcome::First(b"2FA".to_vec())
        );
        assert_eq!(
            validator.validate(KeyRound::Second(b"CARD-3")),
            ValidationOutcome::Ok(UserId::new(3))
        );
    }

    #[test]
    fn test_second_factor_other_user_is_denied() {
        let mut validator = PinValidator::new(store());
        validator.validate(KeyRound::First(b"5555"));
        assert_eq!(
            validator.validate(KeyRound::Second(b"CARD-1")),
            ValidationOutcome::Denied(Some(UserId::new(3)))
        );
    }

    #[test]
    fn test_second_key_without_first_round() {
        let mut validator = PinValidator::new(store());
        assert!(matches!(
            validator.validate(KeyRound::Second(b"CARD-3")),
            ValidationOutcome::Error(_)
        ));
    }
}
