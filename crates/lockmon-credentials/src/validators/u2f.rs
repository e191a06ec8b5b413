use std::sync::Arc;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use tracing::debug;

use super::{CredentialValidator, StoreRef};
use crate::outcome::{KeyRound, ValidationOutcome};
use crate::store::CredentialStore;
use crate::tag::CredentialKind;
use lockmon_core::UserId;

/// Length of the random nonce the key must sign.
pub const U2F_NONCE_LEN: usize = 32;

#[derive(Debug)]
enum U2fState {
    Fresh,
    AwaitingSignature {
        user: UserId,
        key: VerifyingKey,
        nonce: [u8; U2F_NONCE_LEN],
    },
}

/// Security key challenge-response.
///
/// Round 1 names the key handle. The registered record holds the key's
/// Ed25519 public key; the reader receives a fresh nonce and round 2 must be
/// a signature over exactly that nonce.
#[derive(Debug)]
pub struct U2fValidator {
    store: StoreRef,
    state: U2fState,
}

impl U2fValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        U2fValidator {
            store: StoreRef(store),
            state: U2fState::Fresh,
        }
    }

    fn challenge(&mut self, handle: &[u8]) -> ValidationOutcome {
        let Some(record) = self.store.lookup(CredentialKind::U2f, handle) else {
            return ValidationOutcome::NotFound;
        };
        if !record.enabled {
            return ValidationOutcome::Denied(Some(record.user));
        }

        let key = <[u8; 32]>::try_from(record.secret.as_slice())
            .ok()
            .and_then(|bytes| VerifyingKey::from_bytes(&bytes).ok());
        let Some(key) = key else {
            return ValidationOutcome::Error(format!(
                "U2F registration of {} holds no valid public key",
                record.user
            ));
        };

        let nonce: [u8; U2F_NONCE_LEN] = rand::random();
        self.state = U2fState::AwaitingSignature {
            user: record.user,
            key,
            nonce,
        };
        ValidationOutcome::First(nonce.to_vec())
    }
}

impl CredentialValidator for U2fValidator {
    fn kind(&self) -> CredentialKind {
        CredentialKind::U2f
    }

    fn pending_user(&self) -> Option<UserId> {
        match &self.state {
            U2fState::AwaitingSignature { user, .. } => Some(*user),
            U2fState::Fresh => None,
        }
    }

    fn validate(&mut self, round: KeyRound<'_>) -> ValidationOutcome {
        match (round, std::mem::replace(&mut self.state, U2fState::Fresh)) {
            (KeyRound::First(handle), U2fState::Fresh) => self.challenge(handle),
            (KeyRound::Second(signature), U2fState::AwaitingSignature { user, key, nonce }) => {
                let verified = Signature::from_slice(signature)
                    .and_then(|signature| key.verify(&nonce, &signature));
                match verified {
                    Ok(()) => ValidationOutcome::Ok(user),
                    Err(e) => {
                        debug!(%user, error = %e, "U2F signature rejected");
                        ValidationOutcome::Denied(Some(user))
                    }
                }
            }
            (KeyRound::First(_), U2fState::AwaitingSignature { user, .. }) => {
                ValidationOutcome::Denied(Some(user))
            }
            (KeyRound::Second(_), U2fState::Fresh) => {
                ValidationOutcome::Error("U2F signature without a challenge".to_string())
            }
        }
    }
}
