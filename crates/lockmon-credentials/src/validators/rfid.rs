use std::sync::Arc;

use super::{CredentialValidator, StoreRef, single_round, unexpected_second_round};
use crate::outcome::{KeyRound, ValidationOutcome};
use crate::store::CredentialStore;
use crate::tag::CredentialKind;

/// RFID badge: the uid is looked up as-is.
#[derive(Debug)]
pub struct RfidValidator {
    store: StoreRef,
}

impl RfidValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        RfidValidator {
            store: StoreRef(store),
        }
    }
}

impl CredentialValidator for RfidValidator {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Rfid
    }

    fn validate(&mut self, round: KeyRound<'_>) -> ValidationOutcome {
        match round {
            KeyRound::First(uid) => single_round(&*self.store, CredentialKind::Rfid, uid),
            KeyRound::Second(_) => unexpected_second_round(CredentialKind::Rfid),
        }
    }
}
