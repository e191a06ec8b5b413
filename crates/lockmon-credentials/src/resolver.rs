//! Tag to validator resolution.

use std::sync::Arc;

use tracing::trace;

use crate::store::CredentialStore;
use crate::tag::{CredentialKind, CredentialTag};
use crate::validators::AnyValidator;
use lockmon_core::{Error, Result};

/// Candidate kinds per tag, in probing order.
///
/// A tag with a single candidate selects it without touching the store.
/// Keypad entry is ambiguous: TOTP enrolment ids and U2F handles are typed
/// on the same keypad as PINs, so the stores are tried in this order and
/// the first one that holds the code wins.
const RESOLUTION_TABLE: &[(CredentialTag, &[CredentialKind])] = &[
    (
        CredentialTag::Pin,
        &[CredentialKind::Pin, CredentialKind::Totp, CredentialKind::U2f],
    ),
    (CredentialTag::Otp, &[CredentialKind::Otp]),
    (CredentialTag::Rfid, &[CredentialKind::Rfid]),
    (CredentialTag::U2f, &[CredentialKind::U2f]),
    (CredentialTag::Totp, &[CredentialKind::Totp]),
];

fn candidates(tag: CredentialTag) -> &'static [CredentialKind] {
    RESOLUTION_TABLE
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, kinds)| *kinds)
        .unwrap_or_default()
}

/// Pick the validator for an event payload.
///
/// `payload` is the full `EventWithProtocol` payload, tag included. Returns
/// the validator and the key with the tag stripped.
///
/// # Errors
/// - `Error::UnknownCredentialTag` if the payload does not start with a known
///   tag.
/// - `Error::CredentialLookupFailure` if the tag is ambiguous and no candidate
///   store holds the key.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use lockmon_core::UserId;
/// use lockmon_credentials::{
///     CredentialKind, CredentialStore, CredentialValidator, KeyRecord, MemoryCredentialStore,
///     resolve,
/// };
///
/// let store = MemoryCredentialStore::new();
/// store.insert(b"4711", KeyRecord::new(UserId::new(1), CredentialKind::Totp));
/// let store: Arc<dyn CredentialStore> = Arc::new(store);
///
/// let (validator, key) = resolve(b"PIN4711", &store).unwrap();
/// assert_eq!(validator.kind(), CredentialKind::Totp);
/// assert_eq!(key, b"4711");
/// ```
pub fn resolve<'p>(
    payload: &'p [u8],
    store: &Arc<dyn CredentialStore>,
) -> Result<(AnyValidator, &'p [u8])> {
    let (tag, key) = CredentialTag::split(payload)?;

    let kind = match candidates(tag) {
        [only] => *only,
        kinds => kinds
            .iter()
            .copied()
            .find(|&kind| store.contains(kind, key))
            .ok_or(Error::CredentialLookupFailure)?,
    };

    trace!(%tag, %kind, "credential resolved");
    Ok((AnyValidator::for_kind(kind, Arc::clone(store)), key))
}
