//! Credential lookup.
//!
//! Persistent storage of users and keys lives outside the lock monitor. The
//! engine only needs to ask "which record, if any, holds this key?" per
//! credential kind, which is what [`CredentialStore`] expresses.
//!
//! [`MemoryCredentialStore`] is a complete in-memory implementation used by
//! tests and by deployments that load keys from a snapshot.

use parking_lot::RwLock;
use subtle::ConstantTimeEq;

use crate::tag::CredentialKind;
use lockmon_core::UserId;

/// A stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub user: UserId,
    pub kind: CredentialKind,
    pub enabled: bool,
    /// PIN records only: a second credential of the same user is required.
    pub second_factor: bool,
    /// Kind-specific secret: TOTP shared secret, U2F public key.
    pub secret: Vec<u8>,
}

impl KeyRecord {
    pub fn new(user: UserId, kind: CredentialKind) -> Self {
        KeyRecord {
            user,
            kind,
            enabled: true,
            second_factor: false,
            secret: Vec::new(),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_second_factor(mut self) -> Self {
        self.second_factor = true;
        self
    }

    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = secret.into();
        self
    }
}

/// Lookup of credentials by kind and key.
///
/// Implementations must be cheap to call from the coordinator loop; anything
/// slow belongs behind a cache.
pub trait CredentialStore: Send + Sync {
    /// Find the record holding `key` in the store for `kind`.
    fn lookup(&self, kind: CredentialKind, key: &[u8]) -> Option<KeyRecord>;

    /// Returns `true` if the store for `kind` holds `key`, enabled or not.
    fn contains(&self, kind: CredentialKind, key: &[u8]) -> bool {
        self.lookup(kind, key).is_some()
    }
}

#[derive(Debug)]
struct Entry {
    key: Vec<u8>,
    record: KeyRecord,
}

/// In-memory credential store.
///
/// Keys are compared in constant time so lookup latency does not reveal how
/// much of a guessed key matched.
///
/// # Examples
///
/// ```
/// use lockmon_core::UserId;
/// use lockmon_credentials::{CredentialKind, CredentialStore, KeyRecord, MemoryCredentialStore};
///
/// let store = MemoryCredentialStore::new();
/// store.insert(b"1234", KeyRecord::new(UserId::new(1), CredentialKind::Pin));
///
/// assert!(store.contains(CredentialKind::Pin, b"1234"));
/// assert!(!store.contains(CredentialKind::Totp, b"1234"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<Vec<Entry>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `key` in the store of `record.kind`.
    pub fn insert(&self, key: &[u8], record: KeyRecord) {
        let mut entries = self.entries.write();
        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.record.kind == record.kind && e.key.as_slice() == key)
        {
            existing.record = record;
        } else {
            entries.push(Entry {
                key: key.to_vec(),
                record,
            });
        }
    }

    /// Remove `key` from the store for `kind`. Returns the removed record.
    pub fn remove(&self, kind: CredentialKind, key: &[u8]) -> Option<KeyRecord> {
        let mut entries = self.entries.write();
        let index = entries
            .iter()
            .position(|e| e.record.kind == kind && e.key.as_slice() == key)?;
        Some(entries.swap_remove(index).record)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn lookup(&self, kind: CredentialKind, key: &[u8]) -> Option<KeyRecord> {
        let entries = self.entries.read();
        let mut found = None;
        // Scan every entry of the kind so the match position is not observable
        for entry in entries.iter().filter(|e| e.record.kind == kind) {
            let matched: bool = entry.key.as_slice().ct_eq(key).into();
            if matched && found.is_none() {
                found = Some(entry.record.clone());
            }
        }
        found
    }
}
