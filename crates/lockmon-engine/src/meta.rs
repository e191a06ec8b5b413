//! Cached registration and status of the controller and its readers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use lockmon_core::ReaderAddress;
use lockmon_protocol::{IncomingFrame, Registration, StatusReport};

/// What the host knows about one device on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderMeta {
    pub address: ReaderAddress,
    /// Device uuid from the last registration frame.
    pub serial: Option<String>,
    pub firmware_version: Option<String>,
    /// Active readers are polled.
    pub active: bool,
    pub status: Option<StatusReport>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl ReaderMeta {
    pub fn new(address: ReaderAddress) -> Self {
        ReaderMeta {
            address,
            serial: None,
            firmware_version: None,
            active: false,
            status: None,
            last_seen: None,
        }
    }

    /// A device counts as registered once it reported its uuid.
    pub fn is_registered(&self) -> bool {
        self.serial.is_some()
    }

    fn apply_registration(&mut self, registration: &Registration) {
        if let Some(uuid) = &registration.uuid {
            self.serial = Some(uuid.clone());
        }
        if let Some(version) = &registration.firmware_version {
            self.firmware_version = Some(version.clone());
        }
    }

    fn apply_status(&mut self, status: &StatusReport) {
        let previous = self.status.get_or_insert_with(StatusReport::default);
        if status.temperature.is_some() {
            previous.temperature = status.temperature;
        }
        if status.validations.is_some() {
            previous.validations = status.validations;
        }
        if status.denied.is_some() {
            previous.denied = status.denied;
        }
    }
}

/// Shared, read-mostly table of [`ReaderMeta`] keyed by address.
///
/// The controller entry always exists and is always active.
#[derive(Debug)]
pub struct ReaderMetaTable {
    entries: RwLock<BTreeMap<ReaderAddress, ReaderMeta>>,
}

impl ReaderMetaTable {
    pub fn new() -> Self {
        let mut controller = ReaderMeta::new(ReaderAddress::CONTROLLER);
        controller.active = true;

        let mut entries = BTreeMap::new();
        entries.insert(ReaderAddress::CONTROLLER, controller);
        ReaderMetaTable {
            entries: RwLock::new(entries),
        }
    }

    /// Add a reader to the table and mark it active.
    pub fn register(&self, address: ReaderAddress) {
        self.entries
            .write()
            .entry(address)
            .or_insert_with(|| ReaderMeta::new(address))
            .active = true;
    }

    /// Change whether a known reader is polled.
    ///
    /// Returns `false` if the address is unknown. The controller cannot be
    /// deactivated.
    pub fn set_active(&self, address: ReaderAddress, active: bool) -> bool {
        if address.is_controller() {
            return false;
        }
        match self.entries.write().get_mut(&address) {
            Some(meta) => {
                meta.active = active;
                true
            }
            None => false,
        }
    }

    /// Merge the status and registration parts of `frame` into the entry for
    /// its address and return the updated entry.
    ///
    /// Unknown addresses get an inactive entry.
    pub fn apply_frame(&self, frame: &IncomingFrame, now: DateTime<Utc>) -> ReaderMeta {
        let address = frame.address();
        let mut entries = self.entries.write();
        let meta = entries
            .entry(address)
            .or_insert_with(|| ReaderMeta::new(address));

        if let Some(registration) = frame.registration() {
            meta.apply_registration(registration);
        }
        if let Some(status) = frame.status() {
            meta.apply_status(status);
        }
        meta.last_seen = Some(now);
        meta.clone()
    }

    pub fn get(&self, address: ReaderAddress) -> Option<ReaderMeta> {
        self.entries.read().get(&address).cloned()
    }

    pub fn controller(&self) -> ReaderMeta {
        self.get(ReaderAddress::CONTROLLER)
            .unwrap_or_else(|| ReaderMeta::new(ReaderAddress::CONTROLLER))
    }

    /// Active readers in address order, controller excluded.
    pub fn active_readers(&self) -> Vec<ReaderMeta> {
        self.entries
            .read()
            .values()
            .filter(|meta| meta.active && !meta.address.is_controller())
            .cloned()
            .collect()
    }

    /// Every entry in address order.
    pub fn snapshot(&self) -> Vec<ReaderMeta> {
        self.entries.read().values().cloned().collect()
    }
}

impl Default for ReaderMetaTable {
    fn default() -> Self {
        Self::new()
    }
}
