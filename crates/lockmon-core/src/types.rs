use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::CONTROLLER_ADDRESS;

/// Address of a device on the serial bus.
///
/// Address `0` is reserved for the controller; readers use `1..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReaderAddress(u8);

impl ReaderAddress {
    /// The controller's fixed address.
    pub const CONTROLLER: ReaderAddress = ReaderAddress(CONTROLLER_ADDRESS);

    /// Wrap a raw bus address.
    #[inline]
    #[must_use]
    pub const fn new(address: u8) -> Self {
        ReaderAddress(address)
    }

    /// Get the raw address byte.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns `true` if this is the controller address.
    #[inline]
    #[must_use]
    pub const fn is_controller(self) -> bool {
        self.0 == CONTROLLER_ADDRESS
    }
}

impl From<u8> for ReaderAddress {
    fn from(value: u8) -> Self {
        ReaderAddress(value)
    }
}

impl fmt::Display for ReaderAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_controller() {
            write!(f, "controller")
        } else {
            write!(f, "reader#{}", self.0)
        }
    }
}

/// Identifier of a user owning one or more credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        UserId(id)
    }

    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the sensor (door/lock) a reader is attached to.
///
/// The sensor is looked up from the reader address when a session starts; it
/// keys the relay configuration and the recorded events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(u32);

impl SensorId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        SensorId(id)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sensor-{}", self.0)
    }
}
