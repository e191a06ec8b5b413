//! Relay settings returned with an approval.
//!
//! The payload of `RequestApproved` configures the four relays of the door
//! the reader guards. Slots are encoded in fixed order:
//!
//! ```text
//! mech-1 | mech-2 | ssr-1 | ssr-2
//! [en:1][delay_ms:4 BE] x 4 = 20 bytes
//! ```

use serde::{Deserialize, Serialize};

use lockmon_core::{Error, Result, constants::*};

/// One relay output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySlot {
    pub enabled: bool,
    /// How long the relay stays energised, in milliseconds.
    pub delay_ms: u32,
}

impl RelaySlot {
    pub const fn new(enabled: bool, delay_ms: u32) -> Self {
        RelaySlot { enabled, delay_ms }
    }

    pub const fn disabled() -> Self {
        RelaySlot::new(false, 0)
    }

    fn encode_into(&self, out: &mut [u8]) {
        out[0] = u8::from(self.enabled);
        out[1..RELAY_SLOT_LEN].copy_from_slice(&self.delay_ms.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        let delay = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        RelaySlot::new(bytes[0] != 0, delay)
    }
}

/// Relay configuration for one door.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default)]
    pub mechanical: [RelaySlot; 2],
    #[serde(default)]
    pub solid_state: [RelaySlot; 2],
}

impl RelaySettings {
    /// Encode to the 20-byte approval payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmon_protocol::{RelaySettings, RelaySlot};
    ///
    /// let relays = RelaySettings {
    ///     mechanical: [RelaySlot::new(true, 1), RelaySlot::disabled()],
    ///     solid_state: [RelaySlot::disabled(), RelaySlot::new(true, 256)],
    /// };
    /// let bytes = relays.encode();
    /// assert_eq!(bytes.len(), 20);
    /// assert_eq!(&bytes[0..5], &[1, 0, 0, 0, 1]);
    /// assert_eq!(&bytes[15..20], &[1, 0, 0, 1, 0]);
    /// ```
    pub fn encode(&self) -> [u8; RELAY_SETTINGS_LEN] {
        let mut out = [0u8; RELAY_SETTINGS_LEN];
        for (slot, chunk) in self.slots().iter().zip(out.chunks_exact_mut(RELAY_SLOT_LEN)) {
            slot.encode_into(chunk);
        }
        out
    }

    /// # Errors
    /// Returns `Error::MalformedFrame` unless exactly 20 bytes are given.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RELAY_SETTINGS_LEN {
            return Err(Error::malformed(format!(
                "relay settings need {RELAY_SETTINGS_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut slots = bytes.chunks_exact(RELAY_SLOT_LEN).map(RelaySlot::decode);
        // chunks_exact over 20 bytes always yields four slots
        let mut next = || slots.next().unwrap_or_default();
        Ok(RelaySettings {
            mechanical: [next(), next()],
            solid_state: [next(), next()],
        })
    }

    /// Slots in wire order.
    pub fn slots(&self) -> [RelaySlot; RELAY_SLOT_COUNT] {
        [
            self.mechanical[0],
            self.mechanical[1],
            self.solid_state[0],
            self.solid_state[1],
        ]
    }
}
