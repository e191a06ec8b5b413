//! Reader to sensor mapping and relay configuration.

use std::collections::HashMap;

use parking_lot::RwLock;

use lockmon_core::{ReaderAddress, SensorId};
use lockmon_protocol::RelaySettings;

/// Source of the sensor a reader guards and the relays that open it.
pub trait RelaySettingsProvider: Send + Sync {
    /// Sensor attached to the reader at `address`.
    ///
    /// Defaults to a sensor numbered like the address.
    fn sensor_for(&self, address: ReaderAddress) -> SensorId {
        SensorId::new(u32::from(address.as_u8()))
    }

    /// Relays to fire when access through `sensor` is approved.
    fn relay_settings(&self, sensor: SensorId) -> RelaySettings;
}

/// Fixed relay settings with per-sensor overrides.
#[derive(Debug, Default)]
pub struct StaticRelaySettings {
    default: RelaySettings,
    sensors: RwLock<HashMap<ReaderAddress, SensorId>>,
    overrides: RwLock<HashMap<SensorId, RelaySettings>>,
}

impl StaticRelaySettings {
    pub fn new(default: RelaySettings) -> Self {
        StaticRelaySettings {
            default,
            ..Self::default()
        }
    }

    /// Attach the reader at `address` to `sensor`.
    pub fn assign_sensor(&self, address: ReaderAddress, sensor: SensorId) {
        self.sensors.write().insert(address, sensor);
    }

    /// Use `settings` for `sensor` instead of the default.
    pub fn set_override(&self, sensor: SensorId, settings: RelaySettings) {
        self.overrides.write().insert(sensor, settings);
    }
}

impl RelaySettingsProvider for StaticRelaySettings {
    fn sensor_for(&self, address: ReaderAddress) -> SensorId {
        self.sensors
            .read()
            .get(&address)
            .copied()
            .unwrap_or_else(|| SensorId::new(u32::from(address.as_u8())))
    }

    fn relay_settings(&self, sensor: SensorId) -> RelaySettings {
        self.overrides
            .read()
            .get(&sensor)
            .copied()
            .unwrap_or(self.default)
    }
}
