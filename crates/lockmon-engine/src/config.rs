//! Engine configuration.
//!
//! Loaded from TOML. Every section and field is optional; missing values fall
//! back to the defaults below.
//!
//! ```toml
//! [poll]
//! interval_secs = 45
//! priority = 200
//!
//! [session]
//! timeout_ms = 10000
//! priority = 100
//!
//! [bookkeeping]
//! capacity = 256
//!
//! [notifications]
//! notify_on_deny = true
//! notify_on_error = true
//! business_hours = { start = "07:00", end = "19:00" }
//!
//! [relays]
//! mechanical = [{ enabled = true, delay_ms = 3000 }, { enabled = false, delay_ms = 0 }]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lockmon_core::constants::{
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_PRIORITY, DEFAULT_SESSION_PRIORITY,
    DEFAULT_SESSION_TIMEOUT_MS,
};
use lockmon_core::{Error, Result};
use lockmon_credentials::NotificationPolicy;
use lockmon_protocol::RelaySettings;

/// Default capacity of the bookkeeping channel.
pub const DEFAULT_BOOKKEEPING_CAPACITY: usize = 256;

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Poll loop configuration
    #[serde(default)]
    pub poll: PollConfig,

    /// Reader session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Bookkeeping worker configuration
    #[serde(default)]
    pub bookkeeping: BookkeepingConfig,

    /// Notification rules
    #[serde(default)]
    pub notifications: NotificationPolicy,

    /// Relay settings used when no per-sensor settings exist
    #[serde(default)]
    pub relays: RelaySettings,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read and `Error::Config` if
    /// it does not parse or fails validation.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    /// Returns `Error::Config` if the text does not parse or fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use lockmon_engine::EngineConfig;
    ///
    /// let config = EngineConfig::from_toml_str("[session]\ntimeout_ms = 2500\n").unwrap();
    /// assert_eq!(config.session.timeout(), Duration::from_millis(2500));
    /// assert_eq!(config.poll.interval(), Duration::from_secs(45));
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot work.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_secs == 0 {
            return Err(Error::Config("poll.interval_secs must be positive".into()));
        }
        if self.session.timeout_ms == 0 {
            return Err(Error::Config("session.timeout_ms must be positive".into()));
        }
        if self.bookkeeping.capacity == 0 {
            return Err(Error::Config("bookkeeping.capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between two poll rounds
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Queue priority of poll commands
    #[serde(default = "default_poll_priority")]
    pub priority: i32,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_poll_priority() -> i32 {
    DEFAULT_POLL_PRIORITY
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            priority: default_poll_priority(),
        }
    }
}

/// Reader session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Milliseconds a session may stay open before it is denied
    #[serde(default = "default_session_timeout_ms")]
    pub timeout_ms: u64,

    /// Queue priority of session replies
    #[serde(default = "default_session_priority")]
    pub priority: i32,
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_session_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

fn default_session_priority() -> i32 {
    DEFAULT_SESSION_PRIORITY
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_session_timeout_ms(),
            priority: default_session_priority(),
        }
    }
}

/// Bookkeeping worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookkeepingConfig {
    /// Jobs that may wait for the worker before new ones are refused
    #[serde(default = "default_bookkeeping_capacity")]
    pub capacity: usize,
}

fn default_bookkeeping_capacity() -> usize {
    DEFAULT_BOOKKEEPING_CAPACITY
}

impl Default for BookkeepingConfig {
    fn default() -> Self {
        Self {
            capacity: default_bookkeeping_capacity(),
        }
    }
}
