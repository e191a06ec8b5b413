//! Access events and the collaborators that receive them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outcome::ValidationOutcome;
use crate::tag::CredentialKind;
use lockmon_core::{ReaderAddress, SensorId, UserId};

/// What happened at the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Access,
    Denied,
    SystemError(String),
}

/// One recorded decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub address: ReaderAddress,
    pub sensor: SensorId,
    pub user: Option<UserId>,
    pub credential: Option<CredentialKind>,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
}

impl AccessEvent {
    /// Build the event for a final validation outcome.
    ///
    /// `NotFound` is recorded as a denial without a user. `First` is not
    /// final and yields `None`.
    pub fn from_outcome(
        address: ReaderAddress,
        sensor: SensorId,
        credential: Option<CredentialKind>,
        outcome: &ValidationOutcome,
        at: DateTime<Utc>,
    ) -> Option<Self> {
        let kind = match outcome {
            ValidationOutcome::Ok(_) => EventKind::Access,
            ValidationOutcome::Denied(_) | ValidationOutcome::NotFound => EventKind::Denied,
            ValidationOutcome::Error(detail) => EventKind::SystemError(detail.clone()),
            ValidationOutcome::First(_) => return None,
        };
        Some(AccessEvent {
            address,
            sensor,
            user: outcome.user(),
            credential,
            kind,
            at,
        })
    }

    pub fn is_denied(&self) -> bool {
        self.kind == EventKind::Denied
    }
}

/// Latest identity and counters of a device, as reported over the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceReport {
    pub address: ReaderAddress,
    pub serial: Option<String>,
    pub firmware_version: Option<String>,
    pub temperature: Option<i32>,
    pub validations: Option<u32>,
    pub denied: Option<u32>,
    pub at: Option<DateTime<Utc>>,
}

/// Failure reported by a recorder or notifier.
///
/// Neither is ever allowed to change a decision; callers log these and move
/// on.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Append-only sink for access events.
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: &AccessEvent) -> Result<(), ReportError>;

    /// Persist the latest state of a device. Ignored unless overridden.
    fn record_device(&self, report: &DeviceReport) -> Result<(), ReportError> {
        let _ = report;
        Ok(())
    }
}

/// Delivery of notifications raised by the [`NotificationPolicy`].
///
/// [`NotificationPolicy`]: crate::policy::NotificationPolicy
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &crate::policy::Notification) -> Result<(), ReportError>;
}
