//! Notification rules evaluated after every decision.
//!
//! Rules are global: notify on denial, notify on access outside business
//! hours, notify on system errors. Evaluation only produces
//! [`Notification`]s; delivering them is the [`Notifier`]'s job and neither
//! step can change the decision that triggered them.
//!
//! [`Notifier`]: crate::report::Notifier

use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::report::{AccessEvent, EventKind};
use lockmon_core::{Error, ReaderAddress, Result, UserId};

const WINDOW_TIME_FORMAT: &str = "%H:%M";

/// Half-open time-of-day window `[start, end)`.
///
/// A window whose `end` is before its `start` wraps past midnight: 22:00 to
/// 06:00 contains 23:30 and 05:59 but not 06:00. A window with equal bounds
/// is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow", into = "RawWindow")]
pub struct AccessWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl AccessWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        AccessWindow { start, end }
    }

    /// Parse `HH:MM` bounds.
    ///
    /// # Errors
    /// Returns `Error::Config` if either bound is not a valid `HH:MM` time.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveTime;
    /// use lockmon_credentials::AccessWindow;
    ///
    /// let night = AccessWindow::parse("22:00", "06:00").unwrap();
    /// assert!(night.contains(NaiveTime::from_hms_opt(23, 30, 0).unwrap()));
    /// assert!(!night.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    /// ```
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(AccessWindow::new(parse_time(start)?, parse_time(end)?))
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

impl fmt::Display for AccessWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format(WINDOW_TIME_FORMAT),
            self.end.format(WINDOW_TIME_FORMAT)
        )
    }
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), WINDOW_TIME_FORMAT)
        .map_err(|e| Error::Config(format!("invalid time of day {value:?}: {e}")))
}

#[derive(Serialize, Deserialize)]
struct RawWindow {
    start: String,
    end: String,
}

impl TryFrom<RawWindow> for AccessWindow {
    type Error = Error;

    fn try_from(raw: RawWindow) -> Result<Self> {
        AccessWindow::parse(&raw.start, &raw.end)
    }
}

impl From<AccessWindow> for RawWindow {
    fn from(window: AccessWindow) -> Self {
        RawWindow {
            start: window.start.format(WINDOW_TIME_FORMAT).to_string(),
            end: window.end.format(WINDOW_TIME_FORMAT).to_string(),
        }
    }
}

/// A notification raised by the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Denied {
        address: ReaderAddress,
        user: Option<UserId>,
    },
    AfterHours {
        address: ReaderAddress,
        user: Option<UserId>,
        time: NaiveTime,
    },
    SystemError {
        address: ReaderAddress,
        detail: String,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Denied { address, user } => {
                write!(f, "access denied at {address}")?;
                if let Some(user) = user {
                    write!(f, " for user {user}")?;
                }
                Ok(())
            }
            Notification::AfterHours { address, user, time } => {
                write!(f, "after-hours attempt at {address} ({})", time.format(WINDOW_TIME_FORMAT))?;
                if let Some(user) = user {
                    write!(f, " by user {user}")?;
                }
                Ok(())
            }
            Notification::SystemError { address, detail } => {
                write!(f, "system error at {address}: {detail}")
            }
        }
    }
}

/// Global notification rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPolicy {
    pub notify_on_deny: bool,
    pub notify_on_error: bool,
    /// Accesses and denials outside this window raise
    /// [`Notification::AfterHours`]. `None` disables the rule.
    pub business_hours: Option<AccessWindow>,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        NotificationPolicy {
            notify_on_deny: true,
            notify_on_error: true,
            business_hours: None,
        }
    }
}

impl NotificationPolicy {
    /// Notifications raised by `event`, which happened at local time `now`.
    pub fn evaluate(&self, event: &AccessEvent, now: NaiveTime) -> Vec<Notification> {
        let mut notifications = Vec::new();

        match &event.kind {
            EventKind::Denied if self.notify_on_deny => {
                notifications.push(Notification::Denied {
                    address: event.address,
                    user: event.user,
                });
            }
            EventKind::SystemError(detail) if self.notify_on_error => {
                notifications.push(Notification::SystemError {
                    address: event.address,
                    detail: detail.clone(),
                });
            }
            _ => {}
        }

        let attempted = matches!(event.kind, EventKind::Access | EventKind::Denied);
        if let Some(window) = self.business_hours
            && attempted
            && !window.contains(now)
        {
            notifications.push(Notification::AfterHours {
                address: event.address,
                user: event.user,
                time: now,
            });
        }

        notifications
    }
}
