//! Credential validation for the lock monitor.
//!
//! A reader forwards whatever the visitor presented (PIN, OTP token, RFID
//! badge, TOTP enrolment, U2F key) prefixed with a 3-byte protocol tag. This
//! crate turns that into a decision:
//!
//! 1. [`resolver::resolve`] maps the tag to a validator, probing stores in a
//!    fixed order when the tag is ambiguous.
//! 2. The validator ([`AnyValidator`]) checks the key over one or two rounds.
//! 3. The outcome is reported as an [`AccessEvent`] and checked against the
//!    [`NotificationPolicy`].

pub mod outcome;
pub mod policy;
pub mod report;
pub mod resolver;
pub mod store;
pub mod tag;
pub mod validators;

pub use outcome::{KeyRound, ValidationOutcome};
pub use policy::{AccessWindow, Notification, NotificationPolicy};
pub use report::{AccessEvent, DeviceReport, EventKind, EventRecorder, Notifier, ReportError};
pub use resolver::resolve;
pub use store::{CredentialStore, KeyRecord, MemoryCredentialStore};
pub use tag::{CredentialKind, CredentialTag};
pub use validators::{AnyValidator, CredentialValidator};
