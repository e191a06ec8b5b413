//! Per-reader access attempt.
//!
//! A [`ReaderSession`] lives from the `EventWithProtocol` frame that opens it
//! to the approval or denial that closes it. All state changes go through
//! [`ReaderSession::step`].
//!
//! # States
//!
//! ```text
//!            NoEvent
//!           ┌───────┐
//!           ▼       │
//!         Idle ─────┘
//!           │ EventWithProtocol
//!           ▼
//!       Processing ──── Ok ────────────► Approved
//!           │  │
//!           │  └─ Denied/NotFound/Error ► Denied
//!           │ First(challenge)
//!           ▼
//!     WaitingForKey ── SecondKey, Ok ──► Approved
//!                   ── anything else ──► Denied
//! ```
//!
//! A timeout denies the session from any non-terminal state.

use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;

use crate::relay::RelaySettingsProvider;
use lockmon_core::{Error, ReaderAddress, SensorId};
use lockmon_credentials::{
    AnyValidator, CredentialKind, CredentialStore, CredentialValidator, KeyRound,
    ValidationOutcome, resolve,
};
use lockmon_protocol::{FrameType, IncomingFrame, OutgoingCommand};

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Opened, nothing validated yet.
    Idle,
    /// Validating the first key.
    Processing,
    /// A challenge went out; waiting for the second key.
    WaitingForKey,
    /// Terminal: access granted.
    Approved,
    /// Terminal: access refused or timed out.
    Denied,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Approved | SessionState::Denied)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "Idle",
            SessionState::Processing => "Processing",
            SessionState::WaitingForKey => "WaitingForKey",
            SessionState::Approved => "Approved",
            SessionState::Denied => "Denied",
        };
        f.write_str(name)
    }
}

/// Input to [`ReaderSession::step`].
#[derive(Debug, Clone, Copy)]
pub enum SessionInput<'a> {
    Frame(&'a IncomingFrame),
    Timeout,
}

/// Collaborators a session needs to reach a decision.
#[derive(Clone, Copy)]
pub struct SessionContext<'a> {
    pub store: &'a Arc<dyn CredentialStore>,
    pub relays: &'a dyn RelaySettingsProvider,
}

/// Result of one [`ReaderSession::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    /// Command to send back to the reader.
    pub reply: Option<OutgoingCommand>,
    /// Final validation outcome, set when the session reaches a terminal
    /// state.
    pub outcome: Option<ValidationOutcome>,
    /// The session deadline starts over.
    pub reset_deadline: bool,
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        self.to.is_terminal()
    }

    fn stay(state: SessionState) -> Self {
        Transition {
            from: state,
            to: state,
            reply: None,
            outcome: None,
            reset_deadline: false,
        }
    }
}

/// One access attempt at one reader.
#[derive(Debug)]
pub struct ReaderSession {
    address: ReaderAddress,
    sensor: SensorId,
    state: SessionState,
    validator: Option<AnyValidator>,
    credential: Option<CredentialKind>,
    deadline: Instant,
}

impl ReaderSession {
    pub fn new(address: ReaderAddress, sensor: SensorId, deadline: Instant) -> Self {
        ReaderSession {
            address,
            sensor,
            state: SessionState::Idle,
            validator: None,
            credential: None,
            deadline,
        }
    }

    pub fn address(&self) -> ReaderAddress {
        self.address
    }

    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Kind of the credential being validated, once resolved.
    pub fn credential(&self) -> Option<CredentialKind> {
        self.credential
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = deadline;
    }

    /// Apply `input` and move to the next state.
    ///
    /// Terminal sessions ignore further input.
    pub fn step(&mut self, input: SessionInput<'_>, ctx: &SessionContext<'_>) -> Transition {
        let from = self.state;
        if from.is_terminal() {
            return Transition::stay(from);
        }

        let transition = match (from, input) {
            (_, SessionInput::Timeout) => {
                let user = self.validator.as_ref().and_then(|v| v.pending_user());
                debug!(address = %self.address, state = %from, ?user, "session timed out");
                self.deny(from, ValidationOutcome::Denied(user))
            }
            (SessionState::Idle, SessionInput::Frame(frame)) => match frame.frame_type() {
                FrameType::NoEvent => Transition {
                    reset_deadline: true,
                    ..Transition::stay(from)
                },
                FrameType::EventWithProtocol => self.begin(frame.payload(), ctx),
                other => {
                    debug!(address = %self.address, frame_type = %other, "ignoring frame in Idle");
                    Transition::stay(from)
                }
            },
            (SessionState::WaitingForKey, SessionInput::Frame(frame))
                if frame.frame_type() == FrameType::SecondKey =>
            {
                let outcome = match self.validator.as_mut() {
                    Some(validator) => match validator.validate(KeyRound::Second(frame.payload())) {
                        // A second challenge is not part of any exchange
                        ValidationOutcome::First(_) => ValidationOutcome::Denied(None),
                        outcome => outcome,
                    },
                    None => ValidationOutcome::Error("second key without a validator".into()),
                };
                self.conclude(from, outcome, ctx)
            }
            (SessionState::WaitingForKey, SessionInput::Frame(frame)) => {
                debug!(
                    address = %self.address,
                    frame_type = %frame.frame_type(),
                    "unexpected frame while waiting for second key"
                );
                self.deny(from, ValidationOutcome::Denied(None))
            }
            (state, SessionInput::Frame(_)) => {
                // Processing never survives a step
                self.deny(state, ValidationOutcome::Error(format!("frame in {state}")))
            }
        };

        self.state = transition.to;
        if transition.from != transition.to {
            debug!(
                address = %self.address,
                from = %transition.from,
                to = %transition.to,
                "session transition"
            );
        }
        transition
    }

    fn begin(&mut self, payload: &[u8], ctx: &SessionContext<'_>) -> Transition {
        debug!(
            address = %self.address,
            from = %SessionState::Idle,
            to = %SessionState::Processing,
            "session transition"
        );
        self.state = SessionState::Processing;

        let (mut validator, key) = match resolve(payload, ctx.store) {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!(address = %self.address, error = %e, "credential not resolved");
                let outcome = match e {
                    Error::CredentialLookupFailure => ValidationOutcome::NotFound,
                    _ => ValidationOutcome::Denied(None),
                };
                return self.deny(SessionState::Idle, outcome);
            }
        };

        self.credential = Some(validator.kind());
        let outcome = validator.validate(KeyRound::First(key));
        self.validator = Some(validator);

        match outcome {
            ValidationOutcome::First(challenge) => Transition {
                from: SessionState::Idle,
                to: SessionState::WaitingForKey,
                reply: Some(OutgoingCommand::second_key(self.address, challenge)),
                outcome: None,
                reset_deadline: false,
            },
            outcome => self.conclude(SessionState::Idle, outcome, ctx),
        }
    }

    fn conclude(
        &self,
        from: SessionState,
        outcome: ValidationOutcome,
        ctx: &SessionContext<'_>,
    ) -> Transition {
        if outcome.is_ok() {
            let relays = ctx.relays.relay_settings(self.sensor);
            Transition {
                from,
                to: SessionState::Approved,
                reply: Some(OutgoingCommand::approved(self.address, &relays)),
                outcome: Some(outcome),
                reset_deadline: false,
            }
        } else {
            self.deny(from, outcome)
        }
    }

    fn deny(&self, from: SessionState, outcome: ValidationOutcome) -> Transition {
        Transition {
            from,
            to: SessionState::Denied,
            reply: Some(OutgoingCommand::denied(self.address)),
            outcome: Some(outcome),
            reset_deadline: false,
        }
    }
}
