use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{CredentialValidator, StoreRef};
use crate::outcome::{KeyRound, ValidationOutcome};
use crate::store::CredentialStore;
use crate::tag::CredentialKind;
use lockmon_core::UserId;

/// Number of digits in a TOTP code.
pub const TOTP_DIGITS: u32 = 6;

/// Length of one TOTP time step, in seconds.
pub const TOTP_STEP_SECS: u64 = 30;

/// Steps accepted on either side of the current one.
const TOTP_SKEW_STEPS: i64 = 1;

const TOTP_CHALLENGE: &[u8] = b"TOT";

type HmacSha256 = Hmac<Sha256>;

/// Compute the RFC 6238 code (HMAC-SHA256, [`TOTP_DIGITS`] digits) for the
/// step containing `unix_secs`.
///
/// Returns `None` only if the MAC cannot be keyed with `secret`.
///
/// # Examples
///
/// ```
/// use lockmon_credentials::validators::totp_code;
///
/// // RFC 6238 appendix B, SHA-256 secret, T = 59
/// let secret = b"12345678901234567890123456789012";
/// assert_eq!(totp_code(secret, 59), Some(119_246));
/// ```
pub fn totp_code(secret: &[u8], unix_secs: u64) -> Option<u32> {
    code_for_step(secret, unix_secs / TOTP_STEP_SECS)
}

fn code_for_step(secret: &[u8], step: u64) -> Option<u32> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(&step.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation, RFC 4226 section 5.3
    let offset = usize::from(digest[digest.len() - 1] & 0x0f);
    let binary = u32::from_be_bytes([
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]) & 0x7fff_ffff;

    Some(binary % 10u32.pow(TOTP_DIGITS))
}

fn system_clock() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

#[derive(Debug)]
enum TotpState {
    Fresh,
    AwaitingCode { user: UserId, secret: Vec<u8> },
}

/// Time-based one-time password.
///
/// Round 1 names the enrolment and is answered with a `TOT` challenge; round 2
/// carries the code shown on the visitor's authenticator.
#[derive(Debug)]
pub struct TotpValidator {
    store: StoreRef,
    clock: fn() -> u64,
    state: TotpState,
}

impl TotpValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        TotpValidator {
            store: StoreRef(store),
            clock: system_clock,
            state: TotpState::Fresh,
        }
    }

    /// Replace the wall clock (seconds since the Unix epoch).
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    fn check_code(&self, secret: &[u8], code: &[u8]) -> bool {
        let Some(presented) = parse_code(code) else {
            return false;
        };
        let current = (self.clock)() / TOTP_STEP_SECS;

        let mut matched = false;
        for skew in -TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS {
            let Some(step) = current.checked_add_signed(skew) else {
                continue;
            };
            if let Some(expected) = code_for_step(secret, step) {
                matched |= bool::from(expected.to_be_bytes().ct_eq(&presented.to_be_bytes()));
            }
        }
        matched
    }
}

fn parse_code(code: &[u8]) -> Option<u32> {
    if code.len() != TOTP_DIGITS as usize || !code.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(code).ok()?.parse().ok()
}

impl CredentialValidator for TotpValidator {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Totp
    }

    fn pending_user(&self) -> Option<UserId> {
        match &self.state {
            TotpState::AwaitingCode { user, .. } => Some(*user),
            TotpState::Fresh => None,
        }
    }

    fn validate(&mut self, round: KeyRound<'_>) -> ValidationOutcome {
        match (round, std::mem::replace(&mut self.state, TotpState::Fresh)) {
            (KeyRound::First(enrolment), TotpState::Fresh) => {
                match self.store.lookup(CredentialKind::Totp, enrolment) {
                    None => ValidationOutcome::NotFound,
                    Some(record) if !record.enabled => ValidationOutcome::Denied(Some(record.user)),
                    Some(record) if record.secret.is_empty() => {
                        ValidationOutcome::Error(format!("TOTP enrolment of {} has no secret", record.user))
                    }
                    Some(record) => {
                        self.state = TotpState::AwaitingCode {
                            user: record.user,
                            secret: record.secret,
                        };
                        ValidationOutcome::First(TOTP_CHALLENGE.to_vec())
                    }
                }
            }
            (KeyRound::Second(code), TotpState::AwaitingCode { user, secret }) => {
                if self.check_code(&secret, code) {
                    ValidationOutcome::Ok(user)
                } else {
                    ValidationOutcome::Denied(Some(user))
                }
            }
            (KeyRound::First(_), TotpState::AwaitingCode { user, .. }) => {
                ValidationOutcome::Denied(Some(user))
            }
            (KeyRound::Second(_), TotpState::Fresh) => {
                ValidationOutcome::Error("TOTP code without an enrolment".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyRecord, MemoryCredentialStore};
    use rstest::rstest;

    const SECRET: &[u8] = b"12345678901234567890123456789012";

    // RFC 6238 appendix B, SHA-256 column, truncated to six digits
    #[rstest]
    #[case(59, 119_246)]
    #[case(1_111_111_109, 84_774)]
    #[case(1_111_111_111, 62_674)]
    #[case(1_234_567_890, 819_424)]
    #[case(2_000_000_000, 698_825)]
    fn test_rfc6238_vectors(#[case] time: u64, #[case] expected: u32) {
        assert_eq!(totp_code(SECRET, time), Some(expected));
    }

    fn validator() -> TotpValidator {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(
            b"alice-phone",
            KeyRecord::new(UserId::new(4), CredentialKind::Totp).with_secret(SECRET),
        );
        store.insert(
            b"bob-phone",
            KeyRecord::new(UserId::new(5), CredentialKind::Totp)
                .with_secret(SECRET)
                .disabled(),
        );
        TotpValidator::new(store).with_clock(|| 1_234_567_890)
    }

    #[test]
    fn test_two_round_flow() {
        let mut validator = validator();
        assert_eq!(
            validator.validate(KeyRound::First(b"alice-phone")),
            ValidationOutcome::First(b"TOT".to_vec())
        );
        assert_eq!(
            validator.validate(KeyRound::Second(b"819424")),
            ValidationOutcome::Ok(UserId::new(4))
        );
    }

    #[test]
    fn test_previous_step_within_skew() {
        let mut validator = validator();
        let previous = totp_code(SECRET, 1_234_567_890 - TOTP_STEP_SECS).unwrap();
        let code = format!("{previous:06}");

        validator.validate(KeyRound::First(b"alice-phone"));
        assert_eq!(
            validator.validate(KeyRound::Second(code.as_bytes())),
            ValidationOutcome::Ok(UserId::new(4))
        );
    }

    #[test]
    fn test_step_outside_skew_is_denied() {
        let mut validator = validator();
        let stale = totp_code(SECRET, 1_234_567_890 - 3 * TOTP_STEP_SECS).unwrap();
        let code = format!("{stale:06}");

        validator.validate(KeyRound::First(b"alice-phone"));
        assert_eq!(
            validator.validate(KeyRound::Second(code.as_bytes())),
            ValidationOutcome::Denied(Some(UserId::new(4)))
        );
    }

    #[rstest]
    #[case(b"81942")]
    #[case(b"8194245")]
    #[case(b"81942x")]
    fn test_malformed_code_is_denied(#[case] code: &[u8]) {
        let mut validator = validator();
        validator.validate(KeyRound::First(b"alice-phone"));
        assert_eq!(
            validator.validate(KeyRound::Second(code)),
            ValidationOutcome::Denied(Some(UserId::new(4)))
        );
    }

    #[test]
    fn test_disabled_enrolment() {
        let mut validator = validator();
        assert_eq!(
            validator.validate(KeyRound::First(b"bob-phone")),
            ValidationOutcome::Denied(Some(UserId::new(5)))
        );
    }

    #[test]
    fn test_unknown_enrolment() {
        let mut validator = validator();
        assert_eq!(
            validator.validate(KeyRound::First(b"carol-phone")),
            ValidationOutcome::NotFound
        );
    }

    #[test]
    fn test_code_without_enrolment() {
        let mut validator = validator();
        assert!(matches!(
            validator.validate(KeyRound::Second(b"819424")),
            ValidationOutcome::Error(_)
        ));
    }
}
