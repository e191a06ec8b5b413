//! Status and registration payload parsing.
//!
//! A `Status` frame carries ASCII tokens separated by `:`. The first
//! character of each token selects the field:
//!
//! | Token | Field | Kind |
//! |-------|-------|------|
//! | `T<int>` | temperature | status |
//! | `V<int>` | validations since boot | status |
//! | `D<int>` | denials since boot | status |
//! | `U<bytes>` | device uuid, little-endian unsigned | registration |
//! | `S<string>` | firmware version | registration |
//!
//! Tokens that fail to parse are skipped.

use serde::{Deserialize, Serialize};
use tracing::trace;

use lockmon_core::constants::STATUS_TOKEN_SEPARATOR;

/// Counters and sensor readings reported by a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub temperature: Option<i32>,
    pub validations: Option<u32>,
    pub denied: Option<u32>,
}

/// Identity reported by a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Device uuid rendered as a decimal string.
    pub uuid: Option<String>,
    pub firmware_version: Option<String>,
}

/// Parse a status payload into its status and registration parts.
///
/// Each part is `Some` only if at least one of its tokens parsed.
///
/// # Examples
///
/// ```
/// use lockmon_protocol::parse_status_payload;
///
/// let (status, registration) = parse_status_payload(b"T22:V5:D1");
/// let status = status.unwrap();
/// assert_eq!(status.temperature, Some(22));
/// assert_eq!(status.validations, Some(5));
/// assert_eq!(status.denied, Some(1));
/// assert!(registration.is_none());
/// ```
pub fn parse_status_payload(payload: &[u8]) -> (Option<StatusReport>, Option<Registration>) {
    let mut status = StatusReport::default();
    let mut registration = Registration::default();
    let mut is_status = false;
    let mut is_registration = false;

    for token in payload.split(|b| *b == STATUS_TOKEN_SEPARATOR) {
        let Some((&field, value)) = token.split_first() else {
            continue;
        };

        match field {
            b'T' => {
                if let Some(v) = parse_ascii_int::<i32>(value) {
                    status.temperature = Some(v);
                    is_status = true;
                }
            }
            b'V' => {
                if let Some(v) = parse_ascii_int::<u32>(value) {
                    status.validations = Some(v);
                    is_status = true;
                }
            }
            b'D' => {
                if let Some(v) = parse_ascii_int::<u32>(value) {
                    status.denied = Some(v);
                    is_status = true;
                }
            }
            b'U' => {
                if let Some(v) = decode_le_uint(value) {
                    registration.uuid = Some(v.to_string());
                    is_registration = true;
                }
            }
            b'S' => {
                registration.firmware_version = Some(String::from_utf8_lossy(value).into_owned());
                is_registration = true;
            }
            _ => {
                trace!(token = ?String::from_utf8_lossy(token), "skipping unknown status token");
            }
        }
    }

    (
        is_status.then_some(status),
        is_registration.then_some(registration),
    )
}

fn parse_ascii_int<T: std::str::FromStr>(value: &[u8]) -> Option<T> {
    std::str::from_utf8(value).ok()?.trim().parse().ok()
}

/// Interpret up to 16 bytes as a little-endian unsigned integer.
fn decode_le_uint(value: &[u8]) -> Option<u128> {
    if value.is_empty() || value.len() > 16 {
        return None;
    }
    let mut buf = [0u8; 16];
    buf[..value.len()].copy_from_slice(value);
    Some(u128::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_full_status() {
        let (status, registration) = parse_status_payload(b"T22:V5:D1");
        assert_eq!(
            status,
            Some(StatusReport {
                temperature: Some(22),
                validations: Some(5),
                denied: Some(1),
            })
        );
        assert_eq!(registration, None);
    }

    #[test]
    fn test_parse_negative_temperature() {
        let (status, _) = parse_status_payload(b"T-4");
        assert_eq!(status.unwrap().temperature, Some(-4));
    }

    #[test]
    fn test_parse_registration() {
        // 0x0102 little-endian = 513
        let (status, registration) = parse_status_payload(b"U\x01\x02:S1.4.0");
        assert!(status.is_none());
        let registration = registration.unwrap();
        assert_eq!(registration.uuid.as_deref(), Some("513"));
        assert_eq!(registration.firmware_version.as_deref(), Some("1.4.0"));
    }

    #[test]
    fn test_parse_mixed() {
        let (status, registration) = parse_status_payload(b"T30:Sfw-9");
        assert_eq!(status.unwrap().temperature, Some(30));
        assert_eq!(registration.unwrap().firmware_version.as_deref(), Some("fw-9"));
    }

    #[rstest]
    #[case(b"Tabc".as_slice())]
    #[case(b"V".as_slice())]
    #[case(b"D-1".as_slice())]
    #[case(b"X12".as_slice())]
    #[case(b"::".as_slice())]
    #[case(b"".as_slice())]
    fn test_unparseable_tokens_are_skipped(#[case] payload: &[u8]) {
        let (status, registration) = parse_status_payload(payload);
        assert!(status.is_none());
        assert!(registration.is_none());
    }

    #[test]
    fn test_bad_token_does_not_hide_good_ones() {
        let (status, _) = parse_status_payload(b"Tzz:V9");
        let status = status.unwrap();
        assert_eq!(status.temperature, None);
        assert_eq!(status.validations, Some(9));
    }

    #[test]
    fn test_decode_le_uint() {
        assert_eq!(decode_le_uint(&[0xFF]), Some(255));
        assert_eq!(decode_le_uint(&[0x00, 0x01]), Some(256));
        assert_eq!(decode_le_uint(&[0xFF; 16]), Some(u128::MAX));
        assert_eq!(decode_le_uint(&[0x01; 17]), None);
        assert_eq!(decode_le_uint(&[]), None);
    }
}
