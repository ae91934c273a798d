//! Parser for the `Label: value` telemetry text published on the location topic.
//!
//! Labels may appear in any order and anywhere in the message. Each label is
//! followed by a single space and its value; the first occurrence whose value
//! is well-formed wins.

use thiserror::Error;

use super::speed::SPEED_UNIT;

const LATITUDE: &str = "Latitude:";
const LONGITUDE: &str = "Longitude:";
const STUDENT_ID: &str = "StudentID:";
const MIN_SPEED: &str = "MinSpeed:";
const MAX_SPEED: &str = "MaxSpeed:";

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    pub latitude: f64,
    pub longitude: f64,
    pub student_id: Option<String>,
    /// Digits only, without the unit.
    pub min_speed: Option<String>,
    pub max_speed: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing or malformed Latitude")]
    MissingLatitude,
    #[error("missing or malformed Longitude")]
    MissingLongitude,
}

impl TelemetryMessage {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let latitude = find_field(text, LATITUDE, scan_coordinate).ok_or(ParseError::MissingLatitude)?;
        let longitude =
            find_field(text, LONGITUDE, scan_coordinate).ok_or(ParseError::MissingLongitude)?;

        Ok(Self {
            latitude,
            longitude,
            student_id: find_field(text, STUDENT_ID, scan_word),
            min_speed: find_field(text, MIN_SPEED, scan_speed),
            max_speed: find_field(text, MAX_SPEED, scan_speed),
        })
    }
}

fn find_field<'a, T>(text: &'a str, label: &str, scan: impl Fn(&'a str) -> Option<T>) -> Option<T> {
    text.match_indices(label).find_map(|(at, _)| {
        let rest = text[at + label.len()..].strip_prefix(' ')?;
        scan(rest)
    })
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// `[+-]? digits [. digits]` or `[+-]? . digits`
fn scan_coordinate(rest: &str) -> Option<f64> {
    let bytes = rest.as_bytes();
    let mut end = match bytes.first() {
        Some(b'+') | Some(b'-') => 1,
        _ => 0,
    };

    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return None;
    }
    rest[..end].parse().ok()
}

fn scan_word(rest: &str) -> Option<String> {
    let len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    (len > 0).then(|| rest[..len].to_string())
}

fn scan_speed(rest: &str) -> Option<String> {
    let len = count_digits(rest.as_bytes());
    if len == 0 {
        return None;
    }
    let unit = rest[len..].strip_prefix(' ')?;
    unit.starts_with(SPEED_UNIT).then(|| rest[..len].to_string())
}
