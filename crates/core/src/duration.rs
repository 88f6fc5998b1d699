//! Duration parsing and formatting shared by the usage and policy crates.
//!
//! Accepts Go-style and compact strings (`168h`, `1h30m`, `90s`, `7d`,
//! `500ms`, `1.5h`). A bare number is read as seconds. Output uses the
//! compact form, which is also valid PromQL range syntax.

use std::time::Duration;

use crate::error::CoreError;

const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => NANOS_PER_MILLI,
        "s" => NANOS_PER_SEC,
        "m" => 60 * NANOS_PER_SEC,
        "h" => 3_600 * NANOS_PER_SEC,
        "d" => 86_400 * NANOS_PER_SEC,
        "w" => 604_800 * NANOS_PER_SEC,
        _ => return None,
    })
}

fn invalid(input: &str, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidDuration {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parse a duration string into a [`Duration`].
pub fn parse_duration(input: &str) -> Result<Duration, CoreError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid(input, "empty string"));
    }

    let mut total: u128 = 0;
    let mut chars = s.chars().peekable();
    let mut found_unit = false;

    while chars.peek().is_some() {
        let mut num_buf = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                num_buf.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if num_buf.is_empty() {
            return Err(invalid(input, "expected a number"));
        }
        let n: f64 = num_buf
            .parse()
            .map_err(|_| invalid(input, format!("bad number '{num_buf}'")))?;

        let mut unit = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_alphabetic() {
                unit.push(c);
                chars.next();
            } else {
                break;
            }
        }

        if unit.is_empty() {
            // Bare number: seconds, but only when it is the whole string.
            if found_unit {
                return Err(invalid(input, "trailing number without unit"));
            }
            total += (n * NANOS_PER_SEC as f64).round() as u128;
            break;
        }

        let per = unit_nanos(&unit).ok_or_else(|| invalid(input, format!("unknown unit '{unit}'")))?;
        total += (n * per as f64).round() as u128;
        found_unit = true;
    }

    let secs = (total / NANOS_PER_SEC) as u64;
    let nanos = (total % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Format a duration in compact form (`7d`, `1h30m`, `1m`, `1s500ms`).
///
/// Precision below one millisecond is dropped.
pub fn format_duration(d: Duration) -> String {
    let mut ms = d.as_millis();
    if ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [
        ("d", 86_400_000u128),
        ("h", 3_600_000),
        ("m", 60_000),
        ("s", 1_000),
        ("ms", 1),
    ] {
        let n = ms / size;
        if n > 0 {
            out.push_str(&format!("{n}{unit}"));
            ms -= n * size;
        }
    }
    out
}

/// Serde adapter for `Duration` fields stored as duration strings.
pub mod serde_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<Duration>` fields stored as duration strings.
pub mod serde_opt_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_str(&super::format_duration(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|r| super::parse_duration(&r).map_err(serde::de::Error::custom))
            .transpose()
    }
}
