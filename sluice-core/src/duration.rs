//! Duration strings
//!
//! Parses timeouts written the way pipeline authors write them: a sequence of
//! decimal numbers each followed by a unit, e.g. `"90s"`, `"1h30m"`,
//! `"1.5h"` or `"250ms"`. A bare `"0"` is accepted.

use std::time::Duration;

use crate::ParameterError;

// Unit suffixes and their length in nanoseconds.
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("us", 1e3),
    ("µs", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
    ("m", 60e9),
    ("h", 3600e9),
];

/// Parses a compound duration string
pub fn parse_duration(raw: &str) -> Result<Duration, ParameterError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(invalid(raw, "empty duration string"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64; // nanoseconds
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
            .map(|(i, _)| i)
            .ok_or_else(|| invalid(raw, "missing unit suffix"))?;

        if number_len == 0 {
            return Err(invalid(raw, "expected a number"));
        }

        let (number, tail) = rest.split_at(number_len);
        let value: f64 = number
            .parse()
            .map_err(|_| invalid(raw, &format!("invalid number '{number}'")))?;

        let unit_len = tail
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map(|(i, _)| i)
            .unwrap_or(tail.len());

        let (unit, remaining) = tail.split_at(unit_len);
        let scale = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| {
                invalid(
                    raw,
                    &format!("unsupported unit '{unit}'; expected ns, us, ms, s, m, or h"),
                )
            })?;

        total += value * scale;
        rest = remaining;
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        return Err(invalid(raw, "duration out of range"));
    }

    Ok(Duration::from_nanos(total.round() as u64))
}

fn invalid(raw: &str, reason: &str) -> ParameterError {
    ParameterError::InvalidDuration {
        value: raw.to_string(),
        reason: reason.to_string(),
    }
}
