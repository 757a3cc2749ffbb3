//! Text form of the burst durations found in scan output.
//!
//! Durations are written with [`Duration`]'s `Debug` representation
//! (`902.113µs`, `1.2s`, `0ns`) and read back by [`parse_elapsed`], which
//! also understands the `us` spelling of microseconds.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid duration '{0}'")]
pub struct DurationParseError(pub String);

// Nanoseconds per unit. Longer suffixes first, `s` would match all of them.
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1e3),
    ("us", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
];

pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{elapsed:?}")
}

pub fn parse_elapsed(s: &str) -> Result<Duration, DurationParseError> {
    let s = s.trim();
    let invalid = || DurationParseError(s.to_string());

    let (number, scale) = UNITS
        .iter()
        .find_map(|(suffix, scale)| s.strip_suffix(suffix).map(|n| (n, *scale)))
        .ok_or_else(invalid)?;

    let value: f64 = number.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }

    Ok(Duration::from_nanos((value * scale).round() as u64))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
