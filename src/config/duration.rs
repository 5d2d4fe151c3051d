//! Human-readable duration strings
//!
//! Durations in the configuration file are written as `500ms`, `30s`, `5m`, `2h`,
//! `1d`, `1w`, `1M` (30 days), `1y` (365 days), or `-1` for "unlimited".

use crate::ConfigError;
use std::time::Duration;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 3_600.0;
const DAY: f64 = 86_400.0;
const WEEK: f64 = 604_800.0;
const MONTH: f64 = 2_592_000.0;
const YEAR: f64 = 31_536_000.0;

/// A configured time span that may be unlimited
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeSpan {
    /// Written as `-1`; the meaning depends on the setting
    Unlimited,
    Finite(Duration),
}

impl TimeSpan {
    /// Returns the finite duration, or None when unlimited
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Unlimited => None,
            Self::Finite(d) => Some(*d),
        }
    }

    /// Returns the span in seconds, with -1 for unlimited
    pub fn as_secs_f64(&self) -> f64 {
        match self {
            Self::Unlimited => -1.0,
            Self::Finite(d) => d.as_secs_f64(),
        }
    }
}

/// Parses a duration string such as `90m` or `1.5h`
///
/// A bare number is read as seconds. `-1` (with or without a unit) means unlimited;
/// any other negative value is rejected. Units are case-insensitive except `M`,
/// which means months while `m` means minutes.
///
/// # Example
///
/// ```
/// use streams_prefetcher::config::{parse_time_string, TimeSpan};
/// use std::time::Duration;
///
/// assert_eq!(parse_time_string("2h").unwrap(), TimeSpan::Finite(Duration::from_secs(7200)));
/// assert_eq!(parse_time_string("-1").unwrap(), TimeSpan::Unlimited);
/// ```
pub fn parse_time_string(input: &str) -> Result<TimeSpan, ConfigError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidDuration(
            "duration cannot be empty".to_string(),
        ));
    }

    let split_at = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split_at);
    let unit = unit.trim();

    let value: f64 = number.parse().map_err(|_| {
        ConfigError::InvalidDuration(format!(
            "'{}' is not a valid duration (use 500ms, 30s, 5m, 2h, 1d, 1w, 1M, 1y or -1)",
            input
        ))
    })?;

    if value == -1.0 {
        return Ok(TimeSpan::Unlimited);
    }
    if value < 0.0 || !value.is_finite() {
        return Err(ConfigError::InvalidDuration(format!(
            "duration must be positive or -1 for unlimited, got '{}'",
            input
        )));
    }

    let multiplier = match unit {
        "" => 1.0,
        "M" => MONTH,
        other => match other.to_ascii_lowercase().as_str() {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => MINUTE,
            "h" => HOUR,
            "d" => DAY,
            "w" => WEEK,
            "y" => YEAR,
            _ => {
                return Err(ConfigError::InvalidDuration(format!(
                    "unknown unit '{}' in '{}'",
                    other, input
                )))
            }
        },
    };

    Ok(TimeSpan::Finite(Duration::from_secs_f64(value * multiplier)))
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Formats a number of seconds as compound human-readable text
///
/// Below one week every non-zero unit from days to seconds is shown. Longer spans
/// show the primary unit plus the next smaller one. `-1` formats as "Unlimited".
pub fn format_duration(seconds: f64) -> String {
    if seconds == -1.0 {
        return "Unlimited".to_string();
    }
    if seconds <= 0.0 {
        return "0 seconds".to_string();
    }
    if seconds < 1.0 {
        return plural((seconds * 1000.0) as u64, "millisecond");
    }

    if seconds < WEEK {
        let total = seconds as u64;
        let days = total / 86_400;
        let hours = (total % 86_400) / 3_600;
        let minutes = (total % 3_600) / 60;
        let secs = total % 60;

        let mut parts = Vec::new();
        if days > 0 {
            parts.push(plural(days, "day"));
        }
        if hours > 0 {
            parts.push(plural(hours, "hour"));
        }
        if minutes > 0 {
            parts.push(plural(minutes, "minute"));
        }
        if secs > 0 || parts.is_empty() {
            parts.push(plural(secs, "second"));
        }
        return parts.join(" ");
    }

    let (major, major_unit, minor, minor_unit) = if seconds < MONTH {
        (seconds / WEEK, "week", (seconds % WEEK) / DAY, "day")
    } else if seconds < YEAR {
        (seconds / MONTH, "month", (seconds % MONTH) / WEEK, "week")
    } else {
        (seconds / YEAR, "year", (seconds % YEAR) / MONTH, "month")
    };

    let mut text = plural(major as u64, major_unit);
    if minor as u64 > 0 {
        text.push(' ');
        text.push_str(&plural(minor as u64, minor_unit));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(input: &str) -> f64 {
        parse_time_string(input).unwrap().as_secs_f64()
    }

    #[test]
    fn test_parse_units() {
        assert!((secs("500ms") - 0.5).abs() < 1e-9);
        assert_eq!(secs("30s"), 30.0);
        assert_eq!(secs("5m"), 300.0);
        assert_eq!(secs("90m"), 5400.0);
        assert_eq!(secs("1.5h"), 5400.0);
        assert_eq!(secs("3d"), 259_200.0);
        assert_eq!(secs("2w"), 1_209_600.0);
        assert_eq!(secs("1M"), 2_592_000.0);
        assert_eq!(secs("1y"), 31_536_000.0);
        assert_eq!(secs("45"), 45.0);
        assert_eq!(secs("0s"), 0.0);
    }

    #[test]
    fn test_parse_unlimited() {
        assert_eq!(parse_time_string("-1").unwrap(), TimeSpan::Unlimited);
        assert_eq!(parse_time_string("-1s").unwrap(), TimeSpan::Unlimited);
        assert_eq!(parse_time_string("-1h").unwrap(), TimeSpan::Unlimited);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_time_string("").is_err());
        assert!(parse_time_string("abc").is_err());
        assert!(parse_time_string("-5s").is_err());
        assert!(parse_time_string("10x").is_err());
    }

    #[test]
    fn test_minutes_and_months_are_distinct() {
        assert_eq!(secs("1m"), 60.0);
        assert_eq!(secs("1M"), 2_592_000.0);
        assert_eq!(secs("1H"), 3600.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(-1.0), "Unlimited");
        assert_eq!(format_duration(0.0), "0 seconds");
        assert_eq!(format_duration(0.5), "500 milliseconds");
        assert_eq!(format_duration(1.0), "1 second");
        assert_eq!(format_duration(90.0), "1 minute 30 seconds");
        assert_eq!(format_duration(3600.0), "1 hour");
        assert_eq!(format_duration(90_061.0), "1 day 1 hour 1 minute 1 second");
        assert_eq!(format_duration(WEEK + 3.0 * DAY), "1 week 3 days");
        assert_eq!(format_duration(2.0 * MONTH + WEEK), "2 months 1 week");
        assert_eq!(format_duration(YEAR), "1 year");
    }
}
