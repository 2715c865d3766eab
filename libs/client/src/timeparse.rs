//! Heterogeneous time input parsing.
//!
//! Tool callers may pass `from`/`to` as epoch-millisecond strings, absolute
//! timestamps, or natural-language phrases ("yesterday", "last 7 days").
//! Parsing strategies are tried in order; the first match wins. Ambiguous
//! phrases always resolve backward in time: "last week" is seven days ago,
//! never next week.

use crate::error::ClientError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Default lookback when a request carries no time bounds at all.
///
/// Bounds default scans to the last 30 days instead of the full history.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(30 * 24 * 3600);

/// A resolved query window, in epoch milliseconds.
///
/// An absent bound is unbounded on that side. No `from <= to` validation is
/// performed here; an inverted window simply yields an empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRange {
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

impl TimeRange {
    /// Whether any bound is present (i.e. client-side filtering is needed).
    pub fn is_bounded(&self) -> bool {
        self.from_ms.is_some() || self.to_ms.is_some()
    }

    /// Whether `ts` falls inside the window (bounds inclusive).
    pub fn contains(&self, ts: i64) -> bool {
        self.from_ms.map_or(true, |from| ts >= from) && self.to_ms.map_or(true, |to| ts <= to)
    }
}

/// Parse a single time input into epoch milliseconds.
///
/// `field` names the offending request field in the error message.
pub fn parse_instant(text: &str, field: &str) -> Result<i64, ClientError> {
    parse_instant_at(text, field, Utc::now())
}

/// Resolve optional `from`/`to` inputs into a [`TimeRange`].
///
/// "Now" is captured once so both bounds and the default window agree on it.
///
/// - neither given: `[now - 30 days, now]`
/// - only `from`: `to = now`
/// - only `to`: open lower bound
/// - both: parsed independently
pub fn resolve_range(from: Option<&str>, to: Option<&str>) -> Result<TimeRange, ClientError> {
    let now = Utc::now();
    let now_ms = now.timestamp_millis();

    let range = match (from, to) {
        (None, None) => TimeRange {
            from_ms: Some(now_ms - DEFAULT_LOOKBACK.as_millis() as i64),
            to_ms: Some(now_ms),
        },
        (Some(from), None) => TimeRange {
            from_ms: Some(parse_instant_at(from, "from", now)?),
            to_ms: Some(now_ms),
        },
        (None, Some(to)) => TimeRange {
            from_ms: None,
            to_ms: Some(parse_instant_at(to, "to", now)?),
        },
        (Some(from), Some(to)) => TimeRange {
            from_ms: Some(parse_instant_at(from, "from", now)?),
            to_ms: Some(parse_instant_at(to, "to", now)?),
        },
    };
    Ok(range)
}

fn parse_instant_at(text: &str, field: &str, now: DateTime<Utc>) -> Result<i64, ClientError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(unparseable(field, text));
    }

    // Strategy 1: pure digits are epoch milliseconds.
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(millis) = trimmed.parse::<i64>() {
            return Ok(millis);
        }
        return Err(unparseable(field, text));
    }

    // Strategy 2: absolute timestamp grammars, interpreted as UTC when the
    // input carries no offset.
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive).timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| unparseable(field, text))?;
        return Ok(Utc.from_utc_datetime(&midnight).timestamp_millis());
    }

    // Strategy 3: natural-language phrases, resolved backward from now.
    if let Some(millis) = parse_phrase(trimmed, now) {
        return Ok(millis);
    }

    Err(unparseable(field, text))
}

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

fn parse_phrase(text: &str, now: DateTime<Utc>) -> Option<i64> {
    let now_ms = now.timestamp_millis();
    let phrase = text.to_lowercase();

    match phrase.as_str() {
        "now" => return Some(now_ms),
        // Start of the current UTC day, so "from: today" covers the whole day.
        "today" => {
            let midnight = now.date_naive().and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&midnight).timestamp_millis());
        }
        "yesterday" => return Some(now_ms - DAY_MS),
        "last week" => return Some(now_ms - 7 * DAY_MS),
        "last month" => return Some(now_ms - 30 * DAY_MS),
        "last year" => return Some(now_ms - 365 * DAY_MS),
        _ => {}
    }

    // "last N minutes|hours|days|weeks|months"
    static RELATIVE: OnceLock<Regex> = OnceLock::new();
    let re = RELATIVE.get_or_init(|| {
        Regex::new(r"^last\s+(\d+)\s+(minute|hour|day|week|month)s?$").expect("relative regex")
    });
    let caps = re.captures(&phrase)?;
    let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit_ms = match caps.get(2)?.as_str() {
        "minute" => MINUTE_MS,
        "hour" => HOUR_MS,
        "day" => DAY_MS,
        "week" => 7 * DAY_MS,
        "month" => 30 * DAY_MS,
        _ => return None,
    };
    Some(now_ms - amount.saturating_mul(unit_ms))
}

fn unparseable(field: &str, value: &str) -> ClientError {
    ClientError::UnparseableTime {
        field: field.to_string(),
        value: value.to_string(),
    }
}
