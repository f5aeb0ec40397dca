use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Number, Value};
use std::fmt::{self, Write};
use thiserror::Error;

pub const EVENT_KIND: &str = "event";

/// Naive layouts accepted for `ts` when no offset is present. These are read
/// as local wall-clock time.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Offset layouts tried after RFC 3339, once a trailing `Z` has been turned
/// into `+00:00`.
const OFFSET_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

/// Identifier as sent by the backend: any JSON number or a string.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FeedId {
    Number(Number),
    Text(String),
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedId::Number(n) => write_number(f, n),
            FeedId::Text(s) => f.write_str(s),
        }
    }
}

/// Integral floats print without a fraction, so `3.0` reads as `3`.
fn write_number(f: &mut fmt::Formatter<'_>, n: &Number) -> fmt::Result {
    if let Some(i) = n.as_i64() {
        return write!(f, "{i}");
    }
    if let Some(u) = n.as_u64() {
        return write!(f, "{u}");
    }
    match n.as_f64() {
        Some(x) if x.fract() == 0.0 && x.abs() < 1e21 => write!(f, "{x:.0}"),
        Some(x) => write!(f, "{x}"),
        None => write!(f, "{n}"),
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Event {
    pub id: FeedId,
    pub camera_id: FeedId,
    #[serde(default)]
    pub ts: Option<Value>,
    #[serde(default)]
    pub ppe_status: Option<String>,
    #[serde(default)]
    pub thumb_path: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Envelope {
    Event(Event),
    /// Any discriminator this client does not understand. Ignored by the feed.
    Unknown(String),
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{0:?} envelope carries no data")]
    MissingData(String),
    #[error("invalid {kind:?} payload: {source}")]
    InvalidPayload {
        kind: String,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct RawEnvelope {
    kind: String,
    #[serde(default)]
    data: Option<Value>,
}

impl Envelope {
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_str(text)?;
        if raw.kind != EVENT_KIND {
            return Ok(Envelope::Unknown(raw.kind));
        }
        let data = match raw.data {
            Some(Value::Null) | None => return Err(EnvelopeError::MissingData(raw.kind)),
            Some(data) => data,
        };
        let event = serde_json::from_value(data).map_err(|source| {
            EnvelopeError::InvalidPayload {
                kind: raw.kind,
                source,
            }
        })?;
        Ok(Envelope::Event(event))
    }
}

/// Interprets `ts` the way the page's `Date` constructor would: numbers are
/// epoch milliseconds, strings are RFC 3339, naive local date-times, bare
/// dates (UTC midnight) or numeric epoch milliseconds.
pub fn parse_timestamp(ts: &Value) -> Option<DateTime<Local>> {
    match ts {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch_millis),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Local>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }
    if let Ok(millis) = s.parse::<i64>() {
        return from_epoch_millis(millis);
    }
    let zoned = match s.strip_suffix(['Z', 'z']) {
        Some(rest) => format!("{rest}+00:00"),
        None => s.to_string(),
    };
    for layout in OFFSET_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, layout) {
            return Some(dt.with_timezone(&Local));
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Local.from_local_datetime(&naive).earliest();
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).with_timezone(&Local))
}

fn from_epoch_millis(millis: i64) -> Option<DateTime<Local>> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.with_timezone(&Local))
}

/// Local rendering of `ts`, or an empty string when it is missing or cannot
/// be read.
pub fn format_timestamp(ts: Option<&Value>, layout: &str) -> String {
    let Some(dt) = ts.and_then(parse_timestamp) else {
        return String::new();
    };
    let mut out = String::new();
    if write!(out, "{}", dt.format(layout)).is_err() {
        out.clear();
    }
    out
}
