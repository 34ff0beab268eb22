//! Observation records
//!
//! Decodes the payload a content server pushes into a typed observation.
//!
//! ## Payload Formats
//! ```text
//! JSON:                                Plain text:
//! {                                    id: IDS60901
//!   "id": "IDS60901",                  local_date_time_full: 20230715160000
//!   "local_date_time_full": "...",     time_zone: CST
//!   "time_zone": "CST",                air_temp: 13.3
//!   "air_temp": 13.3
//! }
//! ```
//! Both decode to the same flat record. Plain-text values that look numeric
//! are kept as JSON numbers.

use std::fmt;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::{HubError, Result};

/// Station identifier field
pub const FIELD_STATION_ID: &str = "id";

/// Local event time field, `yyyyMMddHHmmss`
pub const FIELD_LOCAL_TIME: &str = "local_date_time_full";

/// Time zone of the local event time
pub const FIELD_TIME_ZONE: &str = "time_zone";

const LOCAL_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

// =============================================================================
// SourceId
// =============================================================================

/// Identity of a content server
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(Uuid);

impl SourceId {
    /// Generate a fresh random identity
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Uuid::parse_str(text.trim())
            .map(Self)
            .map_err(|_| HubError::InvalidSourceId(text.to_string()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SourceId {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// =============================================================================
// Observation
// =============================================================================

/// One weather observation, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Content server that submitted it
    pub source_id: SourceId,

    /// Station the observation is for
    pub station_id: String,

    /// Canonical payload (pretty-printed JSON)
    pub payload: String,

    /// Event time, UTC milliseconds since the Unix epoch
    pub event_time: i64,
}

impl Observation {
    /// Build an observation from a raw request body
    ///
    /// Fails with `InvalidPayload` if the body is not a flat record or lacks
    /// the station id or event time fields.
    pub fn from_payload(source_id: SourceId, body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|_| HubError::InvalidPayload("payload is not UTF-8".to_string()))?;
        let record = parse_record(text)?;

        let station_id = field_text(&record, FIELD_STATION_ID)?;
        if station_id.is_empty() {
            return Err(HubError::InvalidPayload("empty station id".to_string()));
        }
        let local_time = field_text(&record, FIELD_LOCAL_TIME)?;
        let zone = record
            .get(FIELD_TIME_ZONE)
            .map(value_text)
            .unwrap_or_default();
        let event_time = event_time_millis(&local_time, &zone)?;

        let payload = serde_json::to_string_pretty(&Value::Object(record))
            .map_err(|e| HubError::Serialization(e.to_string()))?;

        Ok(Self {
            source_id,
            station_id,
            payload,
            event_time,
        })
    }
}

/// Decode either payload format into a flat map
pub fn parse_record(text: &str) -> Result<Map<String, Value>> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(HubError::InvalidPayload("expected a JSON object".to_string())),
            Err(e) => Err(HubError::InvalidPayload(e.to_string())),
        };
    }

    let mut map = Map::new();
    for line in trimmed.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| HubError::InvalidPayload(format!("no key in line {:?}", line)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(HubError::InvalidPayload(format!("empty key in line {:?}", line)));
        }
        map.insert(key.to_string(), scalar(value.trim()));
    }

    if map.is_empty() {
        return Err(HubError::InvalidPayload("empty record".to_string()));
    }
    Ok(map)
}

fn scalar(value: &str) -> Value {
    if let Ok(int) = value.parse::<i64>() {
        return Value::Number(int.into());
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn field_text(record: &Map<String, Value>, name: &str) -> Result<String> {
    record
        .get(name)
        .map(value_text)
        .ok_or_else(|| HubError::InvalidPayload(format!("missing field {:?}", name)))
}

// =============================================================================
// Event time
// =============================================================================

/// Convert a local `yyyyMMddHHmmss` time in the named zone to UTC millis
pub fn event_time_millis(local_time: &str, zone: &str) -> Result<i64> {
    let naive = NaiveDateTime::parse_from_str(local_time, LOCAL_TIME_FORMAT).map_err(|e| {
        HubError::InvalidPayload(format!("bad {} {:?}: {}", FIELD_LOCAL_TIME, local_time, e))
    })?;

    let offset = zone_offset(zone).unwrap_or_else(|| {
        warn!(zone = %zone, "Unknown time zone, treating as UTC");
        Utc.fix()
    });

    let local = offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| HubError::InvalidPayload(format!("ambiguous local time {:?}", local_time)))?;
    Ok(local.with_timezone(&Utc).timestamp_millis())
}

/// Resolve a zone abbreviation or numeric offset
pub fn zone_offset(zone: &str) -> Option<FixedOffset> {
    const HOUR: i32 = 3600;
    let zone = zone.trim();
    let seconds = match zone.to_ascii_uppercase().as_str() {
        "UTC" | "GMT" | "Z" => 0,
        "ACST" | "CST" => 9 * HOUR + HOUR / 2,
        "ACDT" => 10 * HOUR + HOUR / 2,
        "AEST" => 10 * HOUR,
        "AEDT" => 11 * HOUR,
        "AWST" => 8 * HOUR,
        _ => return numeric_offset(zone),
    };
    FixedOffset::east_opt(seconds)
}

/// Parse `+HH:MM`, `+HHMM` or `+HH`
fn numeric_offset(zone: &str) -> Option<FixedOffset> {
    let (sign, rest) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
