//! Tests for observation payload decoding
//!
//! These tests verify:
//! - JSON and plain-text payloads decode to the same record
//! - Event times are converted from the named zone to UTC
//! - Missing or malformed fields are rejected

use chrono::{TimeZone, Utc};
use weatherhub::error::HubError;
use weatherhub::store::{event_time_millis, parse_record, Observation, SourceId};

// =============================================================================
// Helper Functions
// =============================================================================

const JSON_PAYLOAD: &str = r#"{
    "id": "IDS60901",
    "name": "Adelaide (West Terrace /  ngayirdapira)",
    "state": "SA",
    "time_zone": "CST",
    "local_date_time_full": "20230715160000",
    "air_temp": 13.3,
    "rel_hum": 60
}"#;

const TEXT_PAYLOAD: &str = "id:IDS60901
name:Adelaide (West Terrace /  ngayirdapira)
state: SA
time_zone:CST
local_date_time_full:20230715160000
air_temp:13.3
rel_hum:60
";

fn utc_millis(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
        .single()
        .unwrap()
        .timestamp_millis()
}

// =============================================================================
// Payload Format Tests
// =============================================================================

#[test]
fn test_json_payload() {
    let source = SourceId::new_random();
    let observation = Observation::from_payload(source, JSON_PAYLOAD.as_bytes()).unwrap();

    assert_eq!(observation.source_id, source);
    assert_eq!(observation.station_id, "IDS60901");
    // 16:00 at +09:30 is 06:30 UTC
    assert_eq!(observation.event_time, utc_millis(2023, 7, 15, 6, 30, 0));
}

#[test]
fn test_text_and_json_decode_alike() {
    let source = SourceId::new_random();
    let from_json = Observation::from_payload(source, JSON_PAYLOAD.as_bytes()).unwrap();
    let from_text = Observation::from_payload(source, TEXT_PAYLOAD.as_bytes()).unwrap();

    assert_eq!(from_json.station_id, from_text.station_id);
    assert_eq!(from_json.event_time, from_text.event_time);
}

#[test]
fn test_text_values_keep_numbers() {
    let record = parse_record(TEXT_PAYLOAD).unwrap();
    assert!(record["air_temp"].is_f64());
    assert_eq!(record["rel_hum"].as_i64(), Some(60));
    assert_eq!(record["state"].as_str(), Some("SA"));
}

#[test]
fn test_text_splits_at_first_colon() {
    let record = parse_record("id: X\nnote: wind: gusty").unwrap();
    assert_eq!(record["note"].as_str(), Some("wind: gusty"));
}

#[test]
fn test_payload_is_pretty_json() {
    let observation =
        Observation::from_payload(SourceId::new_random(), TEXT_PAYLOAD.as_bytes()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&observation.payload).unwrap();

    assert_eq!(value["id"], "IDS60901");
    assert!(observation.payload.contains('\n'));
}

#[test]
fn test_numeric_local_time_in_json() {
    let payload = r#"{"id": "S1", "local_date_time_full": 20230715160000, "time_zone": "UTC"}"#;
    let observation =
        Observation::from_payload(SourceId::new_random(), payload.as_bytes()).unwrap();
    assert_eq!(observation.event_time, utc_millis(2023, 7, 15, 16, 0, 0));
}

// =============================================================================
// Event Time Tests
// =============================================================================

#[test]
fn test_zone_abbreviations() {
    let base = utc_millis(2023, 1, 1, 12, 0, 0);
    let hour = 3_600_000;

    assert_eq!(event_time_millis("20230101120000", "GMT").unwrap(), base);
    assert_eq!(event_time_millis("20230101120000", "AEST").unwrap(), base - 10 * hour);
    assert_eq!(event_time_millis("20230101120000", "AEDT").unwrap(), base - 11 * hour);
    assert_eq!(event_time_millis("20230101120000", "AWST").unwrap(), base - 8 * hour);
    assert_eq!(
        event_time_millis("20230101120000", "ACDT").unwrap(),
        base - 10 * hour - hour / 2
    );
}

#[test]
fn test_numeric_offsets() {
    let base = utc_millis(2023, 1, 1, 12, 0, 0);
    assert_eq!(
        event_time_millis("20230101120000", "+05:30").unwrap(),
        base - 5 * 3_600_000 - 30 * 60_000
    );
    assert_eq!(
        event_time_millis("20230101120000", "-0800").unwrap(),
        base + 8 * 3_600_000
    );
}

#[test]
fn test_unknown_zone_treated_as_utc() {
    let base = utc_millis(2023, 1, 1, 12, 0, 0);
    assert_eq!(event_time_millis("20230101120000", "Mars/Olympus").unwrap(), base);
}

#[test]
fn test_bad_local_time_rejected() {
    assert!(matches!(
        event_time_millis("2023-01-01", "UTC"),
        Err(HubError::InvalidPayload(_))
    ));
    assert!(matches!(
        event_time_millis("20231301120000", "UTC"),
        Err(HubError::InvalidPayload(_))
    ));
}

// =============================================================================
// Rejection Tests
// =============================================================================

#[test]
fn test_missing_station_id() {
    let payload = "local_date_time_full: 20230715160000\ntime_zone: UTC";
    assert!(matches!(
        Observation::from_payload(SourceId::new_random(), payload.as_bytes()),
        Err(HubError::InvalidPayload(_))
    ));
}

#[test]
fn test_missing_local_time() {
    let payload = r#"{"id": "S1", "time_zone": "UTC"}"#;
    assert!(Observation::from_payload(SourceId::new_random(), payload.as_bytes()).is_err());
}

#[test]
fn test_json_array_rejected() {
    assert!(parse_record("[1, 2, 3]").is_err());
    assert!(parse_record("{\"id\": ").is_err());
}

#[test]
fn test_line_without_colon_rejected() {
    assert!(parse_record("id: S1\njust some words").is_err());
}

#[test]
fn test_invalid_utf8_rejected() {
    assert!(Observation::from_payload(SourceId::new_random(), &[0xff, 0xfe, 0x00]).is_err());
}

// =============================================================================
// SourceId Tests
// =============================================================================

#[test]
fn test_source_id_parse_and_display() {
    let text = "5b0f6c2e-8d1e-4a51-9f5a-3c0a2b7d9e11";
    let id = SourceId::parse(text).unwrap();
    assert_eq!(id.to_string(), text);
    assert_eq!(text.parse::<SourceId>().unwrap(), id);
}

#[test]
fn test_source_id_rejects_garbage() {
    assert!(matches!(
        SourceId::parse("not-a-uuid"),
        Err(HubError::InvalidSourceId(_))
    ));
}
