//! Datagram codec: one [`LogRecord`] per datagram, encoded as a UTF-8 JSON
//! object with the fields `timestamp`, `level`, `category`, `message`,
//! `exception`, `eventId` and `source`.
//!
//! There is no framing, length prefix or fragmentation.

use crate::error::CodecError;
use crate::record::LogRecord;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_PAYLOAD: usize = 65_507;

/// Encode a record into a datagram payload.
pub fn encode(record: &LogRecord) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(record)?)
}

/// Decode a datagram payload into a record.
///
/// Fails on invalid UTF-8, truncated JSON, or a payload that does not
/// match the record schema.
pub fn decode(payload: &[u8]) -> Result<LogRecord, CodecError> {
    let text = std::str::from_utf8(payload)?;
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogLevel;
    use serde_json::json;

    #[test]
    fn round_trip_preserves_every_field() {
        let record = LogRecord::new(LogLevel::Critical, "Billing.Invoices", "charge failed")
            .with_event_id(42)
            .with_exception("card declined")
            .with_source("billing-01");

        let decoded = decode(&encode(&record).expect("encode")).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn encodes_wire_field_names() {
        let record = LogRecord::new(LogLevel::Warning, "App", "hi").with_event_id(3);
        let value: serde_json::Value =
            serde_json::from_slice(&encode(&record).expect("encode")).expect("json");

        assert_eq!(value["level"], "Warning");
        assert_eq!(value["eventId"], 3);
        assert_eq!(value["exception"], serde_json::Value::Null);
        assert_eq!(value["source"], serde_json::Value::Null);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let payload = json!({
            "level": "Error",
            "category": "Worker.Task",
            "message": "disk full",
            "eventId": 7
        });
        let record = decode(payload.to_string().as_bytes()).expect("decode");

        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(record.category, "Worker.Task");
        assert_eq!(record.event_id, 7);
        assert!(record.exception.is_none());
        assert!(record.source.is_none());
    }

    #[test]
    fn accepts_iso_timestamp_variants() {
        let basic_offset = json!({
            "timestamp": "2024-03-05T10:20:30.456+0200",
            "level": "Information",
            "category": "App",
            "message": "basic offset"
        });
        let record = decode(basic_offset.to_string().as_bytes()).expect("decode");
        assert_eq!(record.timestamp.to_rfc3339(), "2024-03-05T10:20:30.456+02:00");

        // Skipped by the spring-forward transition in several zones; must
        // still decode wherever the test runs.
        let local_gap = json!({
            "timestamp": "2024-03-10T02:30:00.000",
            "level": "Information",
            "category": "App",
            "message": "local gap"
        });
        let record = decode(local_gap.to_string().as_bytes()).expect("decode");
        assert_eq!(record.message, "local gap");
    }

    #[test]
    fn level_names_are_case_insensitive() {
        let record = decode(br#"{"level":"warning","category":"a","message":"b"}"#).expect("decode");
        assert_eq!(record.level, LogLevel::Warning);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(decode(b"{\"level\":\"Err"), Err(CodecError::Json(_))));
        assert!(matches!(decode(&[0xff, 0xfe, 0x00]), Err(CodecError::Utf8(_))));
        assert!(matches!(decode(b"{\"foo\":1}"), Err(CodecError::Json(_))));
        assert!(decode(br#"{"level":"Loud","category":"a","message":"b"}"#).is_err());
    }
}
