//! Trace parsing
//!
//! Reads recorded sessions as NDJSON or a JSON array of frame records and
//! checks them before they reach the pipeline.

use crate::error::BlinkMorseError;
use crate::schema::frame_record::FrameRecord;

/// Adapter for loading frame records
pub struct TraceAdapter;

impl TraceAdapter {
    /// Parse a JSON string containing an array of frame records
    pub fn parse_array(json: &str) -> Result<Vec<FrameRecord>, BlinkMorseError> {
        let records: Vec<FrameRecord> = serde_json::from_str(json)?;
        Self::validate_all(&records)?;
        Ok(records)
    }

    /// Parse NDJSON (one frame record per line)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FrameRecord>, BlinkMorseError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record = Self::parse_line(trimmed).map_err(|e| {
                BlinkMorseError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Parse and validate a single NDJSON line
    pub fn parse_line(line: &str) -> Result<FrameRecord, BlinkMorseError> {
        let record: FrameRecord = serde_json::from_str(line)?;
        record
            .validate()
            .map_err(|e| BlinkMorseError::InvalidTrace(e.to_string()))?;
        Ok(record)
    }

    /// Reject traces whose timestamps go backwards
    pub fn check_monotonic(records: &[FrameRecord]) -> Result<(), BlinkMorseError> {
        for (i, pair) in records.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(BlinkMorseError::InvalidTrace(format!(
                    "timestamp goes backwards at record {} ({} < {})",
                    i + 2,
                    pair[1].timestamp,
                    pair[0].timestamp
                )));
            }
        }
        Ok(())
    }

    fn validate_all(records: &[FrameRecord]) -> Result<(), BlinkMorseError> {
        for (i, record) in records.iter().enumerate() {
            record.validate().map_err(|e| {
                BlinkMorseError::InvalidTrace(format!("record {}: {}", i + 1, e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let ndjson = "{\"timestamp\": 0.0, \"ear\": 0.3}\n\n{\"timestamp\": 0.01}\n";
        let records = TraceAdapter::parse_ndjson(ndjson).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].raw_ear(), None);
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let ndjson = "{\"timestamp\": 0.0, \"ear\": 0.3}\n{\"timestamp\": oops}\n";
        match TraceAdapter::parse_ndjson(ndjson) {
            Err(BlinkMorseError::ParseError(msg)) => assert!(msg.contains("line 2")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_ndjson_rejects_invalid_records() {
        let ndjson = "{\"timestamp\": -2.0, \"ear\": 0.3}\n";
        assert!(TraceAdapter::parse_ndjson(ndjson).is_err());
    }

    #[test]
    fn test_parse_array() {
        let json = r#"[{"timestamp": 0.0, "ear": 0.3}, {"timestamp": 0.5, "ear": 0.1}]"#;
        let records = TraceAdapter::parse_array(json).unwrap();
        assert_eq!(records.len(), 2);

        let bad = r#"[{"timestamp": 0.0, "ear": -0.3}]"#;
        assert!(matches!(
            TraceAdapter::parse_array(bad),
            Err(BlinkMorseError::InvalidTrace(_))
        ));
    }

    #[test]
    fn test_check_monotonic() {
        let ok = vec![
            FrameRecord::with_ear(0.0, 0.3),
            FrameRecord::with_ear(0.0, 0.3),
            FrameRecord::no_face(0.1),
        ];
        assert!(TraceAdapter::check_monotonic(&ok).is_ok());

        let bad = vec![FrameRecord::with_ear(1.0, 0.3), FrameRecord::with_ear(0.5, 0.3)];
        assert!(TraceAdapter::check_monotonic(&bad).is_err());
    }
}
