//! Writers for the tidy aggregated runoff table.

use std::io::Write;

use csv::WriterBuilder;

use crate::model::{AggregatedRunoff, Result};

/// Header row of the CSV output.
pub const CSV_HEADER: [&str; 4] = ["unit_id", "timestamp", "estimated_runoff", "estimated_percentage"];

/// Writes rows as CSV with RFC 3339 timestamps. Absent values are empty cells.
pub fn write_csv<W: Write>(rows: &[AggregatedRunoff], writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for row in rows {
        let timestamp = row.timestamp.to_rfc3339();
        let runoff = row.estimated_runoff.map(|v| v.to_string()).unwrap_or_default();
        let percentage = row.estimated_percentage.map(|v| v.to_string()).unwrap_or_default();
        wtr.write_record([
            row.unit_id.as_str(),
            timestamp.as_str(),
            runoff.as_str(),
            percentage.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Renders rows as a pretty-printed JSON array.
pub fn to_json(rows: &[AggregatedRunoff]) -> Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rows() -> Vec<AggregatedRunoff> {
        vec![
            AggregatedRunoff {
                unit_id: "05090201".to_string(),
                timestamp: Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
                estimated_runoff: Some(1.5),
                estimated_percentage: None,
            },
            AggregatedRunoff {
                unit_id: "05090201".to_string(),
                timestamp: Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap(),
                estimated_runoff: Some(12.0),
                estimated_percentage: Some(60.0),
            },
        ]
    }

    #[test]
    fn test_csv_layout() {
        let mut buf = Vec::new();
        write_csv(&rows(), &mut buf).expect("write to memory");
        let text = String::from_utf8(buf).expect("utf-8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "unit_id,timestamp,estimated_runoff,estimated_percentage");
        assert_eq!(lines[1], "05090201,2000-01-01T00:00:00+00:00,1.5,");
        assert_eq!(lines[2], "05090201,2000-01-02T00:00:00+00:00,12,60");
    }

    #[test]
    fn test_empty_table_is_header_only() {
        let mut buf = Vec::new();
        write_csv(&[], &mut buf).expect("write to memory");
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_json_uses_null_for_absent_values() {
        let json = to_json(&rows()).expect("serializable");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed[0]["unit_id"], "05090201");
        assert!(parsed[0]["estimated_percentage"].is_null());
        assert_eq!(parsed[1]["estimated_percentage"], 60.0);
    }
}
