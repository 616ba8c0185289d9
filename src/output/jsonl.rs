//! JSON-lines record sink

use crate::model::ScheduleRecord;
use crate::output::OutputResult;
use std::io::Write;

/// Writes records as JSON lines: one object per record, in input order
///
/// Fields: `id, date, start, end, title, location, attendees[]`.
pub fn write_records<W: Write>(writer: &mut W, records: &[ScheduleRecord]) -> OutputResult<()> {
    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

/// Human-readable monthly listing, matching the groupware's own phrasing
pub fn format_listing(name: &str, year: i32, month: u32, records: &[ScheduleRecord]) -> String {
    let mut out = format!(
        "{}さんの{:04}年{:02}月のスケジュールは次の通りです。\n",
        name, year, month
    );
    for record in records {
        out.push_str(&record.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn sample() -> ScheduleRecord {
        ScheduleRecord {
            id: "e101".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            start: NaiveTime::from_hms_opt(9, 0, 0),
            end: NaiveTime::from_hms_opt(10, 0, 0),
            title: "Kickoff".to_string(),
            location: Some("Room A".to_string()),
            attendees: vec!["Sato".to_string()],
            source_page: "2024-05@0".to_string(),
        }
    }

    #[test]
    fn test_write_records_one_line_per_record() {
        let mut buffer = Vec::new();
        write_records(&mut buffer, &[sample(), sample()]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_written_json_carries_fields() {
        let mut buffer = Vec::new();
        write_records(&mut buffer, &[sample()]).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(String::from_utf8(buffer).unwrap().trim()).unwrap();

        assert_eq!(value["id"], "e101");
        assert_eq!(value["date"], "2024-05-01");
        assert_eq!(value["title"], "Kickoff");
        assert_eq!(value["location"], "Room A");
        assert_eq!(value["attendees"][0], "Sato");
        // Diagnostics stay out of the sink format
        assert!(value.get("source_page").is_none());
    }

    #[test]
    fn test_listing_format() {
        let listing = format_listing("山田", 2024, 5, &[sample()]);
        assert!(listing.starts_with("山田さんの2024年05月のスケジュールは次の通りです。"));
        assert!(listing.contains("1日 09:00-10:00 Kickoff"));
    }
}
