//! Deduplication and merge of page results
//!
//! Adjacent month windows legitimately re-observe boundary-date events, so
//! the same identifier can show up in several page results. Conflicts
//! resolve last-write-wins by fetch order (the `seq` stamp), not wall
//! clock. Output ordering is total and deterministic: date, all-day entries
//! first, start time, then identifier.

use crate::extract::PageResult;
use crate::model::ScheduleRecord;
use std::collections::HashMap;

/// Merged record set plus the discard accounting carried over from parsing
#[derive(Debug)]
pub struct MergeOutcome {
    /// Deduplicated records in final output order
    pub records: Vec<ScheduleRecord>,

    /// Total records discarded as unparsable across all pages
    pub discarded: u32,
}

/// Consolidates page results from all windows into the final record set
pub fn merge_pages(mut pages: Vec<PageResult>) -> MergeOutcome {
    // Fetch order, regardless of which worker produced which page
    pages.sort_by_key(|page| page.seq);

    let mut discarded = 0u32;
    let mut by_id: HashMap<String, ScheduleRecord> = HashMap::new();

    for page in pages {
        discarded += page.discarded;
        for record in page.records {
            if let Some(previous) = by_id.insert(record.id.clone(), record) {
                tracing::debug!(id = %previous.id, "duplicate record superseded by later fetch");
            }
        }
    }

    let mut records: Vec<ScheduleRecord> = by_id.into_values().collect();
    records.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    MergeOutcome { records, discarded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Freshness;
    use chrono::{NaiveDate, NaiveTime};

    fn record(id: &str, date: (i32, u32, u32), start: Option<(u32, u32)>, title: &str) -> ScheduleRecord {
        ScheduleRecord {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            start: start.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            end: None,
            title: title.to_string(),
            location: None,
            attendees: vec![],
            source_page: String::new(),
        }
    }

    fn page(seq: u64, records: Vec<ScheduleRecord>, discarded: u32) -> PageResult {
        PageResult {
            records,
            continuation: None,
            freshness: Freshness::Fresh,
            discarded,
            seq,
        }
    }

    #[test]
    fn test_later_fetch_wins_on_conflict() {
        let early = page(1, vec![record("E1", (2024, 5, 31), Some((9, 0)), "old title")], 0);
        let late = page(2, vec![record("E1", (2024, 5, 31), Some((9, 0)), "edited title")], 0);

        let outcome = merge_pages(vec![late.clone(), early]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].title, "edited title");

        // Same result regardless of input vector order
        let early = page(1, vec![record("E1", (2024, 5, 31), Some((9, 0)), "old title")], 0);
        let outcome = merge_pages(vec![early, late]);
        assert_eq!(outcome.records[0].title, "edited title");
    }

    #[test]
    fn test_date_then_start_ordering() {
        let pages = vec![page(
            0,
            vec![
                record("a", (2024, 5, 2), Some((9, 0)), "third"),
                record("b", (2024, 5, 1), Some((10, 0)), "second"),
                record("c", (2024, 5, 1), Some((9, 0)), "first"),
            ],
            0,
        )];

        let outcome = merge_pages(pages);
        let titles: Vec<&str> = outcome.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_all_day_sorts_before_timed() {
        let pages = vec![page(
            0,
            vec![
                record("t", (2024, 5, 1), Some((0, 0)), "timed"),
                record("a", (2024, 5, 1), None, "all-day"),
            ],
            0,
        )];

        let outcome = merge_pages(pages);
        assert_eq!(outcome.records[0].title, "all-day");
    }

    #[test]
    fn test_identifier_breaks_ties() {
        let pages = vec![page(
            0,
            vec![
                record("z", (2024, 5, 1), Some((9, 0)), "zz"),
                record("a", (2024, 5, 1), Some((9, 0)), "aa"),
            ],
            0,
        )];

        let outcome = merge_pages(pages);
        assert_eq!(outcome.records[0].id, "a");
        assert_eq!(outcome.records[1].id, "z");
    }

    #[test]
    fn test_discards_accumulate() {
        let pages = vec![
            page(0, vec![], 2),
            page(1, vec![record("x", (2024, 5, 1), None, "x")], 1),
        ];

        let outcome = merge_pages(pages);
        assert_eq!(outcome.discarded, 3);
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn test_distinct_ids_all_kept() {
        let pages = vec![
            page(0, vec![record("a", (2024, 5, 1), Some((9, 0)), "a")], 0),
            page(1, vec![record("b", (2024, 5, 1), Some((9, 0)), "b")], 0),
        ];

        let outcome = merge_pages(pages);
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let outcome = merge_pages(vec![]);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.discarded, 0);
    }
}
