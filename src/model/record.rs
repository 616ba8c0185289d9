//! Schedule record type and identifier derivation
//!
//! A `ScheduleRecord` is one calendar entry as observed on a schedule view
//! page. Identifiers must stay stable across re-fetches of the same event so
//! that repeated runs are idempotent: when the server assigns an event id we
//! use it directly, otherwise the identifier is a content hash.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// One calendar entry extracted from a schedule view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRecord {
    /// Stable identifier (`e<id>` for server-assigned ids, `h<hash>` otherwise)
    pub id: String,

    /// Calendar date of the entry
    pub date: NaiveDate,

    /// Start time; `None` for all-day entries
    pub start: Option<NaiveTime>,

    /// End time; `None` for all-day or open-ended entries
    pub end: Option<NaiveTime>,

    /// Entry title
    pub title: String,

    /// Location or facility, when the view shows one
    pub location: Option<String>,

    /// Attendee names in page order; empty when the view shows none
    pub attendees: Vec<String>,

    /// Page the record was observed on, for diagnostics only
    #[serde(skip)]
    pub source_page: String,
}

impl ScheduleRecord {
    /// Derives the stable identifier for a record
    ///
    /// A server-assigned event id (the `sEID` query parameter on the event
    /// link) wins when present. The fallback is a SHA-256 content hash over
    /// date, time range, title and location, so an event without a source id
    /// still maps to the same identifier on every fetch.
    pub fn derive_id(
        source_event_id: Option<&str>,
        date: NaiveDate,
        start: Option<NaiveTime>,
        end: Option<NaiveTime>,
        title: &str,
        location: Option<&str>,
    ) -> String {
        if let Some(eid) = source_event_id {
            let eid = eid.trim();
            if !eid.is_empty() {
                return format!("e{}", eid);
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(date.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(format_time(start).as_bytes());
        hasher.update(b"|");
        hasher.update(format_time(end).as_bytes());
        hasher.update(b"|");
        hasher.update(title.as_bytes());
        hasher.update(b"|");
        hasher.update(location.unwrap_or("").as_bytes());
        let digest = hasher.finalize();

        // 16 hex chars (64 bits) is plenty for one user's calendar
        format!("h{}", &hex::encode(digest)[..16])
    }

    /// Total ordering key: date, all-day entries first, then start time, then id
    ///
    /// Equal-looking records still order deterministically because the
    /// identifier breaks ties.
    pub fn sort_key(&self) -> (NaiveDate, bool, NaiveTime, String) {
        (
            self.date,
            self.start.is_some(),
            self.start.unwrap_or(NaiveTime::MIN),
            self.id.clone(),
        )
    }
}

impl fmt::Display for ScheduleRecord {
    /// Human-readable listing format, e.g. `5日 09:00-10:00 定例会議`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use chrono::Datelike;

        write!(f, "{}日", self.date.day())?;
        match (self.start, self.end) {
            (None, None) => {}
            (start, end) => {
                let begin = format_time(start);
                let finish = format_time(end);
                if finish.is_empty() {
                    write!(f, " {}", begin)?;
                } else {
                    write!(f, " {}-{}", begin, finish)?;
                }
            }
        }
        write!(f, " {}", self.title)
    }
}

fn format_time(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}
