//! Data model for extraction runs
//!
//! # Components
//!
//! - `ScheduleRecord`: one calendar entry with a stable identifier
//! - `DateWindow`: one calendar month processed as a pagination sequence
//! - `RunResult` / `RunSummary`: the final deduplicated record set plus the
//!   accounting callers need to detect partial results

mod record;
mod window;

pub use record::ScheduleRecord;
pub use window::{month_windows, DateWindow};

/// Accounting for one extraction run
///
/// The summary always reports what was skipped or discarded so callers can
/// detect partial results without inspecting logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages fetched and parsed successfully
    pub pages_fetched: u32,

    /// Pages that exhausted their retry budget and were skipped
    pub pages_failed: u32,

    /// Records discarded as unparsable (malformed date or time)
    pub records_discarded: u32,

    /// Windows whose traversal was abandoned; their partial pages are kept
    pub failed_windows: Vec<DateWindow>,
}

/// Final output of a run: ordered records plus the run summary
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Deduplicated records ordered by date, start time, then identifier
    pub records: Vec<ScheduleRecord>,

    pub summary: RunSummary,
}
