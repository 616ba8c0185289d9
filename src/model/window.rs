//! Date windows for range traversal
//!
//! The monthly schedule view is the unit of traversal, so a window is one
//! calendar month. A requested date range expands into the ordered list of
//! months it touches; adjacent windows may re-observe boundary-date events
//! because the monthly grid shows leading and trailing days of neighbouring
//! months. The merger resolves those overlaps downstream.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

/// One calendar month processed as a single pagination sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DateWindow {
    pub year: i32,
    pub month: u32,
}

impl DateWindow {
    /// Returns the window containing the given date
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day of the month
    ///
    /// Valid by construction for any window produced by this module.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// The window for the following month
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Resolves a `M/D` cell date as printed on this window's monthly grid
    ///
    /// The grid omits the year, and its leading/trailing cells belong to the
    /// previous or next month. A cell month matching the window resolves to
    /// the window's year; the neighbouring months resolve across the year
    /// boundary when needed. Anything else is treated as unparsable.
    pub fn resolve_date(&self, month: u32, day: u32) -> Option<NaiveDate> {
        let year = if month == self.month {
            self.year
        } else if month == self.next().month {
            self.next().year
        } else if month == previous_month(self.year, self.month).1 {
            previous_month(self.year, self.month).0
        } else {
            return None;
        };
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Expands an inclusive date range into the ordered list of month windows
///
/// Returns an error message when the range is inverted or outside the years
/// the groupware can display (1900..=2100, matching the server's own bounds).
pub fn month_windows(from: NaiveDate, to: NaiveDate) -> std::result::Result<Vec<DateWindow>, String> {
    if from > to {
        return Err(format!("range start {} is after range end {}", from, to));
    }
    if from.year() < 1900 || to.year() > 2100 {
        return Err("range must fall between 1900 and 2100".to_string());
    }

    let mut windows = Vec::new();
    let mut current = DateWindow::containing(from);
    let last = DateWindow::containing(to);
    while current <= last {
        windows.push(current);
        current = current.next();
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_single_month_range() {
        let windows = month_windows(date(2024, 5, 3), date(2024, 5, 20)).unwrap();
        assert_eq!(windows, vec![DateWindow { year: 2024, month: 5 }]);
    }

    #[test]
    fn test_range_spanning_year_boundary() {
        let windows = month_windows(date(2023, 11, 15), date(2024, 2, 1)).unwrap();
        assert_eq!(
            windows,
            vec![
                DateWindow {
                    year: 2023,
                    month: 11
                },
                DateWindow {
                    year: 2023,
                    month: 12
                },
                DateWindow { year: 2024, month: 1 },
                DateWindow { year: 2024, month: 2 },
            ]
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(month_windows(date(2024, 6, 1), date(2024, 5, 1)).is_err());
    }

    #[test]
    fn test_out_of_bounds_year_rejected() {
        assert!(month_windows(date(1899, 12, 1), date(1900, 1, 1)).is_err());
        assert!(month_windows(date(2100, 12, 1), date(2101, 1, 1)).is_err());
    }

    #[test]
    fn test_resolve_date_same_month() {
        let window = DateWindow { year: 2024, month: 5 };
        assert_eq!(window.resolve_date(5, 15), Some(date(2024, 5, 15)));
    }

    #[test]
    fn test_resolve_date_adjacent_months() {
        let window = DateWindow { year: 2024, month: 5 };
        assert_eq!(window.resolve_date(4, 29), Some(date(2024, 4, 29)));
        assert_eq!(window.resolve_date(6, 2), Some(date(2024, 6, 2)));
    }

    #[test]
    fn test_resolve_date_across_year_boundary() {
        let december = DateWindow {
            year: 2023,
            month: 12,
        };
        assert_eq!(december.resolve_date(1, 2), Some(date(2024, 1, 2)));

        let january = DateWindow { year: 2024, month: 1 };
        assert_eq!(january.resolve_date(12, 31), Some(date(2023, 12, 31)));
    }

    #[test]
    fn test_resolve_date_rejects_distant_month() {
        let window = DateWindow { year: 2024, month: 5 };
        assert_eq!(window.resolve_date(9, 1), None);
    }

    #[test]
    fn test_resolve_date_rejects_invalid_day() {
        let window = DateWindow { year: 2024, month: 2 };
        assert_eq!(window.resolve_date(2, 30), None);
    }
}
