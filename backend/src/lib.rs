pub mod availability;
pub mod export;
pub mod schedule;

use std::fmt::Display;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minutes from midnight, local to the league. All slot times live inside a
/// single local day, so a `u16` is plenty.
pub type Minutes = u16;

pub const MINUTES_PER_DAY: Minutes = 24 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeRangeError {
    #[error("a time range must end after it starts ({start} >= {end})")]
    Inverted { start: Minutes, end: Minutes },
    #[error("minute offset {0} does not fit in a single day")]
    PastMidnight(Minutes),
}

/// A half-open `[start, end)` window of minutes within one day.
///
/// Two ranges that touch at an endpoint do not overlap: `[18:00, 19:00)`
/// and `[19:00, 20:00)` can share a field.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TimeRange {
    start: Minutes,
    end: Minutes,
}

impl TimeRange {
    pub fn new(start: Minutes, end: Minutes) -> Result<Self, TimeRangeError> {
        if end > MINUTES_PER_DAY {
            return Err(TimeRangeError::PastMidnight(end));
        }

        if start >= end {
            return Err(TimeRangeError::Inverted { start, end });
        }

        Ok(Self { start, end })
    }

    /// Invariant-skipping constructor for ranges derived from an already
    /// validated range (interval subtraction, fixed-length chunking).
    pub(crate) const fn new_unchecked(start: Minutes, end: Minutes) -> Self {
        Self { start, end }
    }

    pub const fn start(&self) -> Minutes {
        self.start
    }

    pub const fn end(&self) -> Minutes {
        self.end
    }

    pub const fn len(&self) -> Minutes {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", hhmm(self.start), hhmm(self.end))
    }
}

/// `510` -> `"08:30"`
pub fn hhmm(minutes: Minutes) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// `510` -> `"8:30 AM"`, `1140` -> `"7:00 PM"`
pub fn hhmm_12(minutes: Minutes) -> String {
    let hour = minutes / 60;
    let minute = minutes % 60;

    let (clock_hour, half) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };

    format!("{clock_hour}:{minute:02} {half}")
}

/// `2026-04-01` -> `"04/01/2026"`
pub fn mdy(date: NaiveDate) -> String {
    format!("{:02}/{:02}/{}", date.month(), date.day(), date.year())
}

/// ISO-8601 week key, used by every per-week counter.
pub type IsoWeekKey = (i32, u32);

pub fn iso_week_of(date: NaiveDate) -> IsoWeekKey {
    let week = date.iso_week();
    (week.year(), week.week())
}

/// League timezones are stored as IANA names; anything `chrono-tz` does not
/// recognize is rejected at configuration time.
pub fn is_valid_timezone(name: &str) -> bool {
    name.parse::<chrono_tz::Tz>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_and_empty_ranges() {
        assert_eq!(
            TimeRange::new(1200, 1080),
            Err(TimeRangeError::Inverted {
                start: 1200,
                end: 1080
            })
        );
        assert_eq!(
            TimeRange::new(600, 600),
            Err(TimeRangeError::Inverted {
                start: 600,
                end: 600
            })
        );
        assert_eq!(
            TimeRange::new(600, 2000),
            Err(TimeRangeError::PastMidnight(2000))
        );
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        let first = TimeRange::new(18 * 60, 19 * 60).unwrap();
        let second = TimeRange::new(19 * 60, 20 * 60).unwrap();
        let overlapping = TimeRange::new(18 * 60 + 30, 19 * 60 + 30).unwrap();

        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
        assert!(first.overlaps(&overlapping));
        assert!(overlapping.overlaps(&second));
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(hhmm(0), "00:00");
        assert_eq!(hhmm(19 * 60 + 5), "19:05");
        assert_eq!(hhmm_12(0), "12:00 AM");
        assert_eq!(hhmm_12(12 * 60), "12:00 PM");
        assert_eq!(hhmm_12(18 * 60 + 30), "6:30 PM");
        assert_eq!(
            mdy(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()),
            "04/01/2026"
        );
    }

    #[test]
    fn iso_week_spans_year_boundary() {
        // 2027-01-01 is a Friday, so it still belongs to 2026's final ISO week.
        assert_eq!(
            iso_week_of(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            (2026, 1)
        );
        assert_eq!(
            iso_week_of(NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()),
            (2026, 53)
        );
    }

    #[test]
    fn timezone_names() {
        assert!(is_valid_timezone("America/Chicago"));
        assert!(!is_valid_timezone("Mars/Olympus_Mons"));
    }
}
