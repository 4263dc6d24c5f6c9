//! Expands recurring availability rules, minus dated exceptions and
//! league-wide blackouts, into a concrete set of fixed-length slots.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use thiserror::Error;

use crate::{Minutes, TimeRange, MINUTES_PER_DAY};

/// A recurring availability rule: on the listed weekdays between `starts_on`
/// and `ends_on`, the field is open for `window` minutes of the day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub rule_id: String,
    pub division: String,
    pub field_key: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub days_of_week: Vec<Weekday>,
    pub window: TimeRange,
}

/// Subtracts a time window from one rule over a span of dates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleException {
    pub rule_id: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub window: TimeRange,
}

/// A league-level date range during which no slots may be emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blackout {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub label: String,
}

impl Blackout {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Inclusive date window the expansion is evaluated over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExpandedSlot {
    pub division: String,
    pub field_key: String,
    pub game_date: NaiveDate,
    pub time: TimeRange,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpandError {
    #[error("game length must be a positive number of minutes, got {0}")]
    InvalidConfig(i64),
}

/// Expands `rules` over `window` into back-to-back slots of
/// `game_length_minutes` each.
///
/// For every rule date whose weekday matches, the rule window is reduced by
/// each applicable exception (interval subtraction yielding 0, 1, or 2
/// residual intervals), blackout dates are dropped entirely, and every
/// residual interval is chunked from its start; the remainder shorter than a
/// game is discarded. Output is sorted by `(game_date, field_key, start)`
/// and identical inputs always yield identical output.
pub fn expand(
    rules: &[Rule],
    exceptions: &[RuleException],
    blackouts: &[Blackout],
    window: DateWindow,
    game_length_minutes: i64,
) -> Result<Vec<ExpandedSlot>, ExpandError> {
    if game_length_minutes <= 0 || game_length_minutes > i64::from(MINUTES_PER_DAY) {
        return Err(ExpandError::InvalidConfig(game_length_minutes));
    }
    let game_length = game_length_minutes as Minutes;

    let mut slots = Vec::new();

    for rule in rules {
        let from = rule.starts_on.max(window.from);
        let to = rule.ends_on.min(window.to);

        if from > to {
            continue;
        }

        for date in from.iter_days().take_while(|date| *date <= to) {
            if !rule.days_of_week.contains(&date.weekday()) {
                continue;
            }

            if blackouts.iter().any(|blackout| blackout.contains(date)) {
                continue;
            }

            let mut intervals = vec![rule.window];
            for exception in exceptions.iter().filter(|exception| {
                exception.rule_id == rule.rule_id
                    && exception.date_from <= date
                    && date <= exception.date_to
            }) {
                intervals = subtract_all(&intervals, exception.window);
            }

            for interval in intervals {
                let mut start = interval.start();
                while start + game_length <= interval.end() {
                    slots.push(ExpandedSlot {
                        division: rule.division.clone(),
                        field_key: rule.field_key.clone(),
                        game_date: date,
                        time: TimeRange::new_unchecked(start, start + game_length),
                    });
                    start += game_length;
                }
            }
        }
    }

    slots.sort_by(|a, b| {
        (a.game_date, a.field_key.as_str(), a.time.start())
            .cmp(&(b.game_date, b.field_key.as_str(), b.time.start()))
    });

    Ok(slots)
}

/// Removes `cut` from each interval. A cut in the middle of an interval
/// leaves two residuals; a covering cut leaves none.
fn subtract_all(intervals: &[TimeRange], cut: TimeRange) -> Vec<TimeRange> {
    let mut residual = Vec::with_capacity(intervals.len() + 1);

    for interval in intervals {
        if !interval.overlaps(&cut) {
            residual.push(*interval);
            continue;
        }

        if interval.start() < cut.start() {
            residual.push(TimeRange::new_unchecked(interval.start(), cut.start()));
        }

        if cut.end() < interval.end() {
            residual.push(TimeRange::new_unchecked(cut.end(), interval.end()));
        }
    }

    residual
}
