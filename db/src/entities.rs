//! Entity rows and their table bindings.
//!
//! Status fields are tagged Rust enums everywhere in the code path; the
//! string form only exists in the serialized row body and HTTP payloads.

use backend::{Minutes, TimeRange, TimeRangeError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::TableEntity;

pub mod tables {
    pub const LEAGUES: &str = "leagues";
    pub const DIVISIONS: &str = "divisions";
    pub const TEAMS: &str = "teams";
    pub const FIELDS: &str = "fields";
    pub const USERS: &str = "users";
    pub const MEMBERSHIPS: &str = "memberships";
    pub const AVAILABILITY_RULES: &str = "availability_rules";
    pub const RULE_EXCEPTIONS: &str = "rule_exceptions";
    pub const SLOTS: &str = "slots";
    pub const REQUESTS: &str = "requests";
    pub const FIELD_DAYS: &str = "field_days";
}

macro_rules! table_entity {
    ($entity:ty, $table:expr, $partition:ident, $row:ident) => {
        impl TableEntity for $entity {
            const TABLE: &'static str = $table;

            fn partition_key(&self) -> String {
                self.$partition.clone()
            }

            fn row_key(&self) -> String {
                self.$row.clone()
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    GlobalAdmin,
    LeagueAdmin,
    Coach,
    Viewer,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeagueStatus {
    #[default]
    Active,
    Archived,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    #[default]
    Game,
    Practice,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    #[default]
    Open,
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
    Superseded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonConfig {
    pub spring_start: NaiveDate,
    pub spring_end: NaiveDate,
    pub fall_start: NaiveDate,
    pub fall_end: NaiveDate,
    pub game_length_minutes: i64,
    #[serde(default)]
    pub blackouts: Vec<BlackoutWindow>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    pub league_id: String,
    pub name: String,
    pub timezone: String,
    #[serde(default)]
    pub status: LeagueStatus,
    pub season_config: SeasonConfig,
    #[serde(default)]
    pub version: u64,
}

table_entity!(League, tables::LEAGUES, league_id, league_id);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Division {
    pub league_id: String,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    #[serde(default)]
    pub version: u64,
}

table_entity!(Division, tables::DIVISIONS, league_id, code);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub league_id: String,
    pub division: String,
    pub team_id: String,
    pub name: String,
    pub coach_name: String,
    pub coach_email: String,
    pub coach_phone: String,
    #[serde(default)]
    pub version: u64,
}

table_entity!(Team, tables::TEAMS, league_id, team_id);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub league_id: String,
    pub field_key: String,
    pub location: String,
    pub field_name: String,
    pub display_name: String,
    #[serde(default)]
    pub version: u64,
}

table_entity!(Field, tables::FIELDS, league_id, field_key);

/// Process-wide account flags; `is_global_admin` is honored across all
/// leagues.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub is_global_admin: bool,
    #[serde(default)]
    pub version: u64,
}

table_entity!(UserAccount, tables::USERS, user_id, user_id);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: String,
    pub league_id: String,
    pub role: Role,
    pub email: String,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub version: u64,
}

table_entity!(Membership, tables::MEMBERSHIPS, user_id, league_id);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRule {
    pub rule_id: String,
    pub league_id: String,
    pub division: String,
    pub field_key: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    /// Weekday names, e.g. `["Mon", "Wed", "Fri"]`.
    pub days_of_week: Vec<String>,
    pub start_min: Minutes,
    pub end_min: Minutes,
    #[serde(default)]
    pub version: u64,
}

table_entity!(AvailabilityRule, tables::AVAILABILITY_RULES, league_id, rule_id);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleException {
    pub exception_id: String,
    pub league_id: String,
    pub rule_id: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub start_min: Minutes,
    pub end_min: Minutes,
    #[serde(default)]
    pub version: u64,
}

table_entity!(RuleException, tables::RULE_EXCEPTIONS, league_id, exception_id);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub slot_id: String,
    pub league_id: String,
    pub division: String,
    pub field_key: String,
    pub game_date: NaiveDate,
    pub start_min: Minutes,
    pub end_min: Minutes,
    #[serde(default)]
    pub game_type: GameType,
    #[serde(default)]
    pub offering_team_id: Option<String>,
    #[serde(default)]
    pub confirmed_team_id: Option<String>,
    #[serde(default)]
    pub home_team_id: Option<String>,
    #[serde(default)]
    pub away_team_id: Option<String>,
    #[serde(default)]
    pub is_external_offer: bool,
    #[serde(default)]
    pub status: SlotStatus,
    #[serde(default)]
    pub version: u64,
}

table_entity!(Slot, tables::SLOTS, league_id, slot_id);

impl Slot {
    pub fn time(&self) -> Result<TimeRange, TimeRangeError> {
        TimeRange::new(self.start_min, self.end_min)
    }

    /// `Cancelled` never transitions anywhere else.
    pub fn is_terminal(&self) -> bool {
        self.status == SlotStatus::Cancelled
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_id: String,
    pub league_id: String,
    pub slot_id: String,
    pub requesting_team_id: String,
    pub requested_by: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub status: RequestStatus,
    pub created_utc: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub reviewed_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

table_entity!(Request, tables::REQUESTS, league_id, request_id);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedRange {
    pub start_min: Minutes,
    pub end_min: Minutes,
    pub slot_id: String,
}

/// Per-(league, field, date) summary of booked time ranges. Racing slot
/// writers serialize through this row's version counter, which is what
/// makes the overlap guard exact under concurrency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDay {
    pub league_id: String,
    pub field_key: String,
    pub game_date: NaiveDate,
    #[serde(default)]
    pub ranges: Vec<BookedRange>,
    #[serde(default)]
    pub version: u64,
}

impl FieldDay {
    pub fn new(league_id: &str, field_key: &str, game_date: NaiveDate) -> Self {
        Self {
            league_id: league_id.to_string(),
            field_key: field_key.to_string(),
            game_date,
            ranges: Vec::new(),
            version: 0,
        }
    }

    pub fn row_key_for(field_key: &str, game_date: NaiveDate) -> String {
        format!("{field_key}|{game_date}")
    }

    /// First booked range that strictly overlaps `candidate`, ignoring the
    /// slot being re-booked during an update.
    pub fn conflict(&self, candidate: TimeRange, ignore_slot: Option<&str>) -> Option<&BookedRange> {
        self.ranges.iter().find(|booked| {
            if ignore_slot.is_some_and(|slot_id| booked.slot_id == slot_id) {
                return false;
            }

            TimeRange::new(booked.start_min, booked.end_min)
                .map(|range| range.overlaps(&candidate))
                .unwrap_or(false)
        })
    }

    pub fn book(&mut self, candidate: TimeRange, slot_id: &str) {
        self.ranges.retain(|booked| booked.slot_id != slot_id);
        self.ranges.push(BookedRange {
            start_min: candidate.start(),
            end_min: candidate.end(),
            slot_id: slot_id.to_string(),
        });
        self.ranges
            .sort_by(|a, b| (a.start_min, &a.slot_id).cmp(&(b.start_min, &b.slot_id)));
    }

    pub fn release(&mut self, slot_id: &str) {
        self.ranges.retain(|booked| booked.slot_id != slot_id);
    }
}

impl TableEntity for FieldDay {
    const TABLE: &'static str = tables::FIELD_DAYS;

    fn partition_key(&self) -> String {
        self.league_id.clone()
    }

    fn row_key(&self) -> String {
        Self::row_key_for(&self.field_key, self.game_date)
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_only_exist_at_the_serde_boundary() {
        let json = serde_json::to_value(SlotStatus::Confirmed).unwrap();
        assert_eq!(json, serde_json::json!("Confirmed"));

        let parsed: RequestStatus = serde_json::from_value(serde_json::json!("Superseded")).unwrap();
        assert_eq!(parsed, RequestStatus::Superseded);
    }

    #[test]
    fn field_day_conflict_ignores_touching_and_own_slot() {
        let mut day = FieldDay::new("league", "park/1", NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        day.book(TimeRange::new(18 * 60, 19 * 60).unwrap(), "s1");

        assert!(day
            .conflict(TimeRange::new(19 * 60, 20 * 60).unwrap(), None)
            .is_none());
        assert!(day
            .conflict(TimeRange::new(18 * 60 + 30, 19 * 60 + 30).unwrap(), None)
            .is_some());
        assert!(day
            .conflict(TimeRange::new(18 * 60 + 30, 19 * 60 + 30).unwrap(), Some("s1"))
            .is_none());

        day.release("s1");
        assert!(day.ranges.is_empty());
    }
}
