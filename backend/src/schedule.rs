//! Round-robin schedule generation and rule re-checking.
//!
//! The generator is a deterministic greedy pass with balance tie-breaks,
//! not an optimizer; every run over identical input produces identical
//! output. The validator is a pure second opinion over whatever the
//! generator (or anything else) produced.

pub mod generate;
pub mod validate;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::TimeRange;

/// A bookable slot offered to the generator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSlot {
    pub slot_id: String,
    pub field_key: String,
    pub game_date: NaiveDate,
    pub time: TimeRange,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constraints {
    pub max_games_per_week: Option<u32>,
    pub no_double_headers: bool,
    pub balance_home_away: bool,
    pub external_offer_per_week: u32,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_games_per_week: None,
            no_double_headers: true,
            balance_home_away: true,
            external_offer_per_week: 0,
        }
    }
}

/// One scheduled slot. Internal games carry both teams; an external offer
/// carries neither and is reserved for a non-league opponent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub slot_id: String,
    pub game_date: NaiveDate,
    pub time: TimeRange,
    pub field_key: String,
    pub home_team_id: Option<String>,
    pub away_team_id: Option<String>,
    pub is_external_offer: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    pub teams: usize,
    pub matchups: usize,
    pub games_assigned: usize,
    pub external_offers: usize,
    pub unassigned_slots: usize,
    pub unassigned_matchups: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResult {
    pub summary: ScheduleSummary,
    pub assignments: Vec<Assignment>,
    pub unassigned_slots: Vec<OpenSlot>,
    pub unassigned_matchups: Vec<(String, String)>,
    pub failures: Vec<validate::Issue>,
}
