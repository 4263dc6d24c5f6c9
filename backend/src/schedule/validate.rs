//! Pure re-check pass over an assignment list.
//!
//! Everything here is read-only and idempotent: the same assignments and
//! constraints always enumerate the same issues, and nothing is fixed up on
//! the caller's behalf.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::iso_week_of;

use super::{Assignment, Constraints};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    DoubleHeader,
    MaxGamesPerWeek,
    HomeAwayImbalance,
    MissingTeams,
    Overlap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub rule_id: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub subject_ids: Vec<String>,
}

impl Issue {
    fn new(
        rule_id: IssueKind,
        severity: Severity,
        message: String,
        subject_ids: Vec<String>,
    ) -> Self {
        Self {
            rule_id,
            severity,
            message,
            subject_ids,
        }
    }
}

/// Enumerates every rule violation in `assignments`. One issue per
/// violation, in a deterministic order.
pub fn validate(assignments: &[Assignment], constraints: &Constraints) -> Vec<Issue> {
    let mut issues = Vec::new();

    check_team_dates(assignments, constraints, &mut issues);
    check_weekly_caps(assignments, constraints, &mut issues);
    check_home_away(assignments, constraints, &mut issues);
    check_missing_teams(assignments, &mut issues);
    check_field_overlaps(assignments, &mut issues);

    issues
}

fn internal_teams(assignment: &Assignment) -> impl Iterator<Item = &str> {
    assignment
        .home_team_id
        .iter()
        .chain(assignment.away_team_id.iter())
        .map(String::as_str)
}

fn check_team_dates(assignments: &[Assignment], constraints: &Constraints, issues: &mut Vec<Issue>) {
    let mut by_team_date: BTreeMap<(&str, NaiveDate), u32> = BTreeMap::new();

    for assignment in assignments {
        for team in internal_teams(assignment) {
            *by_team_date.entry((team, assignment.game_date)).or_insert(0) += 1;
        }
    }

    let severity = if constraints.no_double_headers {
        Severity::Error
    } else {
        Severity::Warn
    };

    for ((team, game_date), count) in by_team_date {
        if count > 1 {
            issues.push(Issue::new(
                IssueKind::DoubleHeader,
                severity,
                format!("{team} plays {count} games on {game_date}"),
                vec![team.to_string()],
            ));
        }
    }
}

fn check_weekly_caps(
    assignments: &[Assignment],
    constraints: &Constraints,
    issues: &mut Vec<Issue>,
) {
    let Some(cap) = constraints.max_games_per_week else {
        return;
    };

    let mut by_team_week: BTreeMap<(&str, (i32, u32)), u32> = BTreeMap::new();
    for assignment in assignments {
        let week = iso_week_of(assignment.game_date);
        for team in internal_teams(assignment) {
            *by_team_week.entry((team, week)).or_insert(0) += 1;
        }
    }

    for ((team, (year, week)), count) in by_team_week {
        if count > cap {
            issues.push(Issue::new(
                IssueKind::MaxGamesPerWeek,
                Severity::Error,
                format!("{team} has {count} games in ISO week {year}-W{week:02} (cap {cap})"),
                vec![team.to_string()],
            ));
        }
    }
}

fn check_home_away(assignments: &[Assignment], constraints: &Constraints, issues: &mut Vec<Issue>) {
    if !constraints.balance_home_away {
        return;
    }

    let mut home: BTreeMap<&str, i64> = BTreeMap::new();
    let mut away: BTreeMap<&str, i64> = BTreeMap::new();
    for assignment in assignments {
        if let Some(team) = assignment.home_team_id.as_deref() {
            *home.entry(team).or_insert(0) += 1;
            away.entry(team).or_insert(0);
        }
        if let Some(team) = assignment.away_team_id.as_deref() {
            *away.entry(team).or_insert(0) += 1;
            home.entry(team).or_insert(0);
        }
    }

    for (team, home_count) in home {
        let away_count = away.get(team).copied().unwrap_or(0);
        if (home_count - away_count).abs() > 1 {
            issues.push(Issue::new(
                IssueKind::HomeAwayImbalance,
                Severity::Warn,
                format!("{team} is at {home_count} home / {away_count} away"),
                vec![team.to_string()],
            ));
        }
    }
}

fn check_missing_teams(assignments: &[Assignment], issues: &mut Vec<Issue>) {
    for assignment in assignments {
        if assignment.is_external_offer {
            continue;
        }

        if assignment.home_team_id.is_none() || assignment.away_team_id.is_none() {
            issues.push(Issue::new(
                IssueKind::MissingTeams,
                Severity::Error,
                format!(
                    "slot {} on {} is missing a team and is not an external offer",
                    assignment.slot_id, assignment.game_date
                ),
                vec![assignment.slot_id.clone()],
            ));
        }
    }
}

fn check_field_overlaps(assignments: &[Assignment], issues: &mut Vec<Issue>) {
    let mut by_field_date: BTreeMap<(&str, NaiveDate), Vec<&Assignment>> = BTreeMap::new();
    for assignment in assignments {
        by_field_date
            .entry((assignment.field_key.as_str(), assignment.game_date))
            .or_default()
            .push(assignment);
    }

    for ((field_key, game_date), mut group) in by_field_date {
        group.sort_by(|a, b| {
            (a.time, a.slot_id.as_str()).cmp(&(b.time, b.slot_id.as_str()))
        });

        // Sweep with the furthest end seen so far; touching endpoints are fine.
        let mut open_until: Option<(&Assignment, u16)> = None;
        for assignment in group {
            if let Some((previous, end)) = open_until {
                if assignment.time.start() < end {
                    issues.push(Issue::new(
                        IssueKind::Overlap,
                        Severity::Error,
                        format!(
                            "slots {} and {} overlap on {field_key} {game_date}",
                            previous.slot_id, assignment.slot_id
                        ),
                        vec![previous.slot_id.clone(), assignment.slot_id.clone()],
                    ));
                }
            }

            match open_until {
                Some((_, end)) if end >= assignment.time.end() => {}
                _ => open_until = Some((assignment, assignment.time.end())),
            }
        }
    }
}
