//! Pre-schedule capacity report.
//!
//! Admins run this before generating a season to see, per division,
//! whether the open slot inventory can hold a full round robin.

use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;

use crate::entities::{Division, GameType, Slot, SlotStatus, Team};
use crate::errors::ScheduleOpError;
use crate::roles::RoleContext;
use crate::store::list;
use crate::Client;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionReport {
    pub division: String,
    pub team_count: usize,
    pub matchups_required: usize,
    pub open_slots: usize,
    pub capacity_sufficient: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreScheduleReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub divisions: Vec<DivisionReport>,
}

impl Client {
    pub async fn pre_schedule_report(
        &self,
        ctx: &RoleContext,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PreScheduleReport, ScheduleOpError> {
        ctx.require_admin()?;

        let teams: Vec<Team> = list(self.store(), &ctx.league_id).await?;
        let slots: Vec<Slot> = list(self.store(), &ctx.league_id).await?;

        let codes: Vec<String> = list::<Division>(self.store(), &ctx.league_id)
            .await?
            .into_iter()
            .filter(|division| division.is_active)
            .map(|division| division.code)
            .chain(teams.iter().map(|team| team.division.clone()))
            .unique()
            .sorted()
            .collect();

        let divisions = codes
            .into_iter()
            .map(|code| {
                let team_count = teams.iter().filter(|team| team.division == code).count();
                let matchups_required = team_count * team_count.saturating_sub(1) / 2;
                let open_slots = slots
                    .iter()
                    .filter(|slot| {
                        slot.division == code
                            && slot.status == SlotStatus::Open
                            && slot.game_type == GameType::Game
                            && from <= slot.game_date
                            && slot.game_date <= to
                    })
                    .count();

                DivisionReport {
                    division: code,
                    team_count,
                    matchups_required,
                    open_slots,
                    capacity_sufficient: open_slots >= matchups_required,
                }
            })
            .collect();

        Ok(PreScheduleReport {
            from,
            to,
            divisions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::tests::{admin_ctx, coach_ctx, seed_league, slot_input};
    use crate::store::save;

    async fn seed_team(client: &Client, division: &str, team_id: &str) {
        let mut team = Team {
            league_id: "league".into(),
            division: division.into(),
            team_id: team_id.into(),
            name: team_id.to_uppercase(),
            coach_name: "Pat".into(),
            coach_email: format!("{team_id}@example.com"),
            coach_phone: "555-0100".into(),
            version: 0,
        };
        save(client.store(), &mut team).await.unwrap();
    }

    #[tokio::test]
    async fn reports_capacity_per_division() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        for team in ["hawks", "tigers", "bears"] {
            seed_team(&client, "10U", team).await;
        }
        seed_team(&client, "12U", "comets").await;

        let admin = admin_ctx("league");
        for (index, day) in [6, 7].iter().enumerate() {
            let mut input = slot_input(9 * 60 + index as u16 * 120, 10 * 60 + index as u16 * 120);
            input.game_date = format!("2026-04-{day:02}");
            client.create_slot(&admin, input).await.unwrap();
        }

        let report = client
            .pre_schedule_report(
                &admin,
                NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 4, 30).unwrap(),
            )
            .await
            .unwrap();

        let ten_u = report
            .divisions
            .iter()
            .find(|division| division.division == "10U")
            .unwrap();
        assert_eq!(ten_u.team_count, 3);
        assert_eq!(ten_u.matchups_required, 3);
        assert_eq!(ten_u.open_slots, 2);
        assert!(!ten_u.capacity_sufficient);

        let twelve_u = report
            .divisions
            .iter()
            .find(|division| division.division == "12U")
            .unwrap();
        assert_eq!(twelve_u.matchups_required, 0);
        assert!(twelve_u.capacity_sufficient);

        assert!(matches!(
            client
                .pre_schedule_report(
                    &coach_ctx("league", "10U", "hawks"),
                    report.from,
                    report.to
                )
                .await,
            Err(ScheduleOpError::Forbidden(_))
        ));
    }
}
