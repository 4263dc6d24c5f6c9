//! Bridges stored rows and the pure scheduling engine: gathers generator
//! inputs, writes accepted schedules back, and shapes export data.

use backend::export::{FieldDirectory, FieldInfo, TeamNames};
use backend::schedule::{Assignment, OpenSlot, ScheduleResult};
use chrono::NaiveDate;
use serde::Serialize;

use crate::entities::{Field, GameType, Slot, SlotStatus, Team};
use crate::errors::ScheduleOpError;
use crate::retry::{with_optimistic_retry, CAS_ATTEMPTS};
use crate::roles::RoleContext;
use crate::store::{fetch, list, save_if_current};
use crate::Client;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleInputs {
    pub teams: Vec<String>,
    pub open_slots: Vec<OpenSlot>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedSchedule {
    pub applied: usize,
    pub skipped: Vec<String>,
}

impl Client {
    /// Everything the generator needs for one division: its team ids and
    /// the open game slots in the window.
    pub async fn schedule_inputs(
        &self,
        league_id: &str,
        division: &str,
        window: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<ScheduleInputs, ScheduleOpError> {
        let mut teams: Vec<String> = list::<Team>(self.store(), league_id)
            .await?
            .into_iter()
            .filter(|team| team.division == division)
            .map(|team| team.team_id)
            .collect();
        teams.sort();

        let open_slots = list::<Slot>(self.store(), league_id)
            .await?
            .into_iter()
            .filter(|slot| {
                slot.division == division
                    && slot.status == SlotStatus::Open
                    && slot.game_type == GameType::Game
                    && !slot.is_external_offer
                    && window
                        .is_none_or(|(from, to)| from <= slot.game_date && slot.game_date <= to)
            })
            .filter_map(|slot| match slot.time() {
                Ok(time) => Some(OpenSlot {
                    slot_id: slot.slot_id,
                    field_key: slot.field_key,
                    game_date: slot.game_date,
                    time,
                }),
                Err(error) => {
                    log::warn!("slot {} has a corrupt time range: {error}", slot.slot_id);
                    None
                }
            })
            .collect();

        Ok(ScheduleInputs { teams, open_slots })
    }

    /// Persists an accepted generator run. Internal games confirm their
    /// slot with both teams; external offers keep the slot open but flag
    /// it. Slots that changed state since the preview are skipped, never
    /// clobbered.
    pub async fn apply_schedule(
        &self,
        ctx: &RoleContext,
        result: &ScheduleResult,
    ) -> Result<AppliedSchedule, ScheduleOpError> {
        ctx.require_admin()?;

        let store = self.store();
        let league_id = ctx.league_id.as_str();

        let mut applied = 0;
        let mut skipped = Vec::new();

        for assignment in &result.assignments {
            let accepted = with_optimistic_retry(CAS_ATTEMPTS, move || {
                Box::pin(async move {
                    let Some(mut slot) =
                        fetch::<Slot>(store, league_id, assignment.slot_id.as_str()).await?
                    else {
                        return Ok(false);
                    };

                    if slot.status != SlotStatus::Open || slot.game_type != GameType::Game {
                        return Ok(false);
                    }

                    if assignment.is_external_offer {
                        slot.is_external_offer = true;
                    } else {
                        slot.home_team_id = assignment.home_team_id.clone();
                        slot.away_team_id = assignment.away_team_id.clone();
                        slot.confirmed_team_id = assignment.home_team_id.clone();
                        slot.status = SlotStatus::Confirmed;
                    }

                    save_if_current(store, &mut slot).await?;
                    Ok(true)
                })
            })
            .await?;

            if accepted {
                applied += 1;
            } else {
                skipped.push(assignment.slot_id.clone());
            }
        }

        log::info!(
            "applied schedule for {league_id}: {applied} slots written, {} skipped",
            skipped.len()
        );

        Ok(AppliedSchedule { applied, skipped })
    }

    /// Assignment view of everything already scheduled, for export.
    pub async fn scheduled_assignments(
        &self,
        league_id: &str,
        division: Option<&str>,
    ) -> Result<Vec<Assignment>, ScheduleOpError> {
        let mut assignments: Vec<Assignment> = list::<Slot>(self.store(), league_id)
            .await?
            .into_iter()
            .filter(|slot| {
                division.is_none_or(|division| slot.division == division)
                    && (slot.is_external_offer
                        || (slot.status == SlotStatus::Confirmed
                            && slot.home_team_id.is_some()
                            && slot.away_team_id.is_some()))
            })
            .filter_map(|slot| {
                let time = match slot.time() {
                    Ok(time) => time,
                    Err(error) => {
                        log::warn!("slot {} has a corrupt time range: {error}", slot.slot_id);
                        return None;
                    }
                };

                Some(Assignment {
                    slot_id: slot.slot_id,
                    game_date: slot.game_date,
                    time,
                    field_key: slot.field_key,
                    home_team_id: slot.home_team_id,
                    away_team_id: slot.away_team_id,
                    is_external_offer: slot.is_external_offer,
                })
            })
            .collect();

        assignments.sort_by(|a, b| {
            (a.game_date, a.time.start(), a.field_key.as_str(), a.slot_id.as_str()).cmp(&(
                b.game_date,
                b.time.start(),
                b.field_key.as_str(),
                b.slot_id.as_str(),
            ))
        });

        Ok(assignments)
    }

    pub async fn field_directory(&self, league_id: &str) -> Result<FieldDirectory, ScheduleOpError> {
        Ok(list::<Field>(self.store(), league_id)
            .await?
            .into_iter()
            .map(|field| {
                (
                    field.field_key,
                    FieldInfo {
                        display_name: field.display_name,
                        location: field.location,
                        field_name: field.field_name,
                    },
                )
            })
            .collect())
    }

    pub async fn team_names(&self, league_id: &str) -> Result<TeamNames, ScheduleOpError> {
        Ok(list::<Team>(self.store(), league_id)
            .await?
            .into_iter()
            .map(|team| (team.team_id, team.name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::tests::{admin_ctx, seed_league, slot_input};
    use crate::store::save;
    use backend::schedule::generate::generate;
    use backend::schedule::Constraints;

    async fn seed_team(client: &Client, division: &str, team_id: &str) {
        let mut team = Team {
            league_id: "league".into(),
            division: division.into(),
            team_id: team_id.into(),
            name: format!("The {team_id}"),
            coach_name: "Pat".into(),
            coach_email: format!("{team_id}@example.com"),
            coach_phone: "555-0100".into(),
            version: 0,
        };
        save(client.store(), &mut team).await.unwrap();
    }

    async fn seed_open_slots(client: &Client, count: usize) {
        let admin = admin_ctx("league");
        for index in 0..count {
            let mut input = slot_input(9 * 60, 10 * 60);
            input.game_date = format!("2026-04-{:02}", 6 + index);
            client.create_slot(&admin, input).await.unwrap();
        }
    }

    #[tokio::test]
    async fn generated_schedules_survive_the_apply_round_trip() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        for team in ["hawks", "tigers", "bears", "comets"] {
            seed_team(&client, "10U", team).await;
        }
        seed_open_slots(&client, 8).await;

        let inputs = client
            .schedule_inputs("league", "10U", None)
            .await
            .unwrap();
        assert_eq!(inputs.teams.len(), 4);
        assert_eq!(inputs.open_slots.len(), 8);

        let result = generate(
            &inputs.teams,
            &inputs.open_slots,
            &Constraints::default(),
            None,
        );
        assert_eq!(result.summary.games_assigned, 6);

        let outcome = client
            .apply_schedule(&admin_ctx("league"), &result)
            .await
            .unwrap();
        assert_eq!(outcome.applied, 6);
        assert!(outcome.skipped.is_empty());

        let assignments = client
            .scheduled_assignments("league", Some("10U"))
            .await
            .unwrap();
        assert_eq!(assignments.len(), 6);
        assert!(assignments
            .iter()
            .all(|assignment| assignment.home_team_id.is_some()));

        // Re-applying finds the slots confirmed and touches nothing.
        let rerun = client
            .apply_schedule(&admin_ctx("league"), &result)
            .await
            .unwrap();
        assert_eq!(rerun.applied, 0);
        assert_eq!(rerun.skipped.len(), 6);
    }

    #[tokio::test]
    async fn schedule_inputs_ignore_other_divisions_and_non_open_slots() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        seed_team(&client, "10U", "hawks").await;
        seed_team(&client, "12U", "comets").await;
        seed_open_slots(&client, 2).await;

        let admin = admin_ctx("league");
        let mut practice = slot_input(20 * 60, 21 * 60);
        practice.game_type = GameType::Practice;
        client.create_slot(&admin, practice).await.unwrap();

        let inputs = client
            .schedule_inputs("league", "10U", None)
            .await
            .unwrap();
        assert_eq!(inputs.teams, vec!["hawks".to_string()]);
        assert_eq!(inputs.open_slots.len(), 2);
    }
}
