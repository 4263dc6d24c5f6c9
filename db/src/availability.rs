//! Availability rule management and slot materialization.
//!
//! Rules and their exceptions are plain rows; expansion converts them into
//! engine inputs, runs the pure expansion, and lands every emitted slot
//! through the same overlap-guarded write path coach offers use. A window
//! that is already booked shows up as a skipped slot, which also makes
//! re-running an expansion harmless.

use backend::availability as engine;
use backend::{Minutes, TimeRange};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{AvailabilityRule, GameType, League, RuleException, Slot, SlotStatus};
use crate::errors::{ExpandApplyError, RuleOpError, RuleValidationError};
use crate::retry::RetryError;
use crate::roles::RoleContext;
use crate::slots::ReserveError;
use crate::store::{fetch, list, remove, save};
use crate::{Client, Validator};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleInput {
    pub division: String,
    pub field_key: String,
    pub starts_on: String,
    pub ends_on: String,
    /// Weekday names, e.g. `["Mon", "Wed", "Fri"]`.
    pub days_of_week: Vec<String>,
    pub start_min: Minutes,
    pub end_min: Minutes,
}

impl Validator for CreateRuleInput {
    type Error = RuleValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.division.trim().is_empty() {
            return Err(RuleValidationError::EmptyDivision);
        }
        if self.field_key.trim().is_empty() {
            return Err(RuleValidationError::EmptyFieldKey);
        }

        let starts_on = parse_date(&self.starts_on)?;
        let ends_on = parse_date(&self.ends_on)?;
        if starts_on > ends_on {
            return Err(RuleValidationError::InvertedDates);
        }

        if self.days_of_week.is_empty() {
            return Err(RuleValidationError::NoWeekdays);
        }
        for day in &self.days_of_week {
            parse_weekday(day)?;
        }

        TimeRange::new(self.start_min, self.end_min)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExceptionInput {
    pub date_from: String,
    pub date_to: String,
    pub start_min: Minutes,
    pub end_min: Minutes,
}

impl Validator for CreateExceptionInput {
    type Error = RuleValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        let from = parse_date(&self.date_from)?;
        let to = parse_date(&self.date_to)?;
        if from > to {
            return Err(RuleValidationError::InvertedDates);
        }

        TimeRange::new(self.start_min, self.end_min)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandInput {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub game_type: GameType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSlot {
    pub field_key: String,
    pub game_date: NaiveDate,
    pub start_min: Minutes,
    pub end_min: Minutes,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionOutcome {
    pub created: usize,
    pub skipped: Vec<SkippedSlot>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, RuleValidationError> {
    raw.parse()
        .map_err(|_| RuleValidationError::BadDate(raw.to_string()))
}

fn parse_weekday(raw: &str) -> Result<Weekday, RuleValidationError> {
    raw.parse()
        .map_err(|_| RuleValidationError::BadWeekday(raw.to_string()))
}

fn to_engine_rule(rule: &AvailabilityRule) -> Result<engine::Rule, ExpandApplyError> {
    let corrupt = |reason: String| ExpandApplyError::CorruptRule {
        rule_id: rule.rule_id.clone(),
        reason,
    };

    let mut days = Vec::with_capacity(rule.days_of_week.len());
    for day in &rule.days_of_week {
        days.push(
            day.parse::<Weekday>()
                .map_err(|_| corrupt(format!("unknown weekday `{day}`")))?,
        );
    }

    Ok(engine::Rule {
        rule_id: rule.rule_id.clone(),
        division: rule.division.clone(),
        field_key: rule.field_key.clone(),
        starts_on: rule.starts_on,
        ends_on: rule.ends_on,
        days_of_week: days,
        window: TimeRange::new(rule.start_min, rule.end_min)
            .map_err(|error| corrupt(error.to_string()))?,
    })
}

impl Client {
    pub async fn create_rule(
        &self,
        ctx: &RoleContext,
        input: CreateRuleInput,
    ) -> Result<AvailabilityRule, RuleOpError> {
        ctx.require_admin()?;
        input.validate()?;

        let mut rule = AvailabilityRule {
            rule_id: Uuid::new_v4().to_string(),
            league_id: ctx.league_id.clone(),
            division: input.division,
            field_key: input.field_key,
            starts_on: parse_date(&input.starts_on)?,
            ends_on: parse_date(&input.ends_on)?,
            days_of_week: input.days_of_week,
            start_min: input.start_min,
            end_min: input.end_min,
            version: 0,
        };
        save(self.store(), &mut rule).await?;

        Ok(rule)
    }

    pub async fn list_rules(
        &self,
        league_id: &str,
    ) -> Result<Vec<AvailabilityRule>, RuleOpError> {
        let mut rules: Vec<AvailabilityRule> = list(self.store(), league_id).await?;
        rules.sort_by(|a, b| {
            (a.division.as_str(), a.field_key.as_str(), a.rule_id.as_str()).cmp(&(
                b.division.as_str(),
                b.field_key.as_str(),
                b.rule_id.as_str(),
            ))
        });
        Ok(rules)
    }

    /// Deleting a rule takes its exceptions with it.
    pub async fn delete_rule(&self, ctx: &RoleContext, rule_id: &str) -> Result<(), RuleOpError> {
        ctx.require_admin()?;

        if !remove::<AvailabilityRule>(self.store(), &ctx.league_id, rule_id).await? {
            return Err(RuleOpError::NotFound(rule_id.to_string()));
        }

        let orphaned: Vec<RuleException> = list(self.store(), &ctx.league_id)
            .await?
            .into_iter()
            .filter(|exception: &RuleException| exception.rule_id == rule_id)
            .collect();
        for exception in orphaned {
            remove::<RuleException>(self.store(), &ctx.league_id, &exception.exception_id).await?;
        }

        Ok(())
    }

    pub async fn add_exception(
        &self,
        ctx: &RoleContext,
        rule_id: &str,
        input: CreateExceptionInput,
    ) -> Result<RuleException, RuleOpError> {
        ctx.require_admin()?;
        input.validate()?;

        let rule: Option<AvailabilityRule> =
            fetch(self.store(), &ctx.league_id, rule_id).await?;
        if rule.is_none() {
            return Err(RuleOpError::NotFound(rule_id.to_string()));
        }

        let mut exception = RuleException {
            exception_id: Uuid::new_v4().to_string(),
            league_id: ctx.league_id.clone(),
            rule_id: rule_id.to_string(),
            date_from: parse_date(&input.date_from)?,
            date_to: parse_date(&input.date_to)?,
            start_min: input.start_min,
            end_min: input.end_min,
            version: 0,
        };
        save(self.store(), &mut exception).await?;

        Ok(exception)
    }

    /// Expands the league's rules over a window and persists the result.
    /// Windows that collide with existing bookings are reported as skipped
    /// rather than failing the whole run.
    pub async fn expand_and_apply(
        &self,
        ctx: &RoleContext,
        input: ExpandInput,
    ) -> Result<ExpansionOutcome, ExpandApplyError> {
        ctx.require_admin()?;

        let window = engine::DateWindow {
            from: parse_date(&input.from)?,
            to: parse_date(&input.to)?,
        };
        if window.from > window.to {
            return Err(RuleValidationError::InvertedDates.into());
        }

        let Some(league) =
            fetch::<League>(self.store(), &ctx.league_id, &ctx.league_id).await?
        else {
            return Err(ExpandApplyError::LeagueNotFound);
        };

        let blackouts: Vec<engine::Blackout> = league
            .season_config
            .blackouts
            .iter()
            .map(|blackout| engine::Blackout {
                start_date: blackout.start_date,
                end_date: blackout.end_date,
                label: blackout.label.clone(),
            })
            .collect();

        let rules: Vec<AvailabilityRule> = list(self.store(), &ctx.league_id)
            .await?
            .into_iter()
            .filter(|rule: &AvailabilityRule| {
                input
                    .division
                    .as_ref()
                    .is_none_or(|division| &rule.division == division)
            })
            .collect();
        let engine_rules = rules
            .iter()
            .map(to_engine_rule)
            .collect::<Result<Vec<_>, _>>()?;

        let exceptions: Vec<RuleException> = list(self.store(), &ctx.league_id).await?;
        let engine_exceptions = exceptions
            .iter()
            .map(|exception| {
                Ok(engine::RuleException {
                    rule_id: exception.rule_id.clone(),
                    date_from: exception.date_from,
                    date_to: exception.date_to,
                    window: TimeRange::new(exception.start_min, exception.end_min).map_err(
                        |error| ExpandApplyError::CorruptRule {
                            rule_id: exception.rule_id.clone(),
                            reason: error.to_string(),
                        },
                    )?,
                })
            })
            .collect::<Result<Vec<_>, ExpandApplyError>>()?;

        let expanded = engine::expand(
            &engine_rules,
            &engine_exceptions,
            &blackouts,
            window,
            league.season_config.game_length_minutes,
        )?;

        let mut created = 0;
        let mut skipped = Vec::new();

        for emitted in expanded {
            let slot_id = Uuid::new_v4().to_string();
            let reservation = self
                .reserve_field_time(
                    &ctx.league_id,
                    &emitted.field_key,
                    emitted.game_date,
                    emitted.time,
                    &slot_id,
                )
                .await;

            match reservation {
                Ok(()) => {}
                Err(ReserveError::Conflict { .. }) => {
                    skipped.push(SkippedSlot {
                        field_key: emitted.field_key,
                        game_date: emitted.game_date,
                        start_min: emitted.time.start(),
                        end_min: emitted.time.end(),
                    });
                    continue;
                }
                Err(ReserveError::Retry(RetryError::Store(error))) => return Err(error.into()),
                Err(ReserveError::Retry(RetryError::Exhausted(attempts))) => {
                    return Err(ExpandApplyError::Storage(format!(
                        "field-day summary stayed contended for {attempts} attempts"
                    )));
                }
            }

            let mut slot = Slot {
                slot_id,
                league_id: ctx.league_id.clone(),
                division: emitted.division,
                field_key: emitted.field_key,
                game_date: emitted.game_date,
                start_min: emitted.time.start(),
                end_min: emitted.time.end(),
                game_type: input.game_type,
                offering_team_id: None,
                confirmed_team_id: None,
                home_team_id: None,
                away_team_id: None,
                is_external_offer: false,
                status: SlotStatus::Open,
                version: 0,
            };
            save(self.store(), &mut slot).await?;
            created += 1;
        }

        log::info!(
            "expanded availability for {}: {created} slots created, {} skipped",
            ctx.league_id,
            skipped.len()
        );

        Ok(ExpansionOutcome { created, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::tests::{admin_ctx, coach_ctx, seed_league};

    fn rule_input() -> CreateRuleInput {
        CreateRuleInput {
            division: "10U".into(),
            field_key: "riverside/1".into(),
            starts_on: "2026-04-01".into(),
            ends_on: "2026-04-07".into(),
            days_of_week: vec!["Mon".into(), "Tue".into(), "Wed".into(), "Thu".into(), "Fri".into()],
            start_min: 18 * 60,
            end_min: 20 * 60,
        }
    }

    fn expand_input() -> ExpandInput {
        ExpandInput {
            from: "2026-04-01".into(),
            to: "2026-04-07".into(),
            division: None,
            game_type: GameType::Game,
        }
    }

    #[tokio::test]
    async fn rule_input_is_validated() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        let admin = admin_ctx("league");

        let mut bad_day = rule_input();
        bad_day.days_of_week = vec!["Funday".into()];
        assert!(matches!(
            client.create_rule(&admin, bad_day).await,
            Err(RuleOpError::Validation(RuleValidationError::BadWeekday(_)))
        ));

        let mut inverted = rule_input();
        inverted.ends_on = "2026-03-01".into();
        assert!(matches!(
            client.create_rule(&admin, inverted).await,
            Err(RuleOpError::Validation(RuleValidationError::InvertedDates))
        ));

        assert!(matches!(
            client
                .create_rule(&coach_ctx("league", "10U", "tigers"), rule_input())
                .await,
            Err(RuleOpError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn expansion_materializes_slots_and_reruns_skip_them() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        let admin = admin_ctx("league");

        client.create_rule(&admin, rule_input()).await.unwrap();

        let first = client
            .expand_and_apply(&admin, expand_input())
            .await
            .unwrap();
        // Five weekdays in the window, two one-hour slots per evening.
        assert_eq!(first.created, 10);
        assert!(first.skipped.is_empty());

        let slots = client
            .list_slots("league", &Default::default())
            .await
            .unwrap();
        assert_eq!(slots.len(), 10);
        assert!(slots.iter().all(|slot| slot.status == SlotStatus::Open));

        let rerun = client
            .expand_and_apply(&admin, expand_input())
            .await
            .unwrap();
        assert_eq!(rerun.created, 0);
        assert_eq!(rerun.skipped.len(), 10);
    }

    #[tokio::test]
    async fn exceptions_carve_time_out_of_the_expansion() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        let admin = admin_ctx("league");

        let rule = client.create_rule(&admin, rule_input()).await.unwrap();
        client
            .add_exception(
                &admin,
                &rule.rule_id,
                CreateExceptionInput {
                    date_from: "2026-04-06".into(),
                    date_to: "2026-04-06".into(),
                    start_min: 18 * 60,
                    end_min: 19 * 60,
                },
            )
            .await
            .unwrap();

        let outcome = client
            .expand_and_apply(&admin, expand_input())
            .await
            .unwrap();
        // One of the Monday slots is carved away by the exception.
        assert_eq!(outcome.created, 9);

        let monday: Vec<_> = client
            .list_slots("league", &Default::default())
            .await
            .unwrap()
            .into_iter()
            .filter(|slot| slot.game_date == NaiveDate::from_ymd_opt(2026, 4, 6).unwrap())
            .collect();
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[0].start_min, 19 * 60);
    }

    #[tokio::test]
    async fn deleting_a_rule_sweeps_its_exceptions() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        let admin = admin_ctx("league");

        let rule = client.create_rule(&admin, rule_input()).await.unwrap();
        client
            .add_exception(
                &admin,
                &rule.rule_id,
                CreateExceptionInput {
                    date_from: "2026-04-06".into(),
                    date_to: "2026-04-06".into(),
                    start_min: 18 * 60,
                    end_min: 19 * 60,
                },
            )
            .await
            .unwrap();

        client.delete_rule(&admin, &rule.rule_id).await.unwrap();
        assert!(client.list_rules("league").await.unwrap().is_empty());

        let exceptions: Vec<RuleException> =
            crate::store::list(client.store(), "league").await.unwrap();
        assert!(exceptions.is_empty());

        assert!(matches!(
            client.delete_rule(&admin, &rule.rule_id).await,
            Err(RuleOpError::NotFound(_))
        ));
    }
}
