//! Slot persistence and the per-(field, date) overlap guard.
//!
//! The guard is evaluated inside the same write path as the slot upsert:
//! racing inserters serialize through the [`FieldDay`] summary row's
//! version counter, and a loser whose range turns out to overlap receives
//! a conflict instead of another retry.

use backend::{Minutes, TimeRange};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::{
    FieldDay, GameType, League, Request, RequestStatus, Slot, SlotStatus,
};
use crate::errors::{
    AccessError, CancelSlotError, CreateSlotError, SlotValidationError, UpdateSlotError,
};
use crate::retry::{with_optimistic_retry, RetryError, CAS_ATTEMPTS};
use crate::roles::RoleContext;
use crate::store::{fetch, list, save, save_if_current};
use crate::{Client, Validator};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotInput {
    pub division: String,
    pub field_key: String,
    pub game_date: String,
    pub start_min: Minutes,
    pub end_min: Minutes,
    #[serde(default)]
    pub game_type: GameType,
    #[serde(default)]
    pub offering_team_id: Option<String>,
}

impl Validator for CreateSlotInput {
    type Error = SlotValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.division.trim().is_empty() {
            return Err(SlotValidationError::EmptyDivision);
        }
        if self.field_key.trim().is_empty() {
            return Err(SlotValidationError::EmptyFieldKey);
        }
        parse_game_date(&self.game_date)?;
        TimeRange::new(self.start_min, self.end_min)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSlotInput {
    #[serde(default)]
    pub game_date: Option<String>,
    #[serde(default)]
    pub start_min: Option<Minutes>,
    #[serde(default)]
    pub end_min: Option<Minutes>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSlotsQuery {
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub status: Option<SlotStatus>,
}

fn parse_game_date(raw: &str) -> Result<NaiveDate, SlotValidationError> {
    raw.parse()
        .map_err(|_| SlotValidationError::BadDate(raw.to_string()))
}

/// Outcome of trying to book field time behind the summary-row CAS.
pub(crate) enum ReserveError {
    Conflict { start: Minutes, end: Minutes },
    Retry(RetryError),
}

impl Client {
    pub(crate) async fn reserve_field_time(
        &self,
        league_id: &str,
        field_key: &str,
        game_date: NaiveDate,
        time: TimeRange,
        slot_id: &str,
    ) -> Result<(), ReserveError> {
        let store = self.store();
        let row_key = FieldDay::row_key_for(field_key, game_date);
        let row_key = row_key.as_str();

        let outcome = with_optimistic_retry(CAS_ATTEMPTS, move || {
            Box::pin(async move {
                let mut day = fetch::<FieldDay>(store, league_id, row_key)
                    .await?
                    .unwrap_or_else(|| FieldDay::new(league_id, field_key, game_date));

                if let Some(booked) = day.conflict(time, Some(slot_id)) {
                    return Ok(Err((booked.start_min, booked.end_min)));
                }

                day.book(time, slot_id);
                save_if_current(store, &mut day).await?;
                Ok(Ok(()))
            })
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err((start, end))) => Err(ReserveError::Conflict { start, end }),
            Err(error) => Err(ReserveError::Retry(error)),
        }
    }

    pub(crate) async fn release_field_time(
        &self,
        league_id: &str,
        field_key: &str,
        game_date: NaiveDate,
        slot_id: &str,
    ) -> Result<(), RetryError> {
        let store = self.store();
        let row_key = FieldDay::row_key_for(field_key, game_date);
        let row_key = row_key.as_str();

        with_optimistic_retry(CAS_ATTEMPTS, move || {
            Box::pin(async move {
                let Some(mut day) = fetch::<FieldDay>(store, league_id, row_key).await? else {
                    return Ok(());
                };

                day.release(slot_id);
                save_if_current(store, &mut day).await
            })
        })
        .await
    }

    /// Creates a slot: a coach offer (for their own team) or an admin
    /// inventory slot. The field time is reserved before the slot row is
    /// written, so two racing creates can never both hold the same window.
    pub async fn create_slot(
        &self,
        ctx: &RoleContext,
        input: CreateSlotInput,
    ) -> Result<Slot, CreateSlotError> {
        input.validate()?;
        let game_date = parse_game_date(&input.game_date)?;
        let time = TimeRange::new(input.start_min, input.end_min)
            .map_err(SlotValidationError::from)?;

        match &input.offering_team_id {
            Some(team_id) => ctx.require_coach_for(&input.division, team_id)?,
            None => ctx.require_admin()?,
        }

        let league: Option<League> = fetch(self.store(), &ctx.league_id, &ctx.league_id).await?;
        if league.is_none() {
            return Err(CreateSlotError::LeagueNotFound);
        }

        let slot_id = Uuid::new_v4().to_string();
        self.reserve_field_time(&ctx.league_id, &input.field_key, game_date, time, &slot_id)
            .await
            .map_err(|error| match error {
                ReserveError::Conflict { start, end } => CreateSlotError::Overlap { start, end },
                ReserveError::Retry(error) => error.into(),
            })?;

        let mut slot = Slot {
            slot_id,
            league_id: ctx.league_id.clone(),
            division: input.division,
            field_key: input.field_key,
            game_date,
            start_min: time.start(),
            end_min: time.end(),
            game_type: input.game_type,
            offering_team_id: input.offering_team_id,
            confirmed_team_id: None,
            home_team_id: None,
            away_team_id: None,
            is_external_offer: false,
            status: SlotStatus::Open,
            version: 0,
        };
        save(self.store(), &mut slot).await?;

        log::debug!(
            "created slot {} on {}/{} {}",
            slot.slot_id,
            slot.field_key,
            slot.game_date,
            time
        );

        Ok(slot)
    }

    pub async fn get_slot(
        &self,
        league_id: &str,
        slot_id: &str,
    ) -> Result<Option<Slot>, crate::store::StoreError> {
        fetch(self.store(), league_id, slot_id).await
    }

    pub async fn list_slots(
        &self,
        league_id: &str,
        query: &ListSlotsQuery,
    ) -> Result<Vec<Slot>, crate::store::StoreError> {
        let mut slots: Vec<Slot> = list(self.store(), league_id)
            .await?
            .into_iter()
            .filter(|slot: &Slot| {
                query
                    .division
                    .as_ref()
                    .is_none_or(|division| &slot.division == division)
                    && query.status.is_none_or(|status| slot.status == status)
            })
            .collect();

        slots.sort_by(|a, b| {
            (a.game_date, a.field_key.as_str(), a.start_min, a.slot_id.as_str()).cmp(&(
                b.game_date,
                b.field_key.as_str(),
                b.start_min,
                b.slot_id.as_str(),
            ))
        });

        Ok(slots)
    }

    /// Moves or resizes a slot. Admins may edit any non-cancelled slot;
    /// the offering coach only before it is confirmed.
    pub async fn update_slot(
        &self,
        ctx: &RoleContext,
        slot_id: &str,
        input: UpdateSlotInput,
    ) -> Result<Slot, UpdateSlotError> {
        let Some(slot) = fetch::<Slot>(self.store(), &ctx.league_id, slot_id).await? else {
            return Err(UpdateSlotError::NotFound(slot_id.to_string()));
        };

        if slot.is_terminal() {
            return Err(UpdateSlotError::Cancelled);
        }

        if !ctx.is_admin() {
            let Some(team_id) = slot.offering_team_id.as_deref() else {
                return Err(AccessError::AdminRequired.into());
            };
            ctx.require_coach_for(&slot.division, team_id)?;

            if slot.status == SlotStatus::Confirmed {
                return Err(UpdateSlotError::ConfirmedLocked);
            }
        }

        let new_date = match &input.game_date {
            Some(raw) => parse_game_date(raw)?,
            None => slot.game_date,
        };
        let new_time = TimeRange::new(
            input.start_min.unwrap_or(slot.start_min),
            input.end_min.unwrap_or(slot.end_min),
        )
        .map_err(SlotValidationError::from)?;

        let moved = new_date != slot.game_date;
        let resized = new_time.start() != slot.start_min || new_time.end() != slot.end_min;

        if moved || resized {
            self.reserve_field_time(&ctx.league_id, &slot.field_key, new_date, new_time, slot_id)
                .await
                .map_err(|error| match error {
                    ReserveError::Conflict { start, end } => UpdateSlotError::Overlap { start, end },
                    ReserveError::Retry(error) => error.into(),
                })?;
        }

        let store = self.store();
        let league_id = ctx.league_id.as_str();
        let updated = with_optimistic_retry(CAS_ATTEMPTS, move || {
            Box::pin(async move {
                let Some(mut current) = fetch::<Slot>(store, league_id, slot_id).await? else {
                    return Ok(None);
                };

                if current.is_terminal() {
                    return Ok(Some(Err(UpdateSlotError::Cancelled)));
                }

                current.game_date = new_date;
                current.start_min = new_time.start();
                current.end_min = new_time.end();
                save_if_current(store, &mut current).await?;
                Ok(Some(Ok(current)))
            })
        })
        .await;

        let updated = match updated {
            Ok(Some(Ok(updated))) => updated,
            Ok(Some(Err(error))) => {
                // Undo the reservation we took above; the slot itself is
                // unchanged.
                if moved || resized {
                    self.restore_reservation(&slot, new_date, moved).await;
                }
                return Err(error);
            }
            Ok(None) => return Err(UpdateSlotError::NotFound(slot_id.to_string())),
            Err(error) => {
                if moved || resized {
                    self.restore_reservation(&slot, new_date, moved).await;
                }
                return Err(error.into());
            }
        };

        if moved {
            // The old day's range is stale now that the slot lives elsewhere.
            if let Err(error) = self
                .release_field_time(&ctx.league_id, &slot.field_key, slot.game_date, slot_id)
                .await
            {
                log::warn!(
                    "slot {slot_id} moved but its old field-day entry lingers: {error}"
                );
            }
        }

        Ok(updated)
    }

    async fn restore_reservation(&self, slot: &Slot, new_date: NaiveDate, moved: bool) {
        if moved {
            // Drop the tentative range on the day the slot was headed to;
            // the old day's entry was never touched.
            if let Err(error) = self
                .release_field_time(&slot.league_id, &slot.field_key, new_date, &slot.slot_id)
                .await
            {
                log::warn!("could not roll back reservation: {error}");
            }
            return;
        }

        // Same day: re-book the original window over the tentative one.
        if let Ok(original) = TimeRange::new(slot.start_min, slot.end_min) {
            let _ = self
                .reserve_field_time(
                    &slot.league_id,
                    &slot.field_key,
                    slot.game_date,
                    original,
                    &slot.slot_id,
                )
                .await;
        }
    }

    /// Cancels a slot. Terminal: the field time is released and every
    /// pending request against it is superseded. Cancelling twice is a
    /// no-op.
    pub async fn cancel_slot(
        &self,
        ctx: &RoleContext,
        slot_id: &str,
    ) -> Result<Slot, CancelSlotError> {
        let Some(slot) = fetch::<Slot>(self.store(), &ctx.league_id, slot_id).await? else {
            return Err(CancelSlotError::NotFound(slot_id.to_string()));
        };

        if slot.is_terminal() {
            return Ok(slot);
        }

        if !ctx.is_admin() {
            let Some(team_id) = slot.offering_team_id.as_deref() else {
                return Err(AccessError::AdminRequired.into());
            };
            ctx.require_coach_for(&slot.division, team_id)?;

            // Once confirmed, only an admin may take the slot away.
            if slot.status == SlotStatus::Confirmed {
                return Err(AccessError::AdminRequired.into());
            }
        }

        let store = self.store();
        let league_id = ctx.league_id.as_str();
        let cancelled = with_optimistic_retry(CAS_ATTEMPTS, move || {
            Box::pin(async move {
                let Some(mut current) = fetch::<Slot>(store, league_id, slot_id).await? else {
                    return Ok(None);
                };

                if !current.is_terminal() {
                    current.status = SlotStatus::Cancelled;
                    save_if_current(store, &mut current).await?;
                }
                Ok(Some(current))
            })
        })
        .await?;

        let Some(cancelled) = cancelled else {
            return Err(CancelSlotError::NotFound(slot_id.to_string()));
        };

        if let Err(error) = self
            .release_field_time(
                &ctx.league_id,
                &cancelled.field_key,
                cancelled.game_date,
                slot_id,
            )
            .await
        {
            log::warn!("cancelled slot {slot_id} but its field-day entry lingers: {error}");
        }

        let pending: Vec<Request> = list(self.store(), &ctx.league_id)
            .await?
            .into_iter()
            .filter(|request: &Request| {
                request.slot_id == slot_id && request.status == RequestStatus::Pending
            })
            .collect();
        for mut request in pending {
            request.status = RequestStatus::Superseded;
            save(self.store(), &mut request).await?;
        }

        Ok(cancelled)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::{Role, SeasonConfig};
    use crate::roles::CoachAssignment;
    use chrono::NaiveDate;

    pub(crate) async fn seed_league(client: &Client, league_id: &str) {
        let mut league = League {
            league_id: league_id.into(),
            name: "Rivertown Youth".into(),
            timezone: "America/Chicago".into(),
            status: Default::default(),
            season_config: SeasonConfig {
                spring_start: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                spring_end: NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
                fall_start: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                fall_end: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
                game_length_minutes: 60,
                blackouts: vec![],
            },
            version: 0,
        };
        save(client.store(), &mut league).await.unwrap();
    }

    pub(crate) fn admin_ctx(league_id: &str) -> RoleContext {
        RoleContext {
            user_id: "admin".into(),
            email: "admin@example.com".into(),
            league_id: league_id.into(),
            role: Role::LeagueAdmin,
            coach: None,
        }
    }

    pub(crate) fn coach_ctx(league_id: &str, division: &str, team_id: &str) -> RoleContext {
        RoleContext {
            user_id: format!("coach-{team_id}"),
            email: format!("{team_id}@example.com"),
            league_id: league_id.into(),
            role: Role::Coach,
            coach: Some(CoachAssignment {
                division: division.into(),
                team_id: team_id.into(),
            }),
        }
    }

    pub(crate) fn slot_input(start_min: Minutes, end_min: Minutes) -> CreateSlotInput {
        CreateSlotInput {
            division: "10U".into(),
            field_key: "riverside/1".into(),
            game_date: "2026-04-11".into(),
            start_min,
            end_min,
            game_type: GameType::Game,
            offering_team_id: None,
        }
    }

    #[tokio::test]
    async fn overlapping_insert_is_rejected_touching_is_not() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        let admin = admin_ctx("league");

        client
            .create_slot(&admin, slot_input(18 * 60, 19 * 60))
            .await
            .unwrap();

        let overlap = client
            .create_slot(&admin, slot_input(18 * 60 + 30, 19 * 60 + 30))
            .await;
        assert!(matches!(
            overlap,
            Err(CreateSlotError::Overlap { start, end }) if start == 18 * 60 && end == 19 * 60
        ));

        client
            .create_slot(&admin, slot_input(19 * 60, 20 * 60))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn inverted_ranges_never_reach_the_store() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;

        let inverted = client
            .create_slot(&admin_ctx("league"), slot_input(19 * 60, 18 * 60))
            .await;
        assert!(matches!(inverted, Err(CreateSlotError::Validation(_))));

        let empty = client
            .create_slot(&admin_ctx("league"), slot_input(18 * 60, 18 * 60))
            .await;
        assert!(matches!(empty, Err(CreateSlotError::Validation(_))));
    }

    #[tokio::test]
    async fn coaches_offer_only_for_their_own_team() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;

        let mut offer = slot_input(18 * 60, 19 * 60);
        offer.offering_team_id = Some("tigers".into());
        let slot = client
            .create_slot(&coach_ctx("league", "10U", "tigers"), offer.clone())
            .await
            .unwrap();
        assert_eq!(slot.offering_team_id.as_deref(), Some("tigers"));

        offer.start_min = 19 * 60;
        offer.end_min = 20 * 60;
        offer.offering_team_id = Some("hawks".into());
        let wrong_team = client
            .create_slot(&coach_ctx("league", "10U", "tigers"), offer)
            .await;
        assert!(matches!(wrong_team, Err(CreateSlotError::Forbidden(_))));

        let not_admin = client
            .create_slot(
                &coach_ctx("league", "10U", "tigers"),
                slot_input(20 * 60, 21 * 60),
            )
            .await;
        assert!(matches!(not_admin, Err(CreateSlotError::Forbidden(_))));
    }

    #[tokio::test]
    async fn racing_creates_on_one_field_day_admit_exactly_one_winner() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        let admin = admin_ctx("league");

        let (first, second) = tokio::join!(
            client.create_slot(&admin, slot_input(18 * 60, 19 * 60)),
            client.create_slot(&admin, slot_input(18 * 60 + 30, 19 * 60 + 30)),
        );

        let winners = [first.is_ok(), second.is_ok()];
        assert_eq!(winners.iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(
            [first, second].into_iter().find(Result::is_err),
            Some(Err(CreateSlotError::Overlap { .. }))
        ));
    }

    #[tokio::test]
    async fn cancelling_frees_the_field_time() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        let admin = admin_ctx("league");

        let slot = client
            .create_slot(&admin, slot_input(18 * 60, 19 * 60))
            .await
            .unwrap();
        let cancelled = client.cancel_slot(&admin, &slot.slot_id).await.unwrap();
        assert_eq!(cancelled.status, SlotStatus::Cancelled);

        // Same window books again, and double-cancel stays a no-op.
        client
            .create_slot(&admin, slot_input(18 * 60, 19 * 60))
            .await
            .unwrap();
        let again = client.cancel_slot(&admin, &slot.slot_id).await.unwrap();
        assert_eq!(again.status, SlotStatus::Cancelled);
    }

    #[tokio::test]
    async fn update_moves_the_slot_and_its_reservation() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        let admin = admin_ctx("league");

        let slot = client
            .create_slot(&admin, slot_input(18 * 60, 19 * 60))
            .await
            .unwrap();

        let updated = client
            .update_slot(
                &admin,
                &slot.slot_id,
                UpdateSlotInput {
                    game_date: Some("2026-04-12".into()),
                    start_min: Some(9 * 60),
                    end_min: Some(10 * 60),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.game_date, NaiveDate::from_ymd_opt(2026, 4, 12).unwrap());
        assert_eq!(updated.start_min, 9 * 60);

        // The original window is free again.
        client
            .create_slot(&admin, slot_input(18 * 60, 19 * 60))
            .await
            .unwrap();

        // And the new window is actually held.
        let mut conflicting = slot_input(9 * 60 + 30, 10 * 60 + 30);
        conflicting.game_date = "2026-04-12".into();
        let conflict = client.create_slot(&admin, conflicting).await;
        assert!(matches!(conflict, Err(CreateSlotError::Overlap { .. })));
    }

    #[tokio::test]
    async fn resizing_within_the_day_checks_other_bookings_not_itself() {
        let client = Client::in_memory();
        seed_league(&client, "league").await;
        let admin = admin_ctx("league");

        let slot = client
            .create_slot(&admin, slot_input(18 * 60, 19 * 60))
            .await
            .unwrap();
        client
            .create_slot(&admin, slot_input(20 * 60, 21 * 60))
            .await
            .unwrap();

        // Growing into its own window is fine.
        client
            .update_slot(
                &admin,
                &slot.slot_id,
                UpdateSlotInput {
                    end_min: Some(19 * 60 + 30),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Growing into the neighbour is not.
        let conflict = client
            .update_slot(
                &admin,
                &slot.slot_id,
                UpdateSlotInput {
                    end_min: Some(20 * 60 + 30),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(conflict, Err(UpdateSlotError::Overlap { .. })));
    }
}
