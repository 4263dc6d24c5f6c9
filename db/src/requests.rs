//! The request workflow and the authoritative slot state machine.
//!
//! At most one request per slot is ever Approved. That guarantee hangs on
//! the slot-row CAS in [`Client::approve_request`], not on any lock around
//! the requests themselves: whichever reviewer's write lands first confirms
//! the slot, and everyone else observes the confirmed team on re-read.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::{GameType, Request, RequestStatus, Role, Slot, SlotStatus};
use crate::errors::{AccessError, CreateRequestError, ReviewRequestError};
use crate::retry::{with_optimistic_retry, RetryError, CAS_ATTEMPTS};
use crate::roles::RoleContext;
use crate::store::{fetch, list, save, save_if_current};
use crate::Client;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestInput {
    pub slot_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Client {
    /// A coach bids for another team's slot. The slot advances Open ->
    /// Pending on the first request and stays Pending for later ones.
    pub async fn create_request(
        &self,
        ctx: &RoleContext,
        input: CreateRequestInput,
        expected: GameType,
    ) -> Result<Request, CreateRequestError> {
        let coach = ctx.coach()?.clone();

        let Some(slot) = fetch::<Slot>(self.store(), &ctx.league_id, &input.slot_id).await? else {
            return Err(CreateRequestError::SlotNotFound(input.slot_id));
        };

        if slot.game_type != expected {
            return Err(CreateRequestError::WrongGameType { expected });
        }

        match slot.status {
            SlotStatus::Open | SlotStatus::Pending => {}
            status => return Err(CreateRequestError::SlotUnavailable { status }),
        }

        if slot.offering_team_id.as_deref() == Some(coach.team_id.as_str()) {
            return Err(CreateRequestError::OwnSlot);
        }

        if slot.division != coach.division {
            return Err(CreateRequestError::WrongDivision {
                division: slot.division,
            });
        }

        let duplicate = list::<Request>(self.store(), &ctx.league_id)
            .await?
            .into_iter()
            .any(|request| {
                request.slot_id == input.slot_id
                    && request.requesting_team_id == coach.team_id
                    && request.status == RequestStatus::Pending
            });
        if duplicate {
            return Err(CreateRequestError::DuplicatePending);
        }

        if slot.status == SlotStatus::Open {
            let store = self.store();
            let league_id = ctx.league_id.as_str();
            let slot_id = input.slot_id.as_str();

            with_optimistic_retry(CAS_ATTEMPTS, move || {
                Box::pin(async move {
                    let Some(mut current) = fetch::<Slot>(store, league_id, slot_id).await? else {
                        return Ok(());
                    };

                    if current.status == SlotStatus::Open {
                        current.status = SlotStatus::Pending;
                        save_if_current(store, &mut current).await?;
                    }
                    Ok(())
                })
            })
            .await?;
        }

        let mut request = Request {
            request_id: Uuid::new_v4().to_string(),
            league_id: ctx.league_id.clone(),
            slot_id: input.slot_id,
            requesting_team_id: coach.team_id,
            requested_by: ctx.user_id.clone(),
            reason: input.reason,
            status: RequestStatus::Pending,
            created_utc: Utc::now(),
            reviewed_by: None,
            reviewed_utc: None,
            version: 0,
        };
        save(self.store(), &mut request).await?;

        Ok(request)
    }

    pub async fn list_requests(
        &self,
        ctx: &RoleContext,
        slot_id: Option<&str>,
    ) -> Result<Vec<Request>, ReviewRequestError> {
        let team_filter = if ctx.is_admin() {
            None
        } else {
            Some(ctx.coach()?.team_id.clone())
        };

        let mut requests: Vec<Request> = list(self.store(), &ctx.league_id)
            .await?
            .into_iter()
            .filter(|request: &Request| {
                slot_id.is_none_or(|slot_id| request.slot_id == slot_id)
                    && team_filter
                        .as_ref()
                        .is_none_or(|team_id| &request.requesting_team_id == team_id)
            })
            .collect();

        requests.sort_by(|a, b| {
            (a.created_utc, a.request_id.as_str()).cmp(&(b.created_utc, b.request_id.as_str()))
        });

        Ok(requests)
    }

    /// Admin review: confirm the slot for the requesting team.
    ///
    /// The slot write is a CAS at the version the reviewer read; losing it
    /// five times surfaces the conflict, and losing it to another approval
    /// reports which team now holds the slot. The follow-up request-status
    /// writes are idempotent, so a cancelled call is safe to repeat.
    pub async fn approve_request(
        &self,
        ctx: &RoleContext,
        request_id: &str,
        expected: GameType,
    ) -> Result<Request, ReviewRequestError> {
        let mut request = self.reviewable(ctx, request_id, expected).await?;

        match request.status {
            RequestStatus::Pending => {}
            RequestStatus::Approved => return Ok(request),
            status => return Err(self.terminal_review_error(ctx, &request, status).await),
        }

        let store = self.store();
        let league_id = ctx.league_id.as_str();
        let slot_id = request.slot_id.as_str();
        let team_id = request.requesting_team_id.as_str();

        let confirmed = with_optimistic_retry(CAS_ATTEMPTS, move || {
            Box::pin(async move {
                let Some(mut current) = fetch::<Slot>(store, league_id, slot_id).await? else {
                    return Ok(Err(ReviewRequestError::SlotCancelled));
                };

                match current.status {
                    SlotStatus::Open | SlotStatus::Pending => {
                        current.status = SlotStatus::Confirmed;
                        current.confirmed_team_id = Some(team_id.to_string());
                        save_if_current(store, &mut current).await?;
                        Ok(Ok(()))
                    }
                    SlotStatus::Confirmed => {
                        if current.confirmed_team_id.as_deref() == Some(team_id) {
                            Ok(Ok(()))
                        } else {
                            Ok(Err(ReviewRequestError::AlreadyConfirmed {
                                team_id: current.confirmed_team_id.unwrap_or_default(),
                            }))
                        }
                    }
                    SlotStatus::Cancelled => Ok(Err(ReviewRequestError::SlotCancelled)),
                }
            })
        })
        .await?;
        confirmed?;

        request.status = RequestStatus::Approved;
        request.reviewed_by = Some(ctx.user_id.clone());
        request.reviewed_utc = Some(Utc::now());
        save(self.store(), &mut request).await?;

        let losers: Vec<Request> = list(self.store(), &ctx.league_id)
            .await?
            .into_iter()
            .filter(|other: &Request| {
                other.slot_id == request.slot_id
                    && other.request_id != request.request_id
                    && other.status == RequestStatus::Pending
            })
            .collect();
        for mut loser in losers {
            loser.status = RequestStatus::Superseded;
            save(self.store(), &mut loser).await?;
        }

        Ok(request)
    }

    /// Admin review: decline the request. The slot falls back to Open when
    /// nothing else is pending against it.
    pub async fn reject_request(
        &self,
        ctx: &RoleContext,
        request_id: &str,
        expected: GameType,
    ) -> Result<Request, ReviewRequestError> {
        let mut request = self.reviewable(ctx, request_id, expected).await?;

        match request.status {
            RequestStatus::Pending => {}
            RequestStatus::Rejected => return Ok(request),
            status => return Err(self.terminal_review_error(ctx, &request, status).await),
        }

        request.status = RequestStatus::Rejected;
        request.reviewed_by = Some(ctx.user_id.clone());
        request.reviewed_utc = Some(Utc::now());
        save(self.store(), &mut request).await?;

        self.settle_slot_after_review(&ctx.league_id, &request.slot_id)
            .await?;

        Ok(request)
    }

    /// The requesting coach retracts their own pending bid.
    pub async fn withdraw_request(
        &self,
        ctx: &RoleContext,
        request_id: &str,
    ) -> Result<Request, ReviewRequestError> {
        let Some(mut request) = fetch::<Request>(self.store(), &ctx.league_id, request_id).await?
        else {
            return Err(ReviewRequestError::NotFound(request_id.to_string()));
        };

        if !ctx.is_admin() {
            let coach = ctx.coach()?;
            if coach.team_id != request.requesting_team_id {
                return Err(AccessError::WrongTeam {
                    team_id: request.requesting_team_id.clone(),
                }
                .into());
            }
        }

        match request.status {
            RequestStatus::Pending => {}
            RequestStatus::Withdrawn => return Ok(request),
            status => return Err(ReviewRequestError::NotPending { status }),
        }

        request.status = RequestStatus::Withdrawn;
        save(self.store(), &mut request).await?;

        self.settle_slot_after_review(&ctx.league_id, &request.slot_id)
            .await?;

        Ok(request)
    }

    /// Common review gates: the request exists, the endpoint's game type
    /// matches the slot, and the caller may review it. A caller whose role
    /// in this league is Coach is turned away from practice reviews before
    /// the admin check, even if they administer other leagues.
    async fn reviewable(
        &self,
        ctx: &RoleContext,
        request_id: &str,
        expected: GameType,
    ) -> Result<Request, ReviewRequestError> {
        let Some(request) = fetch::<Request>(self.store(), &ctx.league_id, request_id).await?
        else {
            return Err(ReviewRequestError::NotFound(request_id.to_string()));
        };

        let slot = fetch::<Slot>(self.store(), &ctx.league_id, &request.slot_id).await?;
        if let Some(slot) = slot {
            if slot.game_type != expected {
                return Err(ReviewRequestError::WrongGameType { expected });
            }
        }

        if expected == GameType::Practice && ctx.role == Role::Coach {
            return Err(AccessError::CoachPracticeReview.into());
        }
        ctx.require_admin()?;

        Ok(request)
    }

    /// Distinguishes "your request lost" from "this request is simply not
    /// pending" for a nicer error.
    async fn terminal_review_error(
        &self,
        ctx: &RoleContext,
        request: &Request,
        status: RequestStatus,
    ) -> ReviewRequestError {
        if let Ok(Some(slot)) =
            fetch::<Slot>(self.store(), &ctx.league_id, &request.slot_id).await
        {
            if slot.status == SlotStatus::Confirmed
                && slot.confirmed_team_id.as_deref() != Some(request.requesting_team_id.as_str())
            {
                return ReviewRequestError::AlreadyConfirmed {
                    team_id: slot.confirmed_team_id.unwrap_or_default(),
                };
            }
        }

        ReviewRequestError::NotPending { status }
    }

    async fn settle_slot_after_review(
        &self,
        league_id: &str,
        slot_id: &str,
    ) -> Result<(), RetryError> {
        let still_pending = list::<Request>(self.store(), league_id)
            .await
            .map_err(RetryError::Store)?
            .into_iter()
            .any(|request| {
                request.slot_id == slot_id && request.status == RequestStatus::Pending
            });
        if still_pending {
            return Ok(());
        }

        let store = self.store();
        with_optimistic_retry(CAS_ATTEMPTS, move || {
            Box::pin(async move {
                let Some(mut slot) = fetch::<Slot>(store, league_id, slot_id).await? else {
                    return Ok(());
                };

                if slot.status == SlotStatus::Pending {
                    slot.status = SlotStatus::Open;
                    save_if_current(store, &mut slot).await?;
                }
                Ok(())
            })
        })
        .await
    }
}
