use backend::{Minutes, TimeRangeError};
use thiserror::Error;

use crate::entities::{GameType, RequestStatus, SlotStatus};
use crate::retry::RetryError;
use crate::store::StoreError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("caller has no membership in this league")]
    NotAMember,
    #[error("league administrator role required")]
    AdminRequired,
    #[error("a coach membership with a team assignment is required")]
    CoachRequired,
    #[error("coach membership for team {team_id} required")]
    WrongTeam { team_id: String },
    #[error("coach accounts may not review practice requests in their own league")]
    CoachPracticeReview,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotValidationError {
    #[error("could not parse date `{0}`; expected YYYY-MM-DD")]
    BadDate(String),
    #[error(transparent)]
    BadTimeRange(#[from] TimeRangeError),
    #[error("division cannot be empty")]
    EmptyDivision,
    #[error("field key cannot be empty")]
    EmptyFieldKey,
}

#[derive(Debug, Error)]
pub enum CreateSlotError {
    #[error("bad input")]
    Validation(#[from] SlotValidationError),
    #[error(transparent)]
    Forbidden(#[from] AccessError),
    #[error("league not found")]
    LeagueNotFound,
    #[error("this time slot is booked from {start} to {end}")]
    Overlap { start: Minutes, end: Minutes },
    #[error("the field-day summary stayed contended for {0} attempts")]
    RetryExhausted(u32),
    #[error("table store operation failed: `{0}`")]
    Storage(String),
}

impl From<StoreError> for CreateSlotError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<RetryError> for CreateSlotError {
    fn from(error: RetryError) -> Self {
        match error {
            RetryError::Exhausted(attempts) => Self::RetryExhausted(attempts),
            RetryError::Store(error) => error.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum UpdateSlotError {
    #[error("bad input")]
    Validation(#[from] SlotValidationError),
    #[error(transparent)]
    Forbidden(#[from] AccessError),
    #[error("slot {0} not found")]
    NotFound(String),
    #[error("a cancelled slot cannot be edited")]
    Cancelled,
    #[error("a confirmed slot can only be edited by an admin")]
    ConfirmedLocked,
    #[error("this time slot is booked from {start} to {end}")]
    Overlap { start: Minutes, end: Minutes },
    #[error("the slot stayed contended for {0} attempts")]
    RetryExhausted(u32),
    #[error("table store operation failed: `{0}`")]
    Storage(String),
}

impl From<StoreError> for UpdateSlotError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<RetryError> for UpdateSlotError {
    fn from(error: RetryError) -> Self {
        match error {
            RetryError::Exhausted(attempts) => Self::RetryExhausted(attempts),
            RetryError::Store(error) => error.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CancelSlotError {
    #[error(transparent)]
    Forbidden(#[from] AccessError),
    #[error("slot {0} not found")]
    NotFound(String),
    #[error("the slot stayed contended for {0} attempts")]
    RetryExhausted(u32),
    #[error("table store operation failed: `{0}`")]
    Storage(String),
}

impl From<StoreError> for CancelSlotError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<RetryError> for CancelSlotError {
    fn from(error: RetryError) -> Self {
        match error {
            RetryError::Exhausted(attempts) => Self::RetryExhausted(attempts),
            RetryError::Store(error) => error.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CreateRequestError {
    #[error(transparent)]
    Forbidden(#[from] AccessError),
    #[error("slot {0} not found")]
    SlotNotFound(String),
    #[error("slot is {status:?} and cannot be requested")]
    SlotUnavailable { status: SlotStatus },
    #[error("a team cannot request its own offered slot")]
    OwnSlot,
    #[error("slot belongs to division {division}")]
    WrongDivision { division: String },
    #[error("this team already has a pending request for the slot")]
    DuplicatePending,
    #[error("this endpoint handles {expected:?} slots")]
    WrongGameType { expected: GameType },
    #[error("the slot stayed contended for {0} attempts")]
    RetryExhausted(u32),
    #[error("table store operation failed: `{0}`")]
    Storage(String),
}

impl From<StoreError> for CreateRequestError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<RetryError> for CreateRequestError {
    fn from(error: RetryError) -> Self {
        match error {
            RetryError::Exhausted(attempts) => Self::RetryExhausted(attempts),
            RetryError::Store(error) => error.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReviewRequestError {
    #[error(transparent)]
    Forbidden(#[from] AccessError),
    #[error("request {0} not found")]
    NotFound(String),
    #[error("request is already {status:?}")]
    NotPending { status: RequestStatus },
    #[error("slot is already confirmed for team {team_id}")]
    AlreadyConfirmed { team_id: String },
    #[error("the slot was cancelled")]
    SlotCancelled,
    #[error("this endpoint handles {expected:?} slots")]
    WrongGameType { expected: GameType },
    #[error("the slot stayed contended for {0} attempts")]
    RetryExhausted(u32),
    #[error("table store operation failed: `{0}`")]
    Storage(String),
}

impl From<StoreError> for ReviewRequestError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<RetryError> for ReviewRequestError {
    fn from(error: RetryError) -> Self {
        match error {
            RetryError::Exhausted(attempts) => Self::RetryExhausted(attempts),
            RetryError::Store(error) => error.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RoleResolveError {
    #[error("table store operation failed: `{0}`")]
    Storage(String),
}

impl From<StoreError> for RoleResolveError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleValidationError {
    #[error("could not parse date `{0}`; expected YYYY-MM-DD")]
    BadDate(String),
    #[error("unknown weekday `{0}`")]
    BadWeekday(String),
    #[error(transparent)]
    BadTimeRange(#[from] TimeRangeError),
    #[error("at least one weekday is required")]
    NoWeekdays,
    #[error("rule must start on or before its end date")]
    InvertedDates,
    #[error("division cannot be empty")]
    EmptyDivision,
    #[error("field key cannot be empty")]
    EmptyFieldKey,
}

#[derive(Debug, Error)]
pub enum RuleOpError {
    #[error("bad input")]
    Validation(#[from] RuleValidationError),
    #[error(transparent)]
    Forbidden(#[from] AccessError),
    #[error("rule {0} not found")]
    NotFound(String),
    #[error("table store operation failed: `{0}`")]
    Storage(String),
}

impl From<StoreError> for RuleOpError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExpandApplyError {
    #[error("bad input")]
    Validation(#[from] RuleValidationError),
    #[error(transparent)]
    Forbidden(#[from] AccessError),
    #[error("league not found")]
    LeagueNotFound,
    #[error("bad season configuration: {0}")]
    Config(#[from] backend::availability::ExpandError),
    #[error("stored rule {rule_id} is corrupt: {reason}")]
    CorruptRule { rule_id: String, reason: String },
    #[error("table store operation failed: `{0}`")]
    Storage(String),
}

impl From<StoreError> for ExpandApplyError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ScheduleOpError {
    #[error(transparent)]
    Forbidden(#[from] AccessError),
    #[error("league not found")]
    LeagueNotFound,
    #[error("table store operation failed: `{0}`")]
    Storage(String),
}

impl From<StoreError> for ScheduleOpError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<RetryError> for ScheduleOpError {
    fn from(error: RetryError) -> Self {
        match error {
            // Apply skips slots whose CAS keeps losing rather than failing
            // the whole run, so exhaustion only shows up as storage noise.
            RetryError::Exhausted(attempts) => Self::Storage(format!(
                "slot stayed contended for {attempts} attempts"
            )),
            RetryError::Store(error) => error.into(),
        }
    }
}
