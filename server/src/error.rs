//! Error envelope and the mapping from domain errors to HTTP responses.
//!
//! Every failure leaves the service as
//! `{ "error": { "code", "message", "details"? } }`. The code vocabulary is
//! fixed; handlers never invent status codes ad hoc.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use db::errors::{
    AccessError, CancelSlotError, CreateRequestError, CreateSlotError, ExpandApplyError,
    ReviewRequestError, RoleResolveError, RuleOpError, ScheduleOpError, UpdateSlotError,
};
use db::store::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    BadRequest,
    Forbidden,
    NotFound,
    SlotConflict,
    SlotAlreadyConfirmed,
    ConflictRetryExhausted,
    StorageError,
    Internal,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::SlotConflict | Self::SlotAlreadyConfirmed | Self::ConflictRetryExhausted => {
                StatusCode::CONFLICT
            }
            Self::StorageError => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();

        if status.is_server_error() {
            tracing::error!(code = ?self.code, message = %self.message, "request failed");
        } else {
            tracing::debug!(code = ?self.code, message = %self.message, "request rejected");
        }

        let mut error = json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(details) = self.details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Success envelope: `{ "data": ... }`.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

pub fn data<T: Serialize>(value: T) -> Json<Data<T>> {
    Json(Data { data: value })
}

impl From<AccessError> for ApiError {
    fn from(error: AccessError) -> Self {
        Self::new(ErrorCode::Forbidden, error.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        Self::new(ErrorCode::StorageError, error.to_string())
    }
}

impl From<RoleResolveError> for ApiError {
    fn from(error: RoleResolveError) -> Self {
        Self::new(ErrorCode::StorageError, error.to_string())
    }
}

impl From<CreateSlotError> for ApiError {
    fn from(error: CreateSlotError) -> Self {
        let code = match &error {
            CreateSlotError::Validation(_) => ErrorCode::BadRequest,
            CreateSlotError::Forbidden(_) => ErrorCode::Forbidden,
            CreateSlotError::LeagueNotFound => ErrorCode::NotFound,
            CreateSlotError::Overlap { .. } => ErrorCode::SlotConflict,
            CreateSlotError::RetryExhausted(_) => ErrorCode::ConflictRetryExhausted,
            CreateSlotError::Storage(_) => ErrorCode::StorageError,
        };

        let details = match &error {
            CreateSlotError::Overlap { start, end } => {
                Some(json!({ "bookedStart": start, "bookedEnd": end }))
            }
            _ => None,
        };

        Self {
            code,
            message: error.to_string(),
            details,
        }
    }
}

impl From<UpdateSlotError> for ApiError {
    fn from(error: UpdateSlotError) -> Self {
        let code = match &error {
            UpdateSlotError::Validation(_) | UpdateSlotError::Cancelled => ErrorCode::BadRequest,
            UpdateSlotError::Forbidden(_) | UpdateSlotError::ConfirmedLocked => {
                ErrorCode::Forbidden
            }
            UpdateSlotError::NotFound(_) => ErrorCode::NotFound,
            UpdateSlotError::Overlap { .. } => ErrorCode::SlotConflict,
            UpdateSlotError::RetryExhausted(_) => ErrorCode::ConflictRetryExhausted,
            UpdateSlotError::Storage(_) => ErrorCode::StorageError,
        };
        Self::new(code, error.to_string())
    }
}

impl From<CancelSlotError> for ApiError {
    fn from(error: CancelSlotError) -> Self {
        let code = match &error {
            CancelSlotError::Forbidden(_) => ErrorCode::Forbidden,
            CancelSlotError::NotFound(_) => ErrorCode::NotFound,
            CancelSlotError::RetryExhausted(_) => ErrorCode::ConflictRetryExhausted,
            CancelSlotError::Storage(_) => ErrorCode::StorageError,
        };
        Self::new(code, error.to_string())
    }
}

impl From<CreateRequestError> for ApiError {
    fn from(error: CreateRequestError) -> Self {
        let code = match &error {
            CreateRequestError::Forbidden(_) => ErrorCode::Forbidden,
            CreateRequestError::SlotNotFound(_) => ErrorCode::NotFound,
            CreateRequestError::SlotUnavailable { .. }
            | CreateRequestError::OwnSlot
            | CreateRequestError::WrongDivision { .. }
            | CreateRequestError::DuplicatePending
            | CreateRequestError::WrongGameType { .. } => ErrorCode::BadRequest,
            CreateRequestError::RetryExhausted(_) => ErrorCode::ConflictRetryExhausted,
            CreateRequestError::Storage(_) => ErrorCode::StorageError,
        };
        Self::new(code, error.to_string())
    }
}

impl From<ReviewRequestError> for ApiError {
    fn from(error: ReviewRequestError) -> Self {
        let code = match &error {
            ReviewRequestError::Forbidden(_) => ErrorCode::Forbidden,
            ReviewRequestError::NotFound(_) => ErrorCode::NotFound,
            ReviewRequestError::NotPending { .. } | ReviewRequestError::WrongGameType { .. } => {
                ErrorCode::BadRequest
            }
            ReviewRequestError::AlreadyConfirmed { .. } => ErrorCode::SlotAlreadyConfirmed,
            ReviewRequestError::SlotCancelled => ErrorCode::SlotConflict,
            ReviewRequestError::RetryExhausted(_) => ErrorCode::ConflictRetryExhausted,
            ReviewRequestError::Storage(_) => ErrorCode::StorageError,
        };
        Self::new(code, error.to_string())
    }
}

impl From<RuleOpError> for ApiError {
    fn from(error: RuleOpError) -> Self {
        let code = match &error {
            RuleOpError::Validation(_) => ErrorCode::BadRequest,
            RuleOpError::Forbidden(_) => ErrorCode::Forbidden,
            RuleOpError::NotFound(_) => ErrorCode::NotFound,
            RuleOpError::Storage(_) => ErrorCode::StorageError,
        };
        Self::new(code, error.to_string())
    }
}

impl From<ExpandApplyError> for ApiError {
    fn from(error: ExpandApplyError) -> Self {
        let code = match &error {
            ExpandApplyError::Validation(_) | ExpandApplyError::Config(_) => ErrorCode::BadRequest,
            ExpandApplyError::Forbidden(_) => ErrorCode::Forbidden,
            ExpandApplyError::LeagueNotFound => ErrorCode::NotFound,
            ExpandApplyError::CorruptRule { .. } => ErrorCode::Internal,
            ExpandApplyError::Storage(_) => ErrorCode::StorageError,
        };
        Self::new(code, error.to_string())
    }
}

impl From<ScheduleOpError> for ApiError {
    fn from(error: ScheduleOpError) -> Self {
        let code = match &error {
            ScheduleOpError::Forbidden(_) => ErrorCode::Forbidden,
            ScheduleOpError::LeagueNotFound => ErrorCode::NotFound,
            ScheduleOpError::Storage(_) => ErrorCode::StorageError,
        };
        Self::new(code, error.to_string())
    }
}

impl From<backend::export::ExportError> for ApiError {
    fn from(error: backend::export::ExportError) -> Self {
        Self::new(ErrorCode::Internal, error.to_string())
    }
}
