use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Domain errors of the leave core. None of these are retried internally;
/// the caller either fixes its input or retries on `ConcurrencyConflict`.
#[derive(Debug, Error)]
pub enum LeaveError {
    #[error("Leave request not found")]
    NotFound,
    #[error("Request is not pending")]
    InvalidState,
    #[error("Not authorized to decide this request")]
    Unauthorized,
    #[error("Maximum optional holidays (4) already used this year")]
    QuotaExceeded,
    #[error("Insufficient leave balance. Short by {shortfall} days.")]
    InsufficientBalance { shortfall: i32 },
    #[error("Conflicting update on the leave ledger, please retry")]
    ConcurrencyConflict,
    #[error("Rejection reason is required")]
    MissingReason,
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl actix_web::ResponseError for LeaveError {
    fn status_code(&self) -> StatusCode {
        match self {
            LeaveError::NotFound => StatusCode::NOT_FOUND,
            LeaveError::Unauthorized => StatusCode::FORBIDDEN,
            LeaveError::ConcurrencyConflict => StatusCode::CONFLICT,
            LeaveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LeaveError::InvalidState
            | LeaveError::QuotaExceeded
            | LeaveError::InsufficientBalance { .. }
            | LeaveError::MissingReason => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let LeaveError::Store(e) = self {
            tracing::error!(error = %e, "store failure surfaced to handler");
            return HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            }));
        }
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}
