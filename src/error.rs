use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDateTime;
use serde_json::json;
use thiserror::Error;

/// Domain errors for the attendance timeline and overtime engine.
///
/// Every mutating operation runs inside a transaction; returning any of these
/// aborts it (rollback on drop), so no partial reconciliation state is ever
/// persisted.
#[derive(Debug, Error)]
pub enum TimeclockError {
    #[error("invalid attendance: {reason}")]
    Validation { reason: String },

    #[error("attendance overlap: {reason}")]
    Overlap { reason: String },

    #[error("no open attendance record for employee {employee}")]
    NoOpenAttendance { employee: u64 },

    #[error("access denied: {reason}")]
    Access { reason: String },

    #[error("attendance records cannot be duplicated")]
    Duplication,

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl TimeclockError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn access(reason: impl Into<String>) -> Self {
        Self::Access {
            reason: reason.into(),
        }
    }

    pub fn check_out_before_check_in(check_in: NaiveDateTime, check_out: NaiveDateTime) -> Self {
        Self::Validation {
            reason: format!("check out {check_out} cannot be earlier than check in {check_in}"),
        }
    }

    pub fn already_checked_in(at: NaiveDateTime) -> Self {
        Self::Overlap {
            reason: format!("the employee was already checked in on {at}"),
        }
    }

    pub fn still_checked_in(since: NaiveDateTime) -> Self {
        Self::Overlap {
            reason: format!("the employee has not checked out since {since}"),
        }
    }

    pub fn record_inside_span(check_in: NaiveDateTime) -> Self {
        Self::Overlap {
            reason: format!("another record starting on {check_in} lies inside this one"),
        }
    }
}

impl ResponseError for TimeclockError {
    fn status_code(&self) -> StatusCode {
        match self {
            TimeclockError::Validation { .. }
            | TimeclockError::Overlap { .. }
            | TimeclockError::NoOpenAttendance { .. } => StatusCode::BAD_REQUEST,
            TimeclockError::Access { .. } => StatusCode::FORBIDDEN,
            TimeclockError::Duplication => StatusCode::CONFLICT,
            TimeclockError::NotFound { .. } => StatusCode::NOT_FOUND,
            TimeclockError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Store failures get an opaque body; everything else is user-facing.
        if let TimeclockError::Store(e) = self {
            tracing::error!(error = %e, "store error");
            return HttpResponse::InternalServerError()
                .json(json!({ "error": "internal server error" }));
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
