//! API error type and its JSON rendering.
//!
//! Every domain error converts into `ApiError`; handlers only ever return
//! `Result<_, ApiError>`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::appointment::AppointmentError;
use crate::auth::AuthError;
use crate::authorization::AuthorizationError;
use crate::care_records::CareRecordError;
use crate::chat::ChatError;
use crate::core_state::CoreError;
use crate::directory::DirectoryError;
use crate::insights::InsightError;
use crate::prescriptions::PrescriptionError;
use crate::reminders::ReminderError;

/// Failure body: `{ "message": ..., "error": CODE }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    DuplicateIdentity(String),
    #[error("{0}")]
    DuplicateAppointment(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Token expired")]
    TokenExpired,
    #[error("Session superseded")]
    SessionSuperseded,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Validation(detail) => (StatusCode::BAD_REQUEST, "VALIDATION", detail.clone()),
            ApiError::DuplicateIdentity(detail) => {
                (StatusCode::BAD_REQUEST, "DUPLICATE_IDENTITY", detail.clone())
            }
            ApiError::DuplicateAppointment(detail) => {
                (StatusCode::BAD_REQUEST, "DUPLICATE_APPOINTMENT", detail.clone())
            }
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid email or password".to_string(),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "Token expired, please log in again".to_string(),
            ),
            ApiError::SessionSuperseded => (
                StatusCode::UNAUTHORIZED,
                "SESSION_SUPERSEDED",
                "Session ended by a newer login".to_string(),
            ),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail.clone()),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::InvalidTransition(detail) => {
                (StatusCode::CONFLICT, "INVALID_TRANSITION", detail.clone())
            }
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
            ),
            ApiError::Upstream(detail) => {
                tracing::warn!(detail, "Upstream service error");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_UNAVAILABLE",
                    "The assistant is unavailable right now, please try again later".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut response = (status, Json(ErrorBody { message, error: code })).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {err}"))
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(err: AuthorizationError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => ApiError::Validation(msg),
            AuthError::DuplicateIdentity(msg) => ApiError::DuplicateIdentity(msg),
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::Unauthenticated => ApiError::Unauthorized,
            AuthError::TokenExpired => ApiError::TokenExpired,
            AuthError::SessionSuperseded => ApiError::SessionSuperseded,
            e @ AuthError::PrincipalNotFound(_) => ApiError::NotFound(e.to_string()),
            e @ (AuthError::Database(_) | AuthError::Crypto(_)) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AppointmentError> for ApiError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Validation(msg) => ApiError::Validation(msg),
            e @ AppointmentError::NotFound(_) => ApiError::NotFound(e.to_string()),
            e @ AppointmentError::DuplicateAppointment => ApiError::DuplicateAppointment(e.to_string()),
            e @ AppointmentError::InvalidTransition { .. } => ApiError::InvalidTransition(e.to_string()),
            AppointmentError::Forbidden(e) => e.into(),
            AppointmentError::Database(e) => e.into(),
        }
    }
}

impl From<ReminderError> for ApiError {
    fn from(err: ReminderError) -> Self {
        match err {
            ReminderError::Validation(msg) => ApiError::Validation(msg),
            e @ ReminderError::NotFound => ApiError::NotFound(e.to_string()),
            ReminderError::Database(e) => e.into(),
        }
    }
}

impl From<PrescriptionError> for ApiError {
    fn from(err: PrescriptionError) -> Self {
        match err {
            PrescriptionError::Validation(msg) => ApiError::Validation(msg),
            e @ PrescriptionError::NotFound(_) => ApiError::NotFound(e.to_string()),
            PrescriptionError::Forbidden(e) => e.into(),
            PrescriptionError::Database(e) => e.into(),
        }
    }
}

impl From<CareRecordError> for ApiError {
    fn from(err: CareRecordError) -> Self {
        match err {
            CareRecordError::Validation(msg) => ApiError::Validation(msg),
            e @ CareRecordError::NotFound(_) => ApiError::NotFound(e.to_string()),
            CareRecordError::Forbidden(e) => e.into(),
            CareRecordError::Database(e) => e.into(),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Validation(msg) => ApiError::Validation(msg),
            e @ DirectoryError::NotFound => ApiError::NotFound(e.to_string()),
            DirectoryError::Database(e) => e.into(),
        }
    }
}

impl From<InsightError> for ApiError {
    fn from(err: InsightError) -> Self {
        match err {
            InsightError::Validation(msg) => ApiError::Validation(msg),
            e @ InsightError::NotFound => ApiError::NotFound(e.to_string()),
            InsightError::Database(e) => e.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Validation(msg) => ApiError::Validation(msg),
            ChatError::Upstream(e) => ApiError::Upstream(e.to_string()),
            ChatError::Database(e) => e.into(),
        }
    }
}
