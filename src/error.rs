//! The one error type every handler returns.
//!
//! Components never write responses themselves. They hand back an `AppError` and the
//! `IntoResponse` impl at the bottom of this file decides the status code and body.

use crate::db::{ConstraintKind, StoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// What the client gets instead of an internal error message.
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong, please try again later";

/// Why a request failed authentication.
///
/// Only ever logged. The client sees the same message for every variant except
/// `BadLogin`, so nobody can probe whether a token was expired or forged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingCredential,
    InvalidCredential,
    UnknownSubject,
    BadLogin,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-range input. Detail is shown to the client.
    #[error("{0}")]
    Validation(String),

    #[error("unauthenticated: {0:?}")]
    Unauthenticated(AuthFailure),

    /// Authenticated, just not allowed to touch this resource.
    #[error("forbidden")]
    Forbidden,

    /// Carries the resource name, e.g. "thread".
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Anything unexpected. Logged, never sent.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message that is safe to put on the wire.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Conflict(msg) => msg.clone(),
            Self::Unauthenticated(AuthFailure::BadLogin) => {
                "The username or password is incorrect".to_string()
            }
            Self::Unauthenticated(_) => {
                "You are not logged in or your session has expired".to_string()
            }
            Self::Forbidden => "You are not allowed to modify this resource".to_string(),
            Self::NotFound(resource) => format!("The {resource} does not exist"),
            Self::RateLimited { retry_after_secs } => {
                format!("Too many requests, please try again in {retry_after_secs} seconds")
            }
            Self::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Default mapping for storage failures.
///
/// Handlers that know better (e.g. a foreign key on `thread_id` really means "thread
/// not found") match on `StoreError` themselves before falling back to this.
///
/// A dangling `creator_id` means the caller's account vanished after it was resolved,
/// so it is treated like any other unknown subject. Any other foreign key is a bug and
/// never names the column to the client.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Constraint(violation) => match violation.kind {
                ConstraintKind::Unique => {
                    Self::Conflict(format!("{} is already taken", capitalize(&violation.field)))
                }
                ConstraintKind::ForeignKey if violation.field == "creator_id" => {
                    Self::Unauthenticated(AuthFailure::UnknownSubject)
                }
                ConstraintKind::ForeignKey => {
                    Self::Internal(anyhow::anyhow!("unhandled {violation}"))
                }
            },
            StoreError::Backend(e) => Self::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            // Full detail (driver messages, schema names...) stays in the logs.
            Self::Internal(e) => tracing::error!(error = ?e, "internal error"),
            Self::Unauthenticated(reason) => {
                tracing::debug!(?reason, "request failed authentication")
            }
            _ => {}
        }

        (self.status(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConstraintViolation;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_detail_never_reaches_the_client() {
        let err = AppError::Internal(anyhow::anyhow!(
            "relation \"users\" does not exist (SQLSTATE 42P01)"
        ));
        let (status, body) = body_of(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_ERROR_MESSAGE);
        assert!(!body.to_string().contains("SQLSTATE"));
    }

    #[tokio::test]
    async fn unauthenticated_reasons_are_indistinguishable() {
        let (_, missing) = body_of(AppError::Unauthenticated(AuthFailure::MissingCredential)).await;
        let (_, invalid) = body_of(AppError::Unauthenticated(AuthFailure::InvalidCredential)).await;
        let (status, unknown) = body_of(AppError::Unauthenticated(AuthFailure::UnknownSubject)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(missing, invalid);
        assert_eq!(invalid, unknown);
    }

    #[tokio::test]
    async fn validation_detail_is_shown() {
        let (status, body) = body_of(AppError::validation("page value must be at least 1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "page value must be at least 1");
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err: AppError = StoreError::Constraint(ConstraintViolation {
            kind: ConstraintKind::Unique,
            field: "username".into(),
        })
        .into();

        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.public_message(), "Username is already taken");
    }

    #[test]
    fn dangling_creator_is_unauthenticated() {
        let err: AppError = StoreError::foreign_key("creator_id").into();

        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert!(!err.public_message().contains("creator_id"));
    }

    #[tokio::test]
    async fn other_foreign_keys_do_not_leak_the_column() {
        let (status, body) = body_of(StoreError::foreign_key("thread_id").into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn rate_limited_is_429() {
        let err = AppError::RateLimited { retry_after_secs: 7 };
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.public_message(), "Too many requests, please try again in 7 seconds");
    }

    #[test]
    fn backend_failure_maps_to_internal() {
        let err: AppError = StoreError::Backend(anyhow::anyhow!("connection reset")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(AppError::NotFound("thread").public_message(), "The thread does not exist");
    }
}
