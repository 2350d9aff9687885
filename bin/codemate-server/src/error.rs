//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body
//! `{"error": "..."}` with the matching status code.
//!
//! Store and internal errors are logged with full detail; callers only see a
//! generic message.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use codemate_core::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Malformed body, failed field validation or bad query parameters.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Valid token, but for a different user.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::Validation(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
            ServerError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            ServerError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            ServerError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ServerError::RateLimited { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded".to_owned())
            }
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),

            ServerError::Store(StoreError::Conflict(m)) => (StatusCode::CONFLICT, m.clone()),
            ServerError::Store(e) => {
                error!(error = %e, "store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };

        let mut response = (status, Json(json!({ "error": client_message }))).into_response();
        if let ServerError::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http_body_util::BodyExt;
    use tracing_test::traced_test;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (ServerError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ServerError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (
                ServerError::Store(StoreError::Conflict("dup".into())),
                StatusCode::CONFLICT,
            ),
            (
                ServerError::Store(StoreError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ServerError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[tokio::test]
    #[traced_test]
    async fn store_failures_are_logged_but_not_leaked() {
        let response =
            ServerError::Store(StoreError::Backend("disk I/O error on page 7".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(logs_contain("disk I/O error on page 7"));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "internal server error");
    }
}
