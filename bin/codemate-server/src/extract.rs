//! Extractors that turn every input problem into a 422.

use std::convert::Infallible;

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ServerError;
use crate::middleware::auth::{AuthUser, ensure_same_user};
use crate::middleware::rate_limit::client_key;

/// JSON body that must deserialize and pass [`Validate`].
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ServerError::Validation(rejection.body_text()))?;
        value
            .validate()
            .map_err(|e| ServerError::Validation(e.to_string()))?;
        Ok(Self(value))
    }
}

/// Query string that must deserialize and pass [`Validate`].
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ServerError::Validation(rejection.body_text()))?;
        value
            .validate()
            .map_err(|e| ServerError::Validation(e.to_string()))?;
        Ok(Self(value))
    }
}

/// Who is calling: the verified token identity, if any, and the client key
/// used for rate limiting.
#[derive(Debug, Clone)]
pub struct Caller {
    pub auth: Option<AuthUser>,
    pub client: String,
}

impl Caller {
    /// The token's user id wins over a user id named in the request.
    pub fn user_id<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        self.auth
            .as_ref()
            .map(|auth| auth.user_id.as_str())
            .or(requested)
    }

    pub fn ensure_owner(&self, user_id: &str) -> Result<(), ServerError> {
        ensure_same_user(self.auth.as_ref(), user_id)
    }

    /// Key of the recent-code cache entry for this caller.
    pub fn code_key(&self, user_id: Option<&str>) -> String {
        match user_id {
            Some(user_id) => format!("user:{user_id}"),
            None => format!("anon:{}", self.client),
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            auth: parts.extensions.get::<AuthUser>().cloned(),
            client: client_key(&parts.headers, &parts.extensions),
        })
    }
}

/// Path user ids share the query parameter's bounds.
pub fn check_user_id(user_id: &str) -> Result<(), ServerError> {
    if user_id.is_empty() || user_id.len() > 128 {
        return Err(ServerError::Validation(
            "user_id must be between 1 and 128 characters".into(),
        ));
    }
    Ok(())
}
