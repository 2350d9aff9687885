use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::ServerError;
use crate::state::AppState;

/// Identity taken from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
    pub user_id: String,
}

/// Verifies an optional bearer token and stores the caller as an
/// [`AuthUser`] request extension.
///
/// A present but invalid token is always rejected; a missing token is only
/// rejected when authentication is required.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
                .unwrap_or(v)
                .trim()
                .to_owned()
        });

    match provided {
        Some(token) => match state.tokens.verify(&token) {
            Ok(claims) => {
                req.extensions_mut().insert(AuthUser {
                    username: claims.sub,
                    user_id: claims.user_id,
                });
            }
            Err(e) => {
                debug!(error = %e, "rejected bearer token");
                return e.into_response();
            }
        },
        None if state.config.require_auth => {
            return ServerError::Unauthorized("missing bearer token".into()).into_response();
        }
        None => {}
    }
    next.run(req).await
}

/// A token issued for one user may not touch another user's data.
pub fn ensure_same_user(auth: Option<&AuthUser>, user_id: &str) -> Result<(), ServerError> {
    match auth {
        Some(caller) if caller.user_id != user_id => Err(ServerError::Forbidden(
            "token does not belong to this user".into(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn other_users_are_forbidden() {
        let caller = AuthUser {
            username: "alice".into(),
            user_id: "u-1".into(),
        };
        assert!(ensure_same_user(Some(&caller), "u-1").is_ok());
        assert!(matches!(
            ensure_same_user(Some(&caller), "u-2"),
            Err(ServerError::Forbidden(_))
        ));
        assert!(ensure_same_user(None, "u-2").is_ok());
    }
}
