//! Fixed-window request limiting per route group and client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Extensions, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use strum::Display;
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::state::AppState;

/// Windows are pruned once the table grows past this many entries.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RouteGroup {
    Chat,
    History,
    Save,
    Suggest,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    windows: Mutex<HashMap<(RouteGroup, String), Window>>,
    period: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.windows.lock().map(|w| w.len()).unwrap_or(0);
        write!(f, "RateLimiter({count} windows)")
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl RateLimiter {
    pub fn new(period: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            period,
        }
    }

    /// Counts one request. Returns the seconds until the window resets when
    /// `limit` is already used up.
    pub fn check(&self, group: RouteGroup, client: &str, limit: u32) -> Result<(), u64> {
        let now = Instant::now();
        let Ok(mut windows) = self.windows.lock() else {
            warn!("rate limiter lock poisoned; allowing request");
            return Ok(());
        };
        if windows.len() > PRUNE_THRESHOLD {
            let period = self.period;
            windows.retain(|_, w| now.duration_since(w.started) < period);
        }

        let window = windows
            .entry((group, client.to_owned()))
            .or_insert(Window {
                started: now,
                count: 0,
            });
        if now.duration_since(window.started) >= self.period {
            *window = Window {
                started: now,
                count: 0,
            };
        }
        if window.count >= limit {
            let remaining = self.period.saturating_sub(now.duration_since(window.started));
            return Err(remaining.as_secs().max(1));
        }
        window.count += 1;
        Ok(())
    }
}

/// Client identity: first `X-Forwarded-For` hop, else the peer address.
pub fn client_key(headers: &HeaderMap, extensions: &Extensions) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_owned())
}

pub async fn rate_limit(
    State((state, group)): State<(Arc<AppState>, RouteGroup)>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.enable_rate_limit {
        return next.run(req).await;
    }
    let limits = state.config.rate_limits;
    let limit = match group {
        RouteGroup::Chat => limits.chat,
        RouteGroup::History => limits.history,
        RouteGroup::Save => limits.save,
        RouteGroup::Suggest => limits.suggest,
    };
    let client = client_key(req.headers(), req.extensions());
    match state.rate_limiter.check(group, &client, limit) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            debug!(group = %group, client = %client, retry_after, "rate limit exceeded");
            ServerError::RateLimited { retry_after }.into_response()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn limit_applies_per_group_and_client() {
        let limiter = RateLimiter::default();
        for _ in 0..3 {
            assert!(limiter.check(RouteGroup::Chat, "a", 3).is_ok());
        }
        let retry = limiter.check(RouteGroup::Chat, "a", 3).unwrap_err();
        assert!((1..=60).contains(&retry));
        assert!(limiter.check(RouteGroup::Chat, "b", 3).is_ok());
        assert!(limiter.check(RouteGroup::History, "a", 3).is_ok());
    }

    #[test]
    fn window_resets_after_period() {
        let limiter = RateLimiter::new(Duration::from_millis(30));
        assert!(limiter.check(RouteGroup::Save, "a", 1).is_ok());
        assert!(limiter.check(RouteGroup::Save, "a", 1).is_err());
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check(RouteGroup::Save, "a", 1).is_ok());
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(req.headers(), req.extensions()), "203.0.113.9");
        let bare = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(bare.headers(), bare.extensions()), "unknown");
    }
}
