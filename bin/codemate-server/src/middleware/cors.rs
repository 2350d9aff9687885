use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;

pub fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    if origins.is_empty() {
        // Wildcard; set CODEMATE_CORS_ORIGINS in production.
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
