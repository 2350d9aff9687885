//! Per-request span with a trace id echoed back in `x-trace-id`.

use std::time::Instant;

use axum::body::{Body, HttpBody};
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::{BodyExt, Limited};
use tracing::{Instrument, Level, debug, info, info_span, warn};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

const MAX_LOGGED_BODY: usize = 1024;

pub async fn trace_middleware(mut req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let trace_header = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    // Credentials travel in /auth bodies.
    let log_bodies = !req.uri().path().starts_with("/auth");

    async move {
        if let Some(value) = &trace_header {
            req.headers_mut().insert(X_TRACE_ID, value.clone());
        }
        let req = if log_bodies {
            log_json_body(req, "request").await
        } else {
            req
        };

        let mut response = next.run(req).await;
        if let Some(value) = trace_header {
            response.headers_mut().insert(X_TRACE_ID, value);
        }
        let response = if log_bodies {
            log_json_body(response, "response").await
        } else {
            response
        };

        info!(
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "request finished"
        );
        response
    }
    .instrument(span)
    .await
}

/// Message types whose JSON body can be buffered and rebuilt.
trait HasJsonBody: Sized {
    fn headers(&self) -> &HeaderMap;
    fn into_body_parts(self) -> (Box<dyn FnOnce(Body) -> Self + Send>, Body);
}

impl HasJsonBody for Request<Body> {
    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn into_body_parts(self) -> (Box<dyn FnOnce(Body) -> Self + Send>, Body) {
        let (parts, body) = self.into_parts();
        (Box::new(move |body| Request::from_parts(parts, body)), body)
    }
}

impl HasJsonBody for Response {
    fn headers(&self) -> &HeaderMap {
        Response::headers(self)
    }

    fn into_body_parts(self) -> (Box<dyn FnOnce(Body) -> Self + Send>, Body) {
        let (parts, body) = self.into_parts();
        (Box::new(move |body| Response::from_parts(parts, body)), body)
    }
}

/// Logs small JSON bodies at debug level. A body is only buffered when
/// debug logging is on and its size is known to be at most
/// [`MAX_LOGGED_BODY`]; everything else passes through untouched.
async fn log_json_body<M: HasJsonBody>(message: M, direction: &'static str) -> M {
    if !tracing::enabled!(Level::DEBUG) {
        return message;
    }
    let is_json = message
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return message;
    }

    let (rebuild, body) = message.into_body_parts();
    let small = body
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= MAX_LOGGED_BODY as u64);
    if !small {
        return rebuild(body);
    }

    let bytes = match Limited::new(body, MAX_LOGGED_BODY).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "{direction} body could not be read");
            return rebuild(Body::empty());
        }
    };
    if let Ok(text) = std::str::from_utf8(&bytes) {
        debug!("{direction} body: {text}");
    }
    rebuild(Body::from(bytes))
}
