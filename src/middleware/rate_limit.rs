//! Per-client rate limiting.
//!
//! Applied with `route_layer` to the endpoints that need it. Each request
//! is charged to a partition keyed by route and classified client address,
//! so one client exhausting its budget never affects another.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::client_ip::classify_client_ip;
use crate::openapi::ErrorResponse;
use crate::rate_limit::Verdict;
use crate::AppState;

/// Rate-limit rejection, rendered as a 429 with the standard error envelope.
#[derive(Debug)]
pub struct RateLimitError {
    limit: u32,
    window_secs: u64,
    retry_after_secs: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let message = format!(
            "Rate limit exceeded: {} per {} seconds",
            self.limit, self.window_secs
        );
        let body = ErrorResponse::new("rate_limit_error", "rate_limit_exceeded", message);

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        insert_header(headers, "X-RateLimit-Limit", self.limit.to_string());
        insert_header(headers, "X-RateLimit-Remaining", "0".to_string());
        insert_header(headers, "X-RateLimit-Reset", self.retry_after_secs.to_string());
        insert_header(headers, "Retry-After", self.retry_after_secs.to_string());
        response
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: String) {
    if let Ok(value) = HeaderValue::try_from(value) {
        headers.insert(name, value);
    }
}

/// Admission control keyed by route and client address.
///
/// On rejection the request never reaches the handler.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.config.limits.rate_limit.enabled {
        return Ok(next.run(req).await);
    }

    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    let (client_ip, source) = classify_client_ip(peer, req.headers(), &state.trusted_peers);
    let key = format!("{route}_{client_ip}");
    let limit = state.rate_limiter.limit();

    match state.rate_limiter.try_acquire(&key, Instant::now()) {
        Verdict::Admitted { remaining } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            insert_header(headers, "X-RateLimit-Limit", limit.to_string());
            insert_header(headers, "X-RateLimit-Remaining", remaining.to_string());
            Ok(response)
        }
        Verdict::Rejected { retry_after } => {
            tracing::warn!(
                route = %route,
                client_ip = %client_ip,
                source = ?source,
                "Rate limit exceeded"
            );
            Err(RateLimitError {
                limit,
                window_secs: state.config.limits.rate_limit.window_secs,
                retry_after_secs: retry_after.as_secs().max(1),
            })
        }
    }
}
