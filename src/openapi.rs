//! OpenAPI documentation and the JSON error envelope.

use serde::{Deserialize, Serialize};
#[cfg(feature = "utoipa")]
use utoipa::OpenApi;

#[cfg(feature = "utoipa")]
use crate::routes::{diagnostics, forecast, health};

/// OpenAPI documentation for the service.
#[cfg(feature = "utoipa")]
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Portcullis API",
        version = "0.1.0",
        description = r#"A small HTTP service demonstrating proxy-aware client IP resolution
and per-client fixed-window rate limiting.

Rate-limited endpoints admit a configurable number of requests per client
per window (one per minute by default) and answer `429` with a JSON error
envelope once the window is exhausted. Responses carry `X-RateLimit-Limit`
and `X-RateLimit-Remaining`; rejections add `X-RateLimit-Reset` and
`Retry-After`.

Clients are told apart by IP address. A connection from a trusted peer
(loopback by default) is assumed to be a reverse proxy and the limiter
defers to its `X-Real-IP` or `X-Forwarded-For` header; any other peer is
the client itself and headers are ignored."#,
        license(name = "Apache-2.0 OR MIT")
    ),
    servers((url = "/", description = "Default server")),
    tags(
        (name = "forecast", description = "Synthetic weather forecast data"),
        (name = "diagnostics", description = "Client address introspection"),
        (name = "health", description = "Service health and liveness")
    ),
    paths(
        forecast::get_weather_forecast,
        diagnostics::client_ip_report,
        health::health_check,
    ),
    components(schemas(
        forecast::WeatherForecast,
        diagnostics::ClientIpReport,
        crate::client_ip::ClientIpSource,
        health::HealthStatus,
        ErrorResponse,
        ErrorInfo,
    ))
)]
pub struct ApiDoc;

#[cfg(feature = "utoipa")]
impl ApiDoc {
    /// Build the OpenAPI specification.
    pub fn build() -> utoipa::openapi::OpenApi {
        Self::openapi()
    }
}

/// Standard error response envelope.
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

/// Error details.
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ErrorInfo {
    /// Error category
    #[serde(rename = "type")]
    #[cfg_attr(feature = "utoipa", schema(example = "rate_limit_error"))]
    pub error_type: String,
    /// Human-readable error message
    #[cfg_attr(feature = "utoipa", schema(example = "Rate limit exceeded: 1 per 60 seconds"))]
    pub message: String,
    /// Machine-readable error code
    #[cfg_attr(feature = "utoipa", schema(example = "rate_limit_exceeded"))]
    pub code: Option<String>,
    /// Correlation ID for matching against server logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create an error response with an explicit category and code.
    pub fn new(
        error_type: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorInfo {
                error_type: error_type.into(),
                message: message.into(),
                code: Some(code.into()),
                request_id: None,
            },
        }
    }
}
