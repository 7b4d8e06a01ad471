//! Client address introspection endpoint.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::client_ip::{classify_client_ip, resolve_client_ip, ClientIpSource};
use crate::AppState;

/// How the server sees the caller's address.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ClientIpReport {
    /// Address used for rate-limit partitioning
    #[cfg_attr(feature = "utoipa", schema(example = "203.0.113.9"))]
    pub ip_address: String,
    /// Signal the partitioning address came from
    pub source: ClientIpSource,
    /// Address according to the header-preferring display resolution
    #[cfg_attr(feature = "utoipa", schema(example = "203.0.113.9"))]
    pub resolved: String,
}

/// Report how the caller's address resolves.
///
/// Runs both resolution algorithms against the live request, so an
/// operator can see exactly what a given proxy topology presents to the
/// rate limiter.
#[cfg_attr(feature = "utoipa", utoipa::path(
    get,
    path = "/diagnostics/client-ip",
    tag = "diagnostics",
    operation_id = "client_ip_report",
    responses(
        (status = 200, description = "Resolved client address", body = ClientIpReport),
        (status = 429, description = "Rate limit exceeded", body = crate::openapi::ErrorResponse),
    )
))]
#[tracing::instrument(name = "diagnostics.client_ip", skip_all)]
pub async fn client_ip_report(State(state): State<AppState>, req: Request) -> impl IntoResponse {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    let (ip_address, source) = classify_client_ip(peer, req.headers(), &state.trusted_peers);
    let resolved = resolve_client_ip(peer, req.headers());

    Json(ClientIpReport {
        ip_address,
        source,
        resolved,
    })
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use tower::ServiceExt;

    use crate::tests_support::{request_from, test_app};

    const NO_RATE_LIMIT: &str = "[limits.rate_limit]\nenabled = false\n";

    async fn report(peer: &str, headers: &[(&str, &str)]) -> serde_json::Value {
        let app = test_app(NO_RATE_LIMIT);
        let response = app
            .oneshot(request_from(peer, "/diagnostics/client-ip", headers))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_direct_caller_reported_from_socket() {
        let json = report("203.0.113.9", &[("x-real-ip", "10.0.0.1")]).await;

        assert_eq!(json["ip_address"], "203.0.113.9");
        assert_eq!(json["source"], "socket_peer");
        // display resolution still prefers the header
        assert_eq!(json["resolved"], "10.0.0.1");
    }

    #[tokio::test]
    async fn test_proxied_caller_reported_from_real_ip() {
        let json = report("127.0.0.1", &[("x-real-ip", "203.0.113.7")]).await;

        assert_eq!(json["ip_address"], "203.0.113.7");
        assert_eq!(json["source"], "real_ip_header");
        assert_eq!(json["resolved"], "203.0.113.7");
    }

    #[tokio::test]
    async fn test_forwarded_chain_kept_whole_for_partitioning() {
        let json = report("127.0.0.1", &[("x-forwarded-for", "203.0.113.5, 10.0.0.1")]).await;

        assert_eq!(json["ip_address"], "203.0.113.5, 10.0.0.1");
        assert_eq!(json["source"], "forwarded_for_header");
        assert_eq!(json["resolved"], "203.0.113.5");
    }

    #[tokio::test]
    async fn test_bare_loopback_caller() {
        let json = report("127.0.0.1", &[]).await;

        assert_eq!(json["ip_address"], "127.0.0.1");
        assert_eq!(json["source"], "socket_peer");
        assert_eq!(json["resolved"], "127.0.0.1");
    }

    #[tokio::test]
    async fn test_missing_connect_info_degrades() {
        let app = test_app(NO_RATE_LIMIT);
        let request = http::Request::builder()
            .uri("/diagnostics/client-ip")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["ip_address"], "");
        assert_eq!(json["source"], "socket_peer");
        assert_eq!(json["resolved"], "Unknown");
    }
}
