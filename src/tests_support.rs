//! Helpers shared by the in-crate tests.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::Router;
use http::Request;

use crate::config::AppConfig;
use crate::{build_app, AppState};

/// Build the full application router from a TOML fragment.
pub fn test_app(toml: &str) -> Router {
    let config = AppConfig::from_str(toml).expect("test config must parse");
    let state = AppState::new(config.clone());
    build_app(&config, state)
}

/// GET request carrying peer connection info, as a served request would.
pub fn request_from(peer: &str, uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let mut request = builder.body(Body::empty()).unwrap();

    let addr: std::net::IpAddr = peer.parse().unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::new(addr, 42424)));
    request
}
