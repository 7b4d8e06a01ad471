//! Server binding and peer-trust configuration.

use std::net::IpAddr;

use ipnet::IpNet;
use serde::Deserialize;

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_trusted_cidrs() -> Vec<String> {
    vec!["127.0.0.0/8".to_string(), "::1/128".to_string()]
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
    /// Peers whose proxy headers may stand in for the client address.
    #[serde(default)]
    pub trusted_peers: TrustedPeersConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit_bytes(),
            trusted_peers: TrustedPeersConfig::default(),
        }
    }
}

/// Which peers are treated as reverse proxies.
///
/// A connection from a trusted peer defers to `X-Real-IP` and
/// `X-Forwarded-For` when the server partitions clients for rate
/// limiting. The default covers only loopback, the shape of a proxy
/// running on the same host.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustedPeersConfig {
    /// Trust proxy headers from any peer, bypassing the CIDR check.
    /// Lets clients choose their own rate-limit identity.
    #[serde(default)]
    pub dangerously_trust_all: bool,
    /// CIDR ranges whose peers are treated as reverse proxies.
    #[serde(default = "default_trusted_cidrs")]
    pub cidrs: Vec<String>,
}

impl Default for TrustedPeersConfig {
    fn default() -> Self {
        Self {
            dangerously_trust_all: false,
            cidrs: default_trusted_cidrs(),
        }
    }
}

impl TrustedPeersConfig {
    /// Parse the configured CIDR list, skipping entries that do not parse.
    ///
    /// Invalid entries are rejected earlier by config validation; this
    /// guards the path where a config is constructed programmatically.
    pub fn parsed_cidrs(&self) -> Vec<IpNet> {
        self.cidrs
            .iter()
            .filter_map(|cidr| match cidr.parse::<IpNet>() {
                Ok(net) => Some(net),
                Err(e) => {
                    tracing::warn!(cidr = %cidr, error = %e, "Skipping invalid trusted peer CIDR");
                    None
                }
            })
            .collect()
    }
}
