//! Client address resolution for requests arriving directly or through a
//! reverse proxy.
//!
//! Two algorithms live here and they answer different questions.
//! [`classify_client_ip`] produces the identity used for rate-limit
//! partitioning: it only believes proxy headers when the TCP peer is on
//! the trusted list, so a remote caller cannot spoof its way into someone
//! else's bucket. [`resolve_client_ip`] answers "what address should a
//! human see" and prefers headers unconditionally, but insists they parse
//! as real IP addresses. Neither function can fail; absent or malformed
//! signals degrade to the next source.

use std::net::IpAddr;

use http::HeaderMap;
use ipnet::IpNet;
use serde::Serialize;

/// Which signal supplied the partitioning address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub enum ClientIpSource {
    /// The TCP peer address, used directly.
    SocketPeer,
    /// The `X-Real-IP` header, trusted because the peer is a known proxy.
    RealIpHeader,
    /// The `X-Forwarded-For` header, trusted because the peer is a known proxy.
    ForwardedForHeader,
    /// No classification has happened.
    #[default]
    Unknown,
}

/// Peers whose proxy headers may override the socket address.
///
/// Defaults to the loopback ranges, the shape of a reverse proxy on the
/// same host. Deployments with an internal proxy tier widen the list via
/// `[server.trusted_peers]` in the config file.
#[derive(Debug, Clone)]
pub struct TrustedPeers {
    trust_all: bool,
    cidrs: Vec<IpNet>,
}

impl TrustedPeers {
    pub fn new(cidrs: Vec<IpNet>, trust_all: bool) -> Self {
        Self { trust_all, cidrs }
    }

    /// Exactly the loopback ranges: 127.0.0.0/8 and ::1.
    pub fn loopback_only() -> Self {
        Self::new(
            vec!["127.0.0.0/8".parse().unwrap(), "::1/128".parse().unwrap()],
            false,
        )
    }

    pub fn contains(&self, peer: IpAddr) -> bool {
        self.trust_all || self.cidrs.iter().any(|net| net.contains(&peer))
    }
}

impl Default for TrustedPeers {
    fn default() -> Self {
        Self::loopback_only()
    }
}

/// Classify the caller's address for rate-limit partitioning.
///
/// A peer outside the trusted ranges is the client itself and is used
/// directly, whatever headers the request carries. A trusted peer is a
/// proxy, so the classification defers to `X-Real-IP`, then
/// `X-Forwarded-For`. Header values are taken verbatim: a multi-hop
/// `X-Forwarded-For` chain becomes the partition identity whole, which
/// keeps distinct proxy paths in distinct buckets without trusting any
/// single hop.
///
/// The peer is canonicalized first, so an IPv4-mapped IPv6 peer is judged
/// against the trusted ranges and rendered in its IPv4 form.
pub fn classify_client_ip(
    peer: Option<IpAddr>,
    headers: &HeaderMap,
    trusted: &TrustedPeers,
) -> (String, ClientIpSource) {
    let peer = peer.map(|addr| addr.to_canonical());

    if let Some(addr) = peer
        && !trusted.contains(addr)
    {
        return (addr.to_string(), ClientIpSource::SocketPeer);
    }

    if let Some(value) = non_blank_header(headers, "x-real-ip") {
        return (value.to_string(), ClientIpSource::RealIpHeader);
    }

    if let Some(value) = non_blank_header(headers, "x-forwarded-for") {
        return (value.to_string(), ClientIpSource::ForwardedForHeader);
    }

    (
        peer.map(|addr| addr.to_string()).unwrap_or_default(),
        ClientIpSource::SocketPeer,
    )
}

/// Resolve the caller's address for display.
///
/// Headers win unconditionally here, but only when they parse: the first
/// `X-Forwarded-For` hop, then `X-Real-IP`, then `X-Client-IP`, each
/// accepted as an IP address or skipped. Falls back to the peer's textual
/// form, or `"Unknown"` when there is no peer either.
pub fn resolve_client_ip(peer: Option<IpAddr>, headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for")
        && let Some(first_hop) = forwarded.split(',').next()
        && let Ok(addr) = first_hop.trim().parse::<IpAddr>()
    {
        return addr.to_string();
    }

    for name in ["x-real-ip", "x-client-ip"] {
        if let Some(value) = header_str(headers, name)
            && let Ok(addr) = value.parse::<IpAddr>()
        {
            return addr.to_string();
        }
    }

    peer.map(|addr| addr.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// First value of `name` as a string, if it is visible ASCII.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

/// Like [`header_str`], but whitespace-only values count as absent.
fn non_blank_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let value = header_str(headers, name)?;
    (!value.trim().is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use http::{HeaderName, HeaderValue};
    use rstest::rstest;

    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    // ===== classification =====

    #[test]
    fn test_direct_peer_ignores_headers() {
        let headers = headers(&[
            ("x-real-ip", "10.9.9.9"),
            ("x-forwarded-for", "10.8.8.8"),
        ]);
        let (addr, source) =
            classify_client_ip(Some(ip("203.0.113.9")), &headers, &TrustedPeers::default());
        assert_eq!(addr, "203.0.113.9");
        assert_eq!(source, ClientIpSource::SocketPeer);
    }

    #[test]
    fn test_trusted_peer_defers_to_real_ip() {
        let headers = headers(&[
            ("x-real-ip", "203.0.113.7"),
            ("x-forwarded-for", "10.8.8.8"),
        ]);
        let (addr, source) =
            classify_client_ip(Some(ip("127.0.0.1")), &headers, &TrustedPeers::default());
        assert_eq!(addr, "203.0.113.7");
        assert_eq!(source, ClientIpSource::RealIpHeader);
    }

    #[test]
    fn test_trusted_peer_falls_back_to_forwarded_for() {
        let headers = headers(&[("x-forwarded-for", "203.0.113.5, 10.0.0.1")]);
        let (addr, source) =
            classify_client_ip(Some(ip("::1")), &headers, &TrustedPeers::default());
        // the chain is kept whole, not split at the first hop
        assert_eq!(addr, "203.0.113.5, 10.0.0.1");
        assert_eq!(source, ClientIpSource::ForwardedForHeader);
    }

    #[test]
    fn test_trusted_peer_without_headers_uses_peer() {
        let (addr, source) =
            classify_client_ip(Some(ip("127.0.0.1")), &HeaderMap::new(), &TrustedPeers::default());
        assert_eq!(addr, "127.0.0.1");
        assert_eq!(source, ClientIpSource::SocketPeer);
    }

    #[test]
    fn test_no_peer_no_headers_yields_empty() {
        let (addr, source) = classify_client_ip(None, &HeaderMap::new(), &TrustedPeers::default());
        assert_eq!(addr, "");
        assert_eq!(source, ClientIpSource::SocketPeer);
    }

    #[test]
    fn test_no_peer_defers_to_headers() {
        let headers = headers(&[("x-real-ip", "203.0.113.7")]);
        let (addr, source) = classify_client_ip(None, &headers, &TrustedPeers::default());
        assert_eq!(addr, "203.0.113.7");
        assert_eq!(source, ClientIpSource::RealIpHeader);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t")]
    fn test_blank_real_ip_counts_as_absent(#[case] blank: &str) {
        let headers = headers(&[("x-real-ip", blank), ("x-forwarded-for", "203.0.113.5")]);
        let (addr, source) =
            classify_client_ip(Some(ip("127.0.0.1")), &headers, &TrustedPeers::default());
        assert_eq!(addr, "203.0.113.5");
        assert_eq!(source, ClientIpSource::ForwardedForHeader);
    }

    #[test]
    fn test_real_ip_value_is_not_validated() {
        let headers = headers(&[("x-real-ip", "definitely-not-an-ip")]);
        let (addr, source) =
            classify_client_ip(Some(ip("127.0.0.1")), &headers, &TrustedPeers::default());
        assert_eq!(addr, "definitely-not-an-ip");
        assert_eq!(source, ClientIpSource::RealIpHeader);
    }

    #[test]
    fn test_first_of_repeated_real_ip_headers_wins() {
        let headers = headers(&[("x-real-ip", "203.0.113.1"), ("x-real-ip", "203.0.113.2")]);
        let (addr, _) =
            classify_client_ip(Some(ip("127.0.0.1")), &headers, &TrustedPeers::default());
        assert_eq!(addr, "203.0.113.1");
    }

    #[test]
    fn test_mapped_ipv6_peer_renders_as_ipv4() {
        let (addr, source) = classify_client_ip(
            Some(ip("::ffff:203.0.113.9")),
            &HeaderMap::new(),
            &TrustedPeers::default(),
        );
        assert_eq!(addr, "203.0.113.9");
        assert_eq!(source, ClientIpSource::SocketPeer);
    }

    #[test]
    fn test_mapped_loopback_peer_is_trusted() {
        let headers = headers(&[("x-real-ip", "203.0.113.7")]);
        let (addr, source) = classify_client_ip(
            Some(ip("::ffff:127.0.0.1")),
            &headers,
            &TrustedPeers::default(),
        );
        assert_eq!(addr, "203.0.113.7");
        assert_eq!(source, ClientIpSource::RealIpHeader);
    }

    #[test]
    fn test_widened_trust_list() {
        let trusted = TrustedPeers::new(vec!["10.0.0.0/8".parse().unwrap()], false);
        let headers = headers(&[("x-real-ip", "203.0.113.7")]);

        let (addr, source) = classify_client_ip(Some(ip("10.1.2.3")), &headers, &trusted);
        assert_eq!(addr, "203.0.113.7");
        assert_eq!(source, ClientIpSource::RealIpHeader);

        // loopback is no longer on the list
        let (addr, source) = classify_client_ip(Some(ip("127.0.0.1")), &headers, &trusted);
        assert_eq!(addr, "127.0.0.1");
        assert_eq!(source, ClientIpSource::SocketPeer);
    }

    #[test]
    fn test_trust_all_defers_for_any_peer() {
        let trusted = TrustedPeers::new(vec![], true);
        let headers = headers(&[("x-real-ip", "203.0.113.7")]);
        let (addr, source) = classify_client_ip(Some(ip("198.51.100.23")), &headers, &trusted);
        assert_eq!(addr, "203.0.113.7");
        assert_eq!(source, ClientIpSource::RealIpHeader);
    }

    // ===== display resolution =====

    #[test]
    fn test_resolve_takes_first_forwarded_hop() {
        let headers = headers(&[("x-forwarded-for", "203.0.113.5, 10.0.0.1")]);
        assert_eq!(resolve_client_ip(Some(ip("127.0.0.1")), &headers), "203.0.113.5");
    }

    #[test]
    fn test_resolve_prefers_headers_over_routable_peer() {
        let headers = headers(&[("x-forwarded-for", "203.0.113.5")]);
        assert_eq!(resolve_client_ip(Some(ip("198.51.100.23")), &headers), "203.0.113.5");
    }

    #[test]
    fn test_resolve_skips_invalid_forwarded_for() {
        let headers = headers(&[
            ("x-forwarded-for", "unknown"),
            ("x-real-ip", "198.51.100.7"),
        ]);
        assert_eq!(resolve_client_ip(Some(ip("127.0.0.1")), &headers), "198.51.100.7");
    }

    #[test]
    fn test_resolve_falls_through_to_client_ip_header() {
        let headers = headers(&[
            ("x-real-ip", "not-an-ip"),
            ("x-client-ip", "198.51.100.8"),
        ]);
        assert_eq!(resolve_client_ip(None, &headers), "198.51.100.8");
    }

    #[test]
    fn test_resolve_first_of_repeated_forwarded_for_wins() {
        let headers = headers(&[
            ("x-forwarded-for", "203.0.113.5"),
            ("x-forwarded-for", "203.0.113.6"),
        ]);
        assert_eq!(resolve_client_ip(None, &headers), "203.0.113.5");
    }

    #[test]
    fn test_resolve_blank_forwarded_for_counts_as_absent() {
        let headers = headers(&[("x-forwarded-for", "   "), ("x-real-ip", "198.51.100.7")]);
        assert_eq!(resolve_client_ip(None, &headers), "198.51.100.7");
    }

    #[test]
    fn test_resolve_falls_back_to_peer() {
        assert_eq!(
            resolve_client_ip(Some(ip("192.0.2.4")), &HeaderMap::new()),
            "192.0.2.4"
        );
    }

    #[test]
    fn test_resolve_without_any_signal_is_unknown() {
        assert_eq!(resolve_client_ip(None, &HeaderMap::new()), "Unknown");
    }

    #[rstest]
    #[case("203.0.113.5,10.0.0.1", "203.0.113.5")]
    #[case("  203.0.113.5  , 10.0.0.1", "203.0.113.5")]
    #[case("2001:db8::1, 10.0.0.1", "2001:db8::1")]
    fn test_resolve_forwarded_hop_parsing(#[case] value: &str, #[case] expected: &str) {
        let headers = headers(&[("x-forwarded-for", value)]);
        assert_eq!(resolve_client_ip(None, &headers), expected);
    }

    #[test]
    fn test_resolve_normalizes_parsed_text() {
        let headers = headers(&[("x-forwarded-for", "2001:DB8:0:0:0:0:0:1")]);
        assert_eq!(resolve_client_ip(None, &headers), "2001:db8::1");
    }
}
