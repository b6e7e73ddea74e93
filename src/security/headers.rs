//! Forwarded header normalization.
//!
//! # Responsibilities
//! - Recover the original client address from `X-Forwarded-For`
//! - Recover the original scheme from `X-Forwarded-Proto`
//! - Decide which peers are allowed to assert those headers
//!
//! # Design Decisions
//! - The left-most entry is the originating client; later entries are proxies
//! - Unparseable or absent headers leave the transport values untouched
//! - Trust is either "every peer" or an explicit list of proxy addresses

use axum::http::{HeaderMap, HeaderName};
use std::net::{IpAddr, SocketAddr};

use crate::config::ForwardedHeadersConfig;
use crate::http::request::Scheme;

pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Which peers may supply forwarded headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyTrust {
    All,
    Listed(Vec<IpAddr>),
}

impl ProxyTrust {
    pub fn trusts(&self, peer: IpAddr) -> bool {
        match self {
            ProxyTrust::All => true,
            ProxyTrust::Listed(proxies) => proxies.iter().any(|proxy| same_address(*proxy, peer)),
        }
    }
}

/// Client origin after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardedOrigin {
    pub client_address: IpAddr,
    pub scheme: Scheme,
}

/// Rewrites the transport origin from `X-Forwarded-*` headers of trusted peers.
#[derive(Debug, Clone)]
pub struct ForwardedHeaderNormalizer {
    enabled: bool,
    forward_for: bool,
    forward_proto: bool,
    trust: ProxyTrust,
}

impl ForwardedHeaderNormalizer {
    pub fn new(trust: ProxyTrust) -> Self {
        Self {
            enabled: true,
            forward_for: true,
            forward_proto: true,
            trust,
        }
    }

    pub fn from_config(config: &ForwardedHeadersConfig) -> Self {
        let trust = if config.trust_all_proxies {
            ProxyTrust::All
        } else {
            ProxyTrust::Listed(config.trusted_proxies.clone())
        };
        Self {
            enabled: config.enabled,
            forward_for: config.forward_for,
            forward_proto: config.forward_proto,
            trust,
        }
    }

    pub fn trust(&self) -> &ProxyTrust {
        &self.trust
    }

    /// Resolve the effective client address and scheme for a request.
    pub fn normalize(&self, peer: IpAddr, scheme: Scheme, headers: &HeaderMap) -> ForwardedOrigin {
        let mut origin = ForwardedOrigin {
            client_address: peer,
            scheme,
        };

        if !self.enabled || !self.trust.trusts(peer) {
            return origin;
        }

        if self.forward_for {
            if let Some(address) = leftmost_address(headers) {
                origin.client_address = address;
            }
        }

        if self.forward_proto {
            if let Some(scheme) = leftmost_scheme(headers) {
                origin.scheme = scheme;
            }
        }

        origin
    }
}

fn leftmost_entry<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    let value = headers.get(name)?.to_str().ok()?;
    value.split(',').map(str::trim).next()
}

fn leftmost_address(headers: &HeaderMap) -> Option<IpAddr> {
    parse_address(leftmost_entry(headers, &X_FORWARDED_FOR)?)
}

fn leftmost_scheme(headers: &HeaderMap) -> Option<Scheme> {
    Scheme::parse(leftmost_entry(headers, &X_FORWARDED_PROTO)?)
}

/// Accepts `1.2.3.4`, `1.2.3.4:port`, `::1` and `[::1]:port`.
fn parse_address(entry: &str) -> Option<IpAddr> {
    if let Ok(address) = entry.parse::<IpAddr>() {
        return Some(address);
    }
    if let Ok(socket) = entry.parse::<SocketAddr>() {
        return Some(socket.ip());
    }
    entry
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|inner| inner.parse().ok())
}

/// Compare addresses, treating IPv4-mapped IPv6 as its IPv4 form.
fn same_address(a: IpAddr, b: IpAddr) -> bool {
    a.to_canonical() == b.to_canonical()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append((*name).clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn peer() -> IpAddr {
        "10.0.0.2".parse().unwrap()
    }

    #[test]
    fn test_leftmost_forwarded_values_win() {
        let normalizer = ForwardedHeaderNormalizer::new(ProxyTrust::All);
        let headers = headers(&[
            (&X_FORWARDED_FOR, "203.0.113.7, 10.0.0.1"),
            (&X_FORWARDED_PROTO, "https, http"),
        ]);

        let origin = normalizer.normalize(peer(), Scheme::Http, &headers);
        assert_eq!(origin.client_address, "203.0.113.7".parse::<IpAddr>().unwrap());
        assert_eq!(origin.scheme, Scheme::Https);
    }

    #[test]
    fn test_missing_headers_keep_transport_values() {
        let normalizer = ForwardedHeaderNormalizer::new(ProxyTrust::All);
        let origin = normalizer.normalize(peer(), Scheme::Http, &HeaderMap::new());
        assert_eq!(origin.client_address, peer());
        assert_eq!(origin.scheme, Scheme::Http);
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let normalizer = ForwardedHeaderNormalizer::new(ProxyTrust::All);
        let headers = headers(&[(&X_FORWARDED_FOR, "garbage"), (&X_FORWARDED_PROTO, "gopher")]);

        let origin = normalizer.normalize(peer(), Scheme::Http, &headers);
        assert_eq!(origin.client_address, peer());
        assert_eq!(origin.scheme, Scheme::Http);
    }

    #[test]
    fn test_address_with_port() {
        assert_eq!(parse_address("203.0.113.7:4711"), "203.0.113.7".parse().ok());
        assert_eq!(parse_address("[2001:db8::1]:443"), "2001:db8::1".parse().ok());
        assert_eq!(parse_address("[2001:db8::1]"), "2001:db8::1".parse().ok());
    }

    #[test]
    fn test_untrusted_peer_is_ignored() {
        let normalizer =
            ForwardedHeaderNormalizer::new(ProxyTrust::Listed(vec!["10.0.0.1".parse().unwrap()]));
        let headers = headers(&[(&X_FORWARDED_FOR, "203.0.113.7")]);

        let untrusted = normalizer.normalize(peer(), Scheme::Http, &headers);
        assert_eq!(untrusted.client_address, peer());

        let trusted = normalizer.normalize("10.0.0.1".parse().unwrap(), Scheme::Http, &headers);
        assert_eq!(trusted.client_address, "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_mapped_ipv6_peer_matches_ipv4_proxy() {
        let trust = ProxyTrust::Listed(vec!["10.0.0.1".parse().unwrap()]);
        assert!(trust.trusts("::ffff:10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_disabled_normalizer_is_a_no_op() {
        let config = ForwardedHeadersConfig {
            enabled: false,
            ..ForwardedHeadersConfig::default()
        };
        let normalizer = ForwardedHeaderNormalizer::from_config(&config);
        let headers = headers(&[(&X_FORWARDED_FOR, "203.0.113.7")]);

        assert_eq!(normalizer.normalize(peer(), Scheme::Http, &headers).client_address, peer());
    }
}
