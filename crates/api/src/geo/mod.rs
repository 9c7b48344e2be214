//! Approximate request-origin geography.
//!
//! - [`GeoResolver`] -- resolves a caller IP to a city and `"lat,lon"` string.
//! - [`GeoCache`] -- time-bounded memo of lookups, owned by the resolver.
//! - [`GeoLookup`] / [`HttpGeoLookup`] -- the external lookup service.
//! - [`client_ip`] -- picks the caller address out of a request.
//!
//! Geo data only enriches session records. Every failure here is absorbed
//! by the caller, which substitutes placeholder values.

pub mod cache;
pub mod lookup;
pub mod resolver;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::HeaderMap;

pub use cache::{GeoCache, GeoCacheEntry};
pub use lookup::{GeoLookup, HttpGeoLookup};
pub use resolver::GeoResolver;

/// A resolved location.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// Free-text `"lat,lon"` form stored on sessions.
    pub fn location_string(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

/// Errors from resolving a caller address.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    /// The caller address could not be parsed as an IP.
    #[error("Not an IP address: {0}")]
    InvalidAddress(String),

    /// Loopback, private, and similar addresses have no public location.
    #[error("Address {0} is not publicly routable")]
    NotRoutable(IpAddr),

    /// The HTTP request itself failed (network, DNS, TLS, timeout, body).
    #[error("Geo lookup request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The lookup service returned a non-2xx status code.
    #[error("Geo lookup service returned status {status}")]
    Status { status: u16 },

    /// The lookup service answered but could not locate the address.
    #[error("Geo lookup rejected: {0}")]
    Rejected(String),
}

/// Determine the caller's IP address.
///
/// Order: first hop of `X-Forwarded-For`, then `X-Real-IP`, then the
/// socket peer address. Returns `None` when none of them is available.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Parse `ip` and reject addresses that cannot have a public location.
pub(crate) fn routable_ip(ip: &str) -> Result<IpAddr, GeoError> {
    let addr: IpAddr = ip
        .parse()
        .map_err(|_| GeoError::InvalidAddress(ip.to_string()))?;

    let private = match addr {
        IpAddr::V4(v4) => private_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => private_v4(v4),
            None => {
                v6.is_loopback()
                    || v6.is_unspecified()
                    // fc00::/7 unique local, fe80::/10 link local
                    || (v6.segments()[0] & 0xfe00) == 0xfc00
                    || (v6.segments()[0] & 0xffc0) == 0xfe80
            }
        },
    };

    if private {
        Err(GeoError::NotRoutable(addr))
    } else {
        Ok(addr)
    }
}

fn private_v4(v4: Ipv4Addr) -> bool {
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local()
        || v4.is_unspecified()
        || v4.is_broadcast()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("203.0.113.9:51000".parse().unwrap())
    }

    #[test]
    fn forwarded_for_first_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(client_ip(&headers, peer()).as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn real_ip_is_second_choice() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(client_ip(&headers, peer()).as_deref(), Some("5.6.7.8"));
    }

    #[test]
    fn falls_back_to_peer_address() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer()).as_deref(), Some("203.0.113.9"));
        assert_eq!(client_ip(&headers, None), None);
    }

    #[test]
    fn empty_forwarded_for_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        assert_eq!(client_ip(&headers, peer()).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn private_addresses_are_not_routable() {
        for ip in ["127.0.0.1", "10.1.2.3", "192.168.0.10", "::1", "fd00::1", "fe80::1"] {
            assert_matches!(routable_ip(ip), Err(GeoError::NotRoutable(_)), "{ip}");
        }
        assert_matches!(routable_ip("nonsense"), Err(GeoError::InvalidAddress(_)));
        assert!(routable_ip("1.2.3.4").is_ok());
        assert!(routable_ip("2001:4860:4860::8888").is_ok());
    }

    #[test]
    fn ipv4_mapped_addresses_follow_the_ipv4_rules() {
        for ip in ["::ffff:10.0.0.1", "::ffff:127.0.0.1", "::ffff:192.168.1.20"] {
            assert_matches!(routable_ip(ip), Err(GeoError::NotRoutable(_)), "{ip}");
        }
        assert!(routable_ip("::ffff:1.2.3.4").is_ok());
    }

    #[test]
    fn location_string_is_lat_comma_lon() {
        let loc = GeoLocation {
            city: "Berlin".into(),
            country: "Germany".into(),
            latitude: 52.52,
            longitude: 13.405,
        };
        assert_eq!(loc.location_string(), "52.52,13.405");
    }
}
