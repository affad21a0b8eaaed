//! Client IP extraction for view and read-progress events
//!
//! Proxy headers are only honored when the configured trust mode says so;
//! otherwise the socket address is used.

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{AnalyticsConfig, TrustedProxyMode};

/// Extract the client IP address according to the trust configuration
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: IpAddr,
    config: &AnalyticsConfig,
) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => extract_forwarded_ip(headers)
            .or_else(|| extract_from_x_forwarded_for(headers, config.num_trusted_proxies))
            .unwrap_or(socket_addr),
        TrustedProxyMode::None => socket_addr,
    }
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// First `for=` parameter of an RFC 7239 Forwarded header
fn extract_forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers.get("forwarded")?.to_str().ok()?;

    forwarded
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|param| param.trim().strip_prefix("for="))
        .find_map(parse_forwarded_node)
}

/// Parse `192.0.2.60`, `"192.0.2.60:4711"` or `"[2001:db8::1]:4711"`
fn parse_forwarded_node(value: &str) -> Option<IpAddr> {
    let value = value.trim_matches('"');
    if let Some(rest) = value.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    value.split(':').next()?.parse().ok()
}

/// X-Forwarded-For, skipping `num_trusted` proxy hops from the right
fn extract_from_x_forwarded_for(headers: &HeaderMap, num_trusted: Option<usize>) -> Option<IpAddr> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    let ips: Vec<IpAddr> = xff
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    match num_trusted {
        Some(n) if ips.len() > n => Some(ips[ips.len() - n - 1]),
        // Chain shorter than the trusted hop count: take the least trusted entry
        Some(_) => ips.first().copied(),
        None => ips.last().copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(mode: TrustedProxyMode, num_trusted_proxies: Option<usize>) -> AnalyticsConfig {
        AnalyticsConfig {
            trusted_proxy_mode: mode,
            num_trusted_proxies,
        }
    }

    fn socket() -> IpAddr {
        "192.168.1.1".parse().unwrap()
    }

    #[test]
    fn test_none_mode_ignores_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let ip = extract_client_ip(&headers, socket(), &config(TrustedProxyMode::None, None));
        assert_eq!(ip, socket());
    }

    #[test]
    fn test_cloudflare_header() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.1"));
        let cfg = config(TrustedProxyMode::Cloudflare, None);
        assert_eq!(
            extract_client_ip(&headers, socket(), &cfg),
            "203.0.113.1".parse::<IpAddr>().unwrap()
        );
        assert_eq!(extract_client_ip(&HeaderMap::new(), socket(), &cfg), socket());
    }

    #[test]
    fn test_x_forwarded_for_rightmost_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        let ip = extract_client_ip(&headers, socket(), &config(TrustedProxyMode::Standard, None));
        assert_eq!(ip, "198.51.100.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_x_forwarded_for_skips_trusted_hops() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1, 10.0.0.2"),
        );
        let ip = extract_client_ip(&headers, socket(), &config(TrustedProxyMode::Standard, Some(1)));
        assert_eq!(ip, "198.51.100.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_forwarded_header_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "forwarded",
            HeaderValue::from_static("for=\"[2001:db8::1]:4711\";proto=https"),
        );
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let ip = extract_client_ip(&headers, socket(), &config(TrustedProxyMode::Standard, None));
        assert_eq!(ip, "2001:db8::1".parse::<IpAddr>().unwrap());
    }
}
