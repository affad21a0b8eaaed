//! Traffic source classification for view events

use std::borrow::Cow;
use url::Url;

pub const DIRECT: &str = "direct";

/// Classify a referrer into a traffic source key.
///
/// Returns the referrer's network location (host plus optional port) exactly as
/// written, or `"direct"` when the referrer is missing, empty, unparsable, or has
/// no host. Protocol-relative referrers (`//host/path`) carry a network location
/// too.
pub fn classify_referrer(referrer: Option<&str>) -> String {
    let Some(raw) = referrer.map(str::trim).filter(|r| !r.is_empty()) else {
        return DIRECT.to_string();
    };

    let raw: Cow<'_, str> = if raw.starts_with("//") {
        Cow::Owned(format!("http:{raw}"))
    } else {
        Cow::Borrowed(raw)
    };

    let has_host = Url::parse(&raw)
        .ok()
        .and_then(|url| url.host_str().map(|h| !h.is_empty()))
        .unwrap_or(false);
    if !has_host {
        return DIRECT.to_string();
    }

    // `Url` lowercases and punycodes hosts, so the key is cut from the raw text.
    raw_netloc(&raw)
        .map(str::to_string)
        .unwrap_or_else(|| DIRECT.to_string())
}

/// The authority section between `scheme://` and the path, minus any userinfo
fn raw_netloc(raw: &str) -> Option<&str> {
    let (_, rest) = raw.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = authority
        .rsplit_once('@')
        .map(|(_, host)| host)
        .unwrap_or(authority);
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_or_empty_is_direct() {
        assert_eq!(classify_referrer(None), "direct");
        assert_eq!(classify_referrer(Some("")), "direct");
        assert_eq!(classify_referrer(Some("   ")), "direct");
    }

    #[test]
    fn test_extracts_host() {
        assert_eq!(
            classify_referrer(Some("https://news.example.com/x")),
            "news.example.com"
        );
        assert_eq!(
            classify_referrer(Some("http://t.co?utm=1")),
            "t.co"
        );
    }

    #[test]
    fn test_protocol_relative_referrer() {
        assert_eq!(
            classify_referrer(Some("//news.example.com/x")),
            "news.example.com"
        );
        assert_eq!(classify_referrer(Some("//Blog.Example.org:8080")), "Blog.Example.org:8080");
        assert_eq!(classify_referrer(Some("///path-only")), "direct");
    }

    #[test]
    fn test_unparsable_is_direct() {
        assert_eq!(classify_referrer(Some("not a url")), "direct");
        assert_eq!(classify_referrer(Some("news.example.com/x")), "direct");
        assert_eq!(classify_referrer(Some("mailto:someone@example.com")), "direct");
    }

    #[test]
    fn test_host_case_and_port_are_kept() {
        assert_eq!(
            classify_referrer(Some("HTTPS://News.Example.com:8443/a/b")),
            "News.Example.com:8443"
        );
        assert_eq!(
            classify_referrer(Some("https://user:pw@example.org/")),
            "example.org"
        );
    }
}
