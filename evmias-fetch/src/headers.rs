//! Browser-like header set sent with every upstream request.

use evmias_core::UpstreamSettings;

/// User agent the portal is known to accept.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:140.0) Gecko/20100101 Firefox/140.0";

/// Content type of the GWT RPC token exchange.
pub const GWT_RPC_CONTENT_TYPE: &str = "text/x-gwt-rpc; charset=utf-8";

/// Returns the header pairs that make a request look like the portal's own
/// XHR traffic.
pub fn browser_headers(upstream: &UpstreamSettings) -> Vec<(String, String)> {
    [
        ("Origin", upstream.origin.as_str()),
        ("Referer", upstream.referer.as_str()),
        ("X-Requested-With", "XMLHttpRequest"),
        ("User-Agent", USER_AGENT),
        ("Accept", "*/*"),
        ("Sec-Fetch-Dest", "empty"),
        ("Sec-Fetch-Mode", "cors"),
        ("Sec-Fetch-Site", "same-origin"),
        ("Priority", "u=0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_and_referer_come_from_settings() {
        let upstream = UpstreamSettings {
            base_url: "https://portal.example/".to_string(),
            origin: "https://portal.example".to_string(),
            referer: "https://portal.example/?c=promed".to_string(),
            module_base: None,
            search_period_start: None,
        };
        let headers = browser_headers(&upstream);

        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("Origin"), Some("https://portal.example"));
        assert_eq!(get("Referer"), Some("https://portal.example/?c=promed"));
        assert_eq!(get("X-Requested-With"), Some("XMLHttpRequest"));
        assert_eq!(get("User-Agent"), Some(USER_AGENT));
    }
}
