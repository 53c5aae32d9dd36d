//! Shared fixtures for record tests.

use evmias_core::{CookieSet, UpstreamSettings};
use evmias_fetch::testing::MockTransport;
use evmias_fetch::{FetchClient, RetryPolicy};
use std::sync::Arc;

use crate::api::UpstreamApi;

pub(crate) fn api(transport: &Arc<MockTransport>) -> UpstreamApi {
    let client = FetchClient::new(transport.clone()).with_retry_policy(RetryPolicy::no_retry());
    UpstreamApi::new(
        client,
        UpstreamSettings {
            base_url: "https://portal.example/".to_string(),
            origin: "https://portal.example".to_string(),
            referer: "https://portal.example/?c=promed".to_string(),
            module_base: None,
            search_period_start: None,
        },
    )
}

pub(crate) fn cookies() -> CookieSet {
    [("PHPSESSID", "abc"), ("login", "doctor")].into_iter().collect()
}
