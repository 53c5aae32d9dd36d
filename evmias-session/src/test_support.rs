//! Fake portal shared by the session tests.

use evmias_core::{CacheSettings, Credentials, HttpSettings, Settings, UpstreamSettings};
use evmias_fetch::RawResponse;
use evmias_fetch::testing::MockTransport;
use serde_json::json;

pub(crate) fn settings() -> Settings {
    Settings {
        upstream: UpstreamSettings {
            base_url: "https://portal.example/".to_string(),
            origin: "https://portal.example".to_string(),
            referer: "https://portal.example/?c=promed".to_string(),
            module_base: None,
            search_period_start: None,
        },
        credentials: Credentials {
            login: "doctor".to_string(),
            password: "s3cret".to_string(),
            secret: "7|0|4|opaque".to_string(),
            permutation: "PERM123".to_string(),
        },
        cache: CacheSettings::default(),
        http: HttpSettings::default(),
    }
}

/// How the fake portal answers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PortalBehavior {
    pub handshake_status: u16,
    pub logon_body: &'static str,
    pub dispatch_status: u16,
    pub probe_status: u16,
    pub probe_json: bool,
}

impl Default for PortalBehavior {
    fn default() -> Self {
        Self {
            handshake_status: 200,
            logon_body: r#"{"success": true}"#,
            dispatch_status: 200,
            probe_status: 200,
            probe_json: true,
        }
    }
}

pub(crate) fn portal(behavior: PortalBehavior) -> MockTransport {
    MockTransport::new(move |request| {
        let route = (request.query_value("c"), request.query_value("m"));
        let response = match route {
            (Some("portal"), Some("promed")) => {
                RawResponse::new(behavior.handshake_status).with_cookie("PHPSESSID", "handshake")
            }
            (Some("main"), Some("index")) => {
                RawResponse::text(200, "text/html", behavior.logon_body).with_cookie("AUTH", "logon")
            }
            (Some("Common"), Some("getCurrentDateTime")) => {
                if behavior.probe_json {
                    RawResponse::json(behavior.probe_status, &json!({"date": "18.10.2026"}))
                } else {
                    RawResponse::text(behavior.probe_status, "text/html", "<html>login</html>")
                }
            }
            _ if request.url().ends_with("dispatch.servlet") => {
                RawResponse::new(behavior.dispatch_status).with_cookie("JSESSIONID", "token")
            }
            _ => RawResponse::new(404),
        };
        Ok(response)
    })
}
