//! Session acquisition protocol.
//!
//! Three strictly sequential steps build a cookie set from nothing:
//!
//! 1. **Handshake**: anonymous `GET` of the portal entry page.
//! 2. **Logon**: credentials posted with the handshake cookies.
//! 3. **Token exchange**: the pre-shared secret posted to the GWT dispatch
//!    servlet.
//!
//! Each step starts from the cookies gathered so far and merges in the
//! cookies of its response. Any failure aborts the whole acquisition.

use evmias_core::{CookieSet, Credentials, UpstreamSettings};
use evmias_fetch::{
    FetchClient, FetchRequest, FetchResult, GWT_RPC_CONTENT_TYPE, browser_headers,
};
use std::fmt;
use tracing::{debug, error, info, instrument};

use crate::error::SessionError;

/// Body marker of a successful logon.
const LOGON_SUCCESS_MARKER: &str = "true";

/// Path of the GWT dispatch servlet, relative to the base URL.
const DISPATCH_SERVLET_PATH: &str = "ermp/servlets/dispatch.servlet";

// ============================================================================
// States
// ============================================================================

/// A protocol step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolStep {
    /// Anonymous portal handshake.
    Handshake,
    /// Credentialed logon.
    Logon,
    /// Secondary token exchange.
    TokenExchange,
}

impl fmt::Display for ProtocolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Handshake => "handshake",
            Self::Logon => "logon",
            Self::TokenExchange => "token exchange",
        })
    }
}

/// Where an acquisition stands, with the cookies collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Nothing collected yet.
    Anon,
    /// Handshake cookies collected.
    Authenticated(CookieSet),
    /// Logon accepted.
    Finalized(CookieSet),
    /// Complete cookie set.
    Ready(CookieSet),
}

impl AcquisitionState {
    /// Step that leaves this state, or `None` once ready.
    pub fn next_step(&self) -> Option<ProtocolStep> {
        match self {
            Self::Anon => Some(ProtocolStep::Handshake),
            Self::Authenticated(_) => Some(ProtocolStep::Logon),
            Self::Finalized(_) => Some(ProtocolStep::TokenExchange),
            Self::Ready(_) => None,
        }
    }
}

// ============================================================================
// Protocol
// ============================================================================

/// Runs the acquisition steps against the upstream portal.
#[derive(Debug, Clone)]
pub struct AcquisitionProtocol {
    client: FetchClient,
    upstream: UpstreamSettings,
    credentials: Credentials,
}

impl AcquisitionProtocol {
    /// Creates a protocol runner.
    pub fn new(client: FetchClient, upstream: UpstreamSettings, credentials: Credentials) -> Self {
        Self {
            client,
            upstream,
            credentials,
        }
    }

    /// Runs all steps and returns the complete cookie set.
    #[instrument(skip(self), fields(login = %self.credentials.login))]
    pub async fn acquire(&self) -> Result<CookieSet, SessionError> {
        info!("Acquiring new session");
        let mut state = AcquisitionState::Anon;
        loop {
            state = match self.advance(state).await {
                Ok(AcquisitionState::Ready(cookies)) => {
                    info!(cookies = cookies.len(), "Session acquired");
                    return Ok(cookies);
                }
                Ok(next) => next,
                Err(e) => {
                    error!(error = %e, "Session acquisition failed");
                    return Err(e);
                }
            };
        }
    }

    /// Performs the single step leaving `state`.
    pub async fn advance(&self, state: AcquisitionState) -> Result<AcquisitionState, SessionError> {
        Ok(match state {
            AcquisitionState::Anon => AcquisitionState::Authenticated(self.handshake().await?),
            AcquisitionState::Authenticated(cookies) => {
                AcquisitionState::Finalized(self.logon(&cookies).await?)
            }
            AcquisitionState::Finalized(cookies) => {
                AcquisitionState::Ready(self.exchange_token(&cookies).await?)
            }
            ready @ AcquisitionState::Ready(_) => ready,
        })
    }

    async fn handshake(&self) -> Result<CookieSet, SessionError> {
        let step = ProtocolStep::Handshake;
        let request = self
            .request(FetchRequest::get(&self.upstream.base_url))
            .controller("portal", "promed")
            .query("from", "promed");
        let response = self.execute(step, request).await?;

        if !response.is_success() {
            return Err(rejected(step, &response));
        }
        debug!(cookies = response.cookies.len(), "Handshake complete");
        Ok(response.cookies)
    }

    async fn logon(&self, cookies: &CookieSet) -> Result<CookieSet, SessionError> {
        let step = ProtocolStep::Logon;
        let login = self.credentials.login.as_str();
        let request = self
            .request(FetchRequest::post(&self.upstream.base_url))
            .controller("main", "index")
            .query("method", "Logon")
            .query("login", login)
            .form([
                ("login", login),
                ("psw", self.credentials.password.as_str()),
                ("swUserRegion", ""),
                ("swUserDBType", ""),
            ])
            .cookies(cookies);
        let response = self.execute(step, request).await?;

        if response.status != 200 || !response.text.contains(LOGON_SUCCESS_MARKER) {
            return Err(rejected(step, &response));
        }

        let mut next = cookies.clone();
        next.insert("login", login);
        next.merge(&response.cookies);
        debug!(cookies = next.len(), "Logon accepted");
        Ok(next)
    }

    async fn exchange_token(&self, cookies: &CookieSet) -> Result<CookieSet, SessionError> {
        let step = ProtocolStep::TokenExchange;
        let request = self
            .request(FetchRequest::post(self.upstream.endpoint(DISPATCH_SERVLET_PATH)))
            .header("Content-Type", GWT_RPC_CONTENT_TYPE)
            .header("X-Gwt-Permutation", self.credentials.permutation.as_str())
            .header("X-Gwt-Module-Base", self.upstream.module_base())
            .raw_body(self.credentials.secret.as_str())
            .cookies(cookies);
        let response = self.execute(step, request).await?;

        if !response.is_success() {
            return Err(rejected(step, &response));
        }
        let next = cookies.merged(&response.cookies);
        debug!(cookies = next.len(), "Token exchange complete");
        Ok(next)
    }

    fn request(&self, request: FetchRequest) -> FetchRequest {
        request
            .headers(browser_headers(&self.upstream))
            .raise_for_status(false)
    }

    async fn execute(
        &self,
        step: ProtocolStep,
        request: FetchRequest,
    ) -> Result<FetchResult, SessionError> {
        debug!(%step, "Running acquisition step");
        self.client
            .fetch(request)
            .await
            .map_err(|source| SessionError::Upstream { step, source })
    }
}

fn rejected(step: ProtocolStep, response: &FetchResult) -> SessionError {
    let body: String = response.text.chars().take(100).collect();
    SessionError::Authentication {
        step,
        reason: format!("status {}, body {body:?}", response.status),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{PortalBehavior, portal, settings};
    use evmias_fetch::{RetryPolicy, testing::MockTransport};
    use std::sync::Arc;

    fn protocol(transport: &Arc<MockTransport>) -> AcquisitionProtocol {
        let settings = settings();
        AcquisitionProtocol::new(
            FetchClient::new(transport.clone()).with_retry_policy(RetryPolicy::no_retry()),
            settings.upstream,
            settings.credentials,
        )
    }

    #[tokio::test]
    async fn test_steps_run_in_order_and_merge_cookies() {
        let transport = Arc::new(portal(PortalBehavior::default()));
        let cookies = protocol(&transport).acquire().await.unwrap();

        assert_eq!(
            transport.endpoints(),
            vec![
                "portal/promed".to_string(),
                "main/index".to_string(),
                "https://portal.example/ermp/servlets/dispatch.servlet".to_string(),
            ]
        );
        assert_eq!(cookies.get("PHPSESSID"), Some("handshake"));
        assert_eq!(cookies.get("login"), Some("doctor"));
        assert_eq!(cookies.get("AUTH"), Some("logon"));
        assert_eq!(cookies.get("JSESSIONID"), Some("token"));
    }

    #[tokio::test]
    async fn test_each_step_sends_accumulated_cookies() {
        let transport = Arc::new(portal(PortalBehavior::default()));
        protocol(&transport).acquire().await.unwrap();

        let calls = transport.calls();
        assert!(calls[0].request.cookie_set().is_empty());

        let logon = &calls[1].request;
        assert_eq!(logon.cookie_set().get("PHPSESSID"), Some("handshake"));
        assert_eq!(logon.query_value("method"), Some("Logon"));
        assert_eq!(logon.query_value("login"), Some("doctor"));
        assert_eq!(logon.form_value("psw"), Some("s3cret"));
        assert_eq!(logon.form_value("swUserRegion"), Some(""));

        let exchange = &calls[2].request;
        assert_eq!(exchange.cookie_set().get("login"), Some("doctor"));
        assert_eq!(exchange.cookie_set().get("AUTH"), Some("logon"));
        assert_eq!(exchange.header_value("x-gwt-permutation"), Some("PERM123"));
        assert_eq!(
            exchange.header_value("X-Gwt-Module-Base"),
            Some("https://portal.example/ermp/")
        );
        assert_eq!(exchange.header_value("content-type"), Some(GWT_RPC_CONTENT_TYPE));
        assert_eq!(
            exchange.body(),
            &evmias_fetch::RequestBody::Raw("7|0|4|opaque".to_string())
        );
    }

    #[tokio::test]
    async fn test_every_step_carries_browser_headers() {
        let transport = Arc::new(portal(PortalBehavior::default()));
        protocol(&transport).acquire().await.unwrap();

        for call in transport.calls() {
            assert_eq!(call.request.header_value("Origin"), Some("https://portal.example"));
            assert_eq!(call.request.header_value("X-Requested-With"), Some("XMLHttpRequest"));
            assert!(!call.request.raises_for_status());
        }
    }

    #[tokio::test]
    async fn test_logon_without_marker_is_authentication_error() {
        let transport = Arc::new(portal(PortalBehavior {
            logon_body: r#"{"success": false}"#,
            ..PortalBehavior::default()
        }));

        let err = protocol(&transport).acquire().await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Authentication {
                step: ProtocolStep::Logon,
                ..
            }
        ));
        // Token exchange never ran.
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_handshake_failure_aborts() {
        let transport = Arc::new(portal(PortalBehavior {
            handshake_status: 403,
            ..PortalBehavior::default()
        }));

        let err = protocol(&transport).acquire().await.unwrap_err();

        assert_eq!(err.step(), Some(ProtocolStep::Handshake));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_token_exchange_failure() {
        let transport = Arc::new(portal(PortalBehavior {
            dispatch_status: 400,
            ..PortalBehavior::default()
        }));

        let err = protocol(&transport).acquire().await.unwrap_err();
        assert_eq!(err.step(), Some(ProtocolStep::TokenExchange));
    }

    #[tokio::test]
    async fn test_advance_is_one_step() {
        let transport = Arc::new(portal(PortalBehavior::default()));
        let protocol = protocol(&transport);

        let state = protocol.advance(AcquisitionState::Anon).await.unwrap();
        assert_eq!(state.next_step(), Some(ProtocolStep::Logon));
        assert_eq!(transport.call_count(), 1);

        let ready = AcquisitionState::Ready(CookieSet::new());
        assert_eq!(protocol.advance(ready.clone()).await.unwrap(), ready);
        assert_eq!(transport.call_count(), 1);
    }
}
