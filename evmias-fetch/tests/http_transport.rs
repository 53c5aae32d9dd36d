//! Fetch client against a real local HTTP server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use evmias_core::{CookieSet, HttpSettings};
use evmias_fetch::{FetchClient, FetchError, FetchRequest, RetryPolicy};

async fn flaky(State(hits): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
        (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response()
    } else {
        Json(json!({"ok": true})).into_response()
    }
}

async fn logon() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::SET_COOKIE, "PHPSESSID=abc123; Path=/; HttpOnly"),
        ],
        r#"{"success": true}"#,
    )
}

async fn echo(
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    Json(json!({
        "query": query,
        "cookie": header_value(header::COOKIE),
        "origin": header_value(header::ORIGIN),
        "body": body,
    }))
}

async fn missing() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nope")
}

async fn start_server() -> (SocketAddr, Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/flaky", get(flaky))
        .route("/logon", post(logon))
        .route("/echo", post(echo))
        .route("/missing", get(missing))
        .with_state(hits.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits, handle)
}

fn fast_client() -> FetchClient {
    FetchClient::from_settings(&HttpSettings::default())
        .unwrap()
        .with_retry_policy(
            RetryPolicy::new(5).with_delays(Duration::from_millis(10), Duration::from_millis(20)),
        )
}

#[tokio::test]
async fn test_retries_until_server_recovers() {
    let (addr, hits, _handle) = start_server().await;

    let result = fast_client()
        .fetch(FetchRequest::get(format!("http://{addr}/flaky")))
        .await
        .unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(result.json, Some(json!({"ok": true})));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_set_cookie_and_html_json_are_decoded() {
    let (addr, _hits, _handle) = start_server().await;

    let result = fast_client()
        .fetch(FetchRequest::post(format!("http://{addr}/logon")).raise_for_status(false))
        .await
        .unwrap();

    assert_eq!(result.cookies.get("PHPSESSID"), Some("abc123"));
    assert_eq!(result.json, Some(json!({"success": true})));
}

#[tokio::test]
async fn test_query_form_cookies_and_headers_are_sent() {
    let (addr, _hits, _handle) = start_server().await;
    let cookies: CookieSet = [("PHPSESSID", "abc"), ("login", "doctor")].into_iter().collect();

    let result = fast_client()
        .fetch(
            FetchRequest::post(format!("http://{addr}/echo"))
                .controller("Common", "loadPersonData")
                .header("Origin", "https://portal.example")
                .form([("Person_id", "42"), ("LoadShort", "True")])
                .cookies(&cookies),
        )
        .await
        .unwrap();

    let echoed = result.json.unwrap();
    assert_eq!(echoed["query"]["c"], "Common");
    assert_eq!(echoed["query"]["m"], "loadPersonData");
    assert_eq!(echoed["origin"], "https://portal.example");
    assert_eq!(echoed["cookie"], "PHPSESSID=abc; login=doctor");
    assert_eq!(echoed["body"], "Person_id=42&LoadShort=True");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (addr, _hits, _handle) = start_server().await;

    let err = fast_client()
        .fetch(FetchRequest::get(format!("http://{addr}/missing")))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_connection_refused_exhausts_budget() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fast_client()
        .with_retry_policy(
            RetryPolicy::new(2).with_delays(Duration::from_millis(5), Duration::from_millis(5)),
        )
        .fetch(FetchRequest::get(format!("http://{addr}/")))
        .await
        .unwrap_err();

    match err {
        FetchError::Exhausted { attempts, source, .. } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*source, FetchError::Transport { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
