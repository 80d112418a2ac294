// Each integration test file is a separate binary; helpers not used in every
// binary would otherwise trigger dead_code warnings from clippy.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

use sharecard_server::{
    check::{Checker, FetchError, FetchedPage, PageFetcher},
    models::ErrorKind,
    state::AppState,
    store::MemoryStore,
    usage::UsageLimiter,
};

/// A page with Open Graph title and a well-sized image, but no description
/// and no `twitter:card`.
pub const EXAMPLE_HTML: &str = r#"<!doctype html>
<html>
<head>
  <title>Example Domain</title>
  <meta property="og:title" content="Example Domain">
  <meta property="og:image" content="/og.png">
  <meta property="og:image:width" content="1200">
  <meta property="og:image:height" content="630">
</head>
<body><h1>Example Domain</h1></body>
</html>"#;

// ── Stub fetcher ─────────────────────────────────────────────────────────────

enum StubResponse {
    Html(String),
    Fail(ErrorKind),
}

/// In-memory [`PageFetcher`] that records every URL it is asked for.
pub struct StubFetcher {
    response: StubResponse,
    seen: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn html(html: &str) -> Arc<Self> {
        Arc::new(StubFetcher {
            response: StubResponse::Html(html.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(kind: ErrorKind) -> Arc<Self> {
        Arc::new(StubFetcher {
            response: StubResponse::Fail(kind),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.seen.lock().unwrap().push(url.to_string());
        match &self.response {
            StubResponse::Html(html) => Ok(FetchedPage {
                html: html.clone(),
                final_url: url.clone(),
                status: 200,
                elapsed_ms: 7,
                truncated: false,
                charset: "UTF-8",
            }),
            StubResponse::Fail(kind) => Err(FetchError::new(*kind, format!("stub {kind}"), 3)),
        }
    }
}

// ── App construction ─────────────────────────────────────────────────────────

/// Application state around `fetcher`, trusting `X-Forwarded-For` so tests
/// can pick the caller identity.
pub fn test_state(fetcher: Arc<StubFetcher>) -> (AppState, MemoryStore) {
    let store = MemoryStore::new();
    let state = AppState {
        checker: Checker::new(fetcher),
        store: Arc::new(store.clone()),
        usage: UsageLimiter::new(),
        trust_proxy: true,
    };
    (state, store)
}

/// Build the full application router around a stub fetcher.
pub fn create_test_app(fetcher: Arc<StubFetcher>) -> (Router, MemoryStore) {
    let (state, store) = test_state(fetcher);
    (sharecard_server::router(state), store)
}

// ── Request helpers ──────────────────────────────────────────────────────────

pub async fn post_json(app: Router, uri: &str, client: &str, body: Value) -> Response {
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("x-forwarded-for", client)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn get(app: Router, uri: &str, client: &str) -> Response {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

/// Status, headers and JSON body of a response (`Null` if not JSON).
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

async fn send(app: Router, req: Request<Body>) -> Response {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Response {
        status,
        headers,
        body,
    }
}

// ── Scenario helpers ─────────────────────────────────────────────────────────

/// POST /check for `url` as `client` and assert it was admitted.
pub async fn check_ok(app: Router, client: &str, url: &str) -> Value {
    let response = post_json(app, "/check", client, serde_json::json!({ "url": url })).await;
    assert_eq!(
        response.status,
        StatusCode::OK,
        "check failed: {}",
        response.body
    );
    response.body
}
