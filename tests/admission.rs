use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use nexus_admission::{
    Services,
    cache::{KvStore, MemoryStore, models::WindowCount},
    config::{Config, RateLimitBackendKind},
    content::MemoryContentRepository,
    error::StoreError,
    rate_limit::FailMode,
};
use serde_json::{Value, json};
use tower::ServiceExt;

/// 模拟宕机的存储
struct DownStore;

fn down() -> StoreError {
    StoreError::Backend("connection refused".to_string())
}

#[async_trait]
impl KvStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(down())
    }

    async fn set_ex(&self, _key: &str, _value: String, _ttl: u64) -> Result<(), StoreError> {
        Err(down())
    }

    async fn increment_window(&self, _key: &str, _limit: u64, _ttl: u64) -> Result<WindowCount, StoreError> {
        Err(down())
    }

    async fn scan_keys(&self, _pattern: &str) -> Result<Vec<String>, StoreError> {
        Err(down())
    }

    async fn delete_keys(&self, _keys: &[String]) -> Result<usize, StoreError> {
        Err(down())
    }
}

fn config(limit: u32) -> Config {
    Config {
        rate_limit_requests: limit,
        // 一小时的窗口，测试期间不会跨窗口
        rate_limit_window_ms: 3_600_000,
        ..Config::default()
    }
}

fn app_with(config: Config, store: Arc<dyn KvStore>) -> Router {
    Services::from_parts(config, store, Arc::new(MemoryContentRepository::new())).router()
}

fn app(limit: u32) -> Router {
    app_with(config(limit), Arc::new(MemoryStore::new()))
}

fn request(method: Method, uri: &str, client: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", client);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers()[name].to_str().unwrap()
}

#[tokio::test]
async fn fourth_request_in_window_is_rejected() {
    let app = app(3);

    for expected_remaining in ["2", "1", "0"] {
        let response = send(&app, request(Method::GET, "/api/health", "203.0.113.7", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "x-ratelimit-limit"), "3");
        assert_eq!(header_str(&response, "x-ratelimit-remaining"), expected_remaining);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    let response = send(&app, request(Method::GET, "/api/health", "203.0.113.7", None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_str(&response, "x-ratelimit-remaining"), "0");
    assert_eq!(header_str(&response, "x-frame-options"), "DENY");

    let retry_after: u64 = header_str(&response, "retry-after").parse().unwrap();
    assert!((1..=3600).contains(&retry_after));
    let reset: i64 = header_str(&response, "x-ratelimit-reset").parse().unwrap();
    assert!(reset > chrono::Utc::now().timestamp());

    let body = json_body(response).await;
    assert_eq!(body["error"], "Too many requests");
    assert_eq!(body["retryAfter"], retry_after);
    assert!(body["message"].is_string());

    // 其他客户端不受影响
    let response = send(&app, request(Method::GET, "/api/health", "198.51.100.2", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn paths_outside_the_api_are_never_limited() {
    let app = app(1);

    for _ in 0..3 {
        let response = send(&app, request(Method::GET, "/static/app.css", "203.0.113.7", None)).await;
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
        assert_eq!(header_str(&response, "x-content-type-options"), "nosniff");
        assert_eq!(
            header_str(&response, "cache-control"),
            "public, max-age=31536000, immutable"
        );
    }

    let response = send(&app, request(Method::GET, "/about", "203.0.113.7", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(header_str(&response, "referrer-policy"), "strict-origin-when-cross-origin");
    assert!(response.headers().get("cache-control").is_none());
}

#[tokio::test]
async fn store_outage_fails_open_by_default() {
    let app = app_with(config(2), Arc::new(DownStore));

    for _ in 0..5 {
        let response = send(&app, request(Method::GET, "/api/health", "203.0.113.7", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "x-ratelimit-remaining"), "2");
    }

    // 缓存不可用时内容接口照常工作
    let response = send(
        &app,
        request(
            Method::POST,
            "/api/posts",
            "203.0.113.8",
            Some(json!({ "title": "Outage Post", "content": "still served", "published": true })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, request(Method::GET, "/api/posts/outage-post", "203.0.113.9", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["content"]["title"], "Outage Post");
}

#[tokio::test]
async fn store_outage_can_fail_closed() {
    let config = Config {
        rate_limit_fail_mode: FailMode::Closed,
        ..config(2)
    };
    let app = app_with(config, Arc::new(DownStore));

    let response = send(&app, request(Method::GET, "/api/health", "203.0.113.7", None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn local_backend_limits_without_the_store() {
    let config = Config {
        rate_limit_backend: RateLimitBackendKind::Local,
        ..config(1)
    };
    let app = app_with(config, Arc::new(DownStore));

    let first = send(&app, request(Method::GET, "/api/health", "203.0.113.7", None)).await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = send(&app, request(Method::GET, "/api/health", "203.0.113.7", None)).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn writes_through_the_api_invalidate_cached_reads() {
    let app = app(100);
    let client = "203.0.113.7";

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/posts",
            client,
            Some(json!({ "title": "Hello World", "content": "first", "published": true })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["content"]["slug"], "hello-world");

    // 读一次，结果进入缓存
    let response = send(&app, request(Method::GET, "/api/posts/hello-world", client, None)).await;
    assert_eq!(json_body(response).await["content"]["content"], "first");
    let response = send(&app, request(Method::GET, "/api/posts?published=true", client, None)).await;
    assert_eq!(json_body(response).await["content"].as_array().unwrap().len(), 1);

    let response = send(
        &app,
        request(
            Method::PUT,
            "/api/posts/hello-world",
            client,
            Some(json!({ "title": "Goodbye World", "content": "second" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, request(Method::GET, "/api/posts/hello-world", client, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, request(Method::GET, "/api/posts/goodbye-world", client, None)).await;
    assert_eq!(json_body(response).await["content"]["content"], "second");

    let response = send(&app, request(Method::GET, "/api/posts?published=true", client, None)).await;
    let listed = json_body(response).await;
    assert_eq!(listed["content"][0]["title"], "Goodbye World");
}

#[tokio::test]
async fn trending_and_categories_round_out_the_api() {
    let app = app(100);
    let client = "203.0.113.7";

    let response = send(
        &app,
        request(Method::POST, "/api/categories", client, Some(json!({ "name": "Rust" }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let category_id = json_body(response).await["content"]["id"].clone();

    for title in ["Alpha", "Beta"] {
        send(
            &app,
            request(
                Method::POST,
                "/api/posts",
                client,
                Some(json!({
                    "title": title,
                    "content": "body",
                    "published": true,
                    "categoryIds": [category_id],
                })),
            ),
        )
        .await;
    }

    let response = send(&app, request(Method::POST, "/api/posts/alpha/views", client, None)).await;
    assert_eq!(json_body(response).await["content"]["views"], 1);

    let response = send(&app, request(Method::GET, "/api/posts/trending?limit=1", client, None)).await;
    let trending = json_body(response).await;
    assert_eq!(trending["content"].as_array().unwrap().len(), 1);
    assert_eq!(trending["content"][0]["slug"], "alpha");

    let response = send(&app, request(Method::GET, "/api/categories/rust", client, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // 删除分类前先把单篇文章读进缓存
    let response = send(&app, request(Method::GET, "/api/posts/beta", client, None)).await;
    let post = json_body(response).await;
    assert_eq!(post["content"]["categories"][0]["slug"], "rust");

    let response = send(&app, request(Method::DELETE, "/api/categories/rust", client, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, request(Method::GET, "/api/posts/beta", client, None)).await;
    let post = json_body(response).await;
    assert!(post["content"]["categories"].as_array().unwrap().is_empty());

    let response = send(&app, request(Method::GET, "/api/nope", client, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], 404);
}
