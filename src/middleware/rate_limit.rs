use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;

use super::identity::ClientIdentity;
use super::security::apply_security_headers;
use crate::config::Config;
use crate::error::AppError;
use crate::rate_limit::{RateDecision, RateLimiter};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// 请求准入：API 路径限流，所有响应加安全头
pub struct Admission {
    limiter: Arc<RateLimiter>,
    limit: u32,
    window_ms: u64,
    api_prefix: String,
    static_prefix: String,
}

impl Admission {
    pub fn new(limiter: Arc<RateLimiter>, config: &Config) -> Self {
        Self {
            limiter,
            limit: config.rate_limit_requests,
            window_ms: config.rate_limit_window_ms,
            api_prefix: config.api_prefix.clone(),
            static_prefix: config.static_prefix.clone(),
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// 前缀形如 "/api/"，"/api" 本身也算
    pub fn applies_to(&self, path: &str) -> bool {
        path.starts_with(&self.api_prefix) || path == self.api_prefix.trim_end_matches('/')
    }

    pub async fn check_rate_limit(&self, req: Request<Body>, next: Next) -> Response {
        let path = req.uri().path().to_string();

        if !self.applies_to(&path) {
            counter!("admission_requests_total", "outcome" => "bypass").increment(1);
            let mut response = next.run(req).await;
            apply_security_headers(response.headers_mut(), &path, &self.static_prefix);
            return response;
        }

        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip());
        let identity = ClientIdentity::resolve(req.headers(), peer).fingerprint();

        let decision = self
            .limiter
            .check_and_increment(&identity, self.limit, self.window_ms)
            .await;

        let mut response = if decision.admitted {
            counter!("admission_requests_total", "outcome" => "admitted").increment(1);
            let mut response = next.run(req).await;
            rate_limit_headers(response.headers_mut(), &decision, false);
            response
        } else {
            counter!("admission_requests_total", "outcome" => "rejected").increment(1);
            counter!("admission_rate_limited_total").increment(1);
            tracing::debug!(identity, path, "rate limit exceeded");
            AppError::RateLimited(decision).into_response()
        };

        apply_security_headers(response.headers_mut(), &path, &self.static_prefix);
        response
    }
}

/// 写入 X-RateLimit-*，拒绝时再加 Retry-After
pub fn rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision, retry_after: bool) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at_epoch_secs()));
    if retry_after {
        headers.insert(RETRY_AFTER, HeaderValue::from(decision.retry_after_secs));
    }
}

pub async fn rate_limit(
    State(admission): State<Arc<Admission>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    admission.check_rate_limit(req, next).await
}
