use std::any::Any;
use std::time::Duration;

use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::content::ContentError;
use crate::middleware::rate_limit_headers;
use crate::rate_limit::RateDecision;

/// 键值存储错误
///
/// 只在存储实现与适配器/限流器之间传递，不会到达请求方。
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] redis::RedisError),
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug)]
pub enum AppError {
    NotFound(&'static str),
    BadRequest(String),
    RateLimited(RateDecision),
    Internal(String),
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound(what) => AppError::NotFound(what),
            ContentError::Invalid(reason) => AppError::BadRequest(reason),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitedBody {
    error: &'static str,
    message: &'static str,
    retry_after: u64,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::RateLimited(decision) => return rate_limited_response(&decision),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            AppError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason),
            AppError::Internal(reason) => {
                tracing::error!("internal error: {}", reason);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message,
        });

        (status, body).into_response()
    }
}

/// 处理函数 panic 时的响应，配合 `CatchPanicLayer` 使用
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let reason = if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };
    AppError::Internal(reason).into_response()
}

/// 429 响应，所有数值都来自同一次限流判定
fn rate_limited_response(decision: &RateDecision) -> Response {
    let body = Json(RateLimitedBody {
        error: "Too many requests",
        message: "Rate limit exceeded. Please try again later.",
        retry_after: decision.retry_after_secs,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    rate_limit_headers(response.headers_mut(), decision, true);
    response
}
