use axum::http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{CACHE_CONTROL, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION},
};

const SECURITY_HEADERS: [(HeaderName, &str); 4] = [
    (X_FRAME_OPTIONS, "DENY"),
    (X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (X_XSS_PROTECTION, "1; mode=block"),
];

const STATIC_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// 固定的安全响应头；静态资源额外加长期缓存
pub fn apply_security_headers(headers: &mut HeaderMap, path: &str, static_prefix: &str) {
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }

    if path.starts_with(static_prefix) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(STATIC_CACHE_CONTROL));
    }
}
