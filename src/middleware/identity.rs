use std::net::IpAddr;

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// 限流用的客户端标识，每个请求现算，只出现在窗口键里
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdentity {
    Ip(String),
    /// 会话令牌的摘要，不把原始令牌写进存储
    Session(String),
    Anonymous,
}

impl ClientIdentity {
    /// 依次尝试 x-forwarded-for 的第一个地址、x-real-ip、cf-connecting-ip、
    /// x-session-id，再退到连接的对端地址，最后归入 anonymous
    pub fn resolve(headers: &HeaderMap, peer: Option<IpAddr>) -> Self {
        if let Some(ip) = header_str(headers, "x-forwarded-for")
            .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        {
            return Self::Ip(ip.to_string());
        }

        if let Some(ip) = header_str(headers, "x-real-ip").or_else(|| header_str(headers, "cf-connecting-ip")) {
            return Self::Ip(ip.to_string());
        }

        if let Some(session) = header_str(headers, "x-session-id") {
            return Self::Session(digest(session));
        }

        match peer {
            Some(ip) => Self::Ip(ip.to_string()),
            None => Self::Anonymous,
        }
    }

    pub fn fingerprint(&self) -> String {
        match self {
            ClientIdentity::Ip(ip) => format!("ip:{}", ip),
            ClientIdentity::Session(hash) => format!("session:{}", hash),
            ClientIdentity::Anonymous => "anonymous".to_string(),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// 前 16 个十六进制字符足够区分会话
fn digest(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn forwarded_for_wins_and_uses_first_hop() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(ClientIdentity::resolve(&h, None), ClientIdentity::Ip("203.0.113.7".into()));
    }

    #[test]
    fn empty_forwarded_for_falls_through() {
        let h = headers(&[("x-forwarded-for", " , "), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(ClientIdentity::resolve(&h, None).fingerprint(), "ip:198.51.100.2");
    }

    #[test]
    fn proxy_header_before_session() {
        let h = headers(&[("cf-connecting-ip", "192.0.2.9"), ("x-session-id", "abc")]);
        assert_eq!(ClientIdentity::resolve(&h, None).fingerprint(), "ip:192.0.2.9");
    }

    #[test]
    fn session_token_is_hashed() {
        let h = headers(&[("x-session-id", "super-secret-token")]);
        let fingerprint = ClientIdentity::resolve(&h, None).fingerprint();
        assert!(fingerprint.starts_with("session:"));
        assert_eq!(fingerprint.len(), "session:".len() + 16);
        assert!(!fingerprint.contains("super-secret"));
    }

    #[test]
    fn peer_then_anonymous() {
        let peer: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(ClientIdentity::resolve(&HeaderMap::new(), Some(peer)).fingerprint(), "ip:127.0.0.1");
        assert_eq!(ClientIdentity::resolve(&HeaderMap::new(), None), ClientIdentity::Anonymous);
        assert_eq!(ClientIdentity::Anonymous.fingerprint(), "anonymous");
    }
}
