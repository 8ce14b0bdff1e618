//! 鉴权头转换
//!
//! 调用方以 `Authorization`（或 `X-Authorization`）提供凭证，
//! 按上游要求的方案改写后转发。

use axum::http::HeaderMap;

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const X_AUTHORIZATION_HEADER: &str = "x-authorization";

/// 读取调用方凭证，`Authorization` 优先
pub fn caller_credential(headers: &HeaderMap) -> String {
    [AUTHORIZATION_HEADER, X_AUTHORIZATION_HEADER]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// 去掉 `Bearer` 前缀
pub fn strip_bearer(credential: &str) -> String {
    credential
        .trim()
        .strip_prefix("Bearer")
        .unwrap_or(credential.trim())
        .trim()
        .to_string()
}

/// 以 `Bearer` 方案表示
pub fn to_bearer(credential: &str) -> String {
    let credential = credential.trim();
    if credential.starts_with("Bearer") {
        credential.to_string()
    } else {
        format!("Bearer {}", credential)
    }
}

/// 以 `Basic` 方案表示，`Bearer` 前缀被替换
pub fn to_basic(credential: &str) -> String {
    with_scheme(credential, "Basic")
}

/// 以 `token` 方案表示，`Bearer` 前缀被替换
pub fn to_github_token(credential: &str) -> String {
    with_scheme(credential, "token")
}

fn with_scheme(credential: &str, scheme: &str) -> String {
    let credential = credential.trim();
    let replaced = match credential.strip_prefix("Bearer") {
        Some(rest) => format!("{}{}", scheme, rest),
        None => credential.to_string(),
    };

    if replaced.starts_with(scheme) {
        replaced
    } else {
        format!("{} {}", scheme, replaced)
    }
}
