//! 日志模块
//!
//! 初始化 tracing 订阅器，并提供日志脱敏工具。
use crate::config::LoggingConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// 级别取自配置，`RUST_LOG` 存在时优先。重复初始化时静默忽略。
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

static SANITIZE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        // Bearer / Basic / token 凭证
        (r"Bearer\s+[A-Za-z0-9._~+/=-]+", "Bearer ***"),
        (r"Basic\s+[A-Za-z0-9._~+/=-]+", "Basic ***"),
        (r"\btoken\s+[A-Za-z0-9._-]{8,}", "token ***"),
        // API key 各种格式
        (
            r#"api[_-]?key["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "api_key: ***",
        ),
        (
            r#"access[_-]?token["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "access_token: ***",
        ),
        (r#"token["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#, "token: ***"),
        (
            r#"[Aa]uthorization["']?\s*[:=]\s*["']?[A-Za-z0-9._\s-]+"#,
            "authorization: ***",
        ),
        (r#"password["']?\s*[:=]\s*["']?[^\s"',}]+"#, "password: ***"),
        (
            r#"secret["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "secret: ***",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// 日志脱敏
pub fn sanitize_log_message(message: &str) -> String {
    let mut sanitized = message.to_string();
    for (re, replacement) in SANITIZE_PATTERNS.iter() {
        sanitized = re.replace_all(&sanitized, *replacement).to_string();
    }
    sanitized
}

/// 调用方凭证的可记录形式：保留前 4 个字符
pub fn mask_credential(credential: &str) -> String {
    let raw = credential
        .trim()
        .trim_start_matches("Bearer")
        .trim_start_matches("Basic")
        .trim();

    if raw.is_empty() {
        return "<anonymous>".to_string();
    }

    let visible: String = raw.chars().take(4).collect();
    format!("{visible}***")
}
