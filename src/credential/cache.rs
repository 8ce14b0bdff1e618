//! 会话令牌缓存
//!
//! 以调用方长期令牌为键缓存交换得到的短期令牌，超过 TTL 后重新交换。

use super::CredentialError;
use crate::config::CredentialConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// 令牌交换能力
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, session_token: &str) -> Result<String, CredentialError>;
}

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub fetched_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// 单个令牌的缓存槽，交换期间持有槽锁
type TokenSlot = Arc<Mutex<Option<CachedToken>>>;

/// 会话令牌缓存
///
/// 每个令牌一把锁：同一令牌不会被并发重复交换，不同令牌互不等待。
/// 新令牌入表时清理已过期且空闲的条目。
pub struct CredentialCache {
    entries: parking_lot::Mutex<HashMap<String, TokenSlot>>,
    ttl: Duration,
    exchanger: Arc<dyn TokenExchanger>,
}

impl CredentialCache {
    pub fn new(exchanger: Arc<dyn TokenExchanger>, ttl: Duration) -> Self {
        Self {
            entries: parking_lot::Mutex::new(HashMap::new()),
            ttl,
            exchanger,
        }
    }

    /// 获取短期令牌，缓存过期或缺失时重新交换
    pub async fn get_or_refresh(&self, session_token: &str) -> Result<String, CredentialError> {
        let key = session_token.trim();
        if key.is_empty() {
            return Err(CredentialError::EmptyCredential);
        }

        let slot = self.slot(key);
        let mut cached = slot.lock().await;
        if let Some(token) = cached.as_ref().filter(|c| c.is_fresh(self.ttl)) {
            return Ok(token.token.clone());
        }

        tracing::debug!("[CREDENTIAL] 会话令牌缓存未命中，重新交换");
        let token = self.exchanger.exchange(key).await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            fetched_at: Instant::now(),
        });
        Ok(token)
    }

    fn slot(&self, key: &str) -> TokenSlot {
        let mut entries = self.entries.lock();
        if let Some(slot) = entries.get(key) {
            return slot.clone();
        }

        let ttl = self.ttl;
        entries.retain(|_, slot| match slot.try_lock() {
            Ok(cached) => cached.as_ref().is_some_and(|c| c.is_fresh(ttl)),
            Err(_) => true,
        });

        let slot = TokenSlot::default();
        entries.insert(key.to_string(), slot.clone());
        slot
    }

    /// 移除某个令牌的缓存
    pub async fn invalidate(&self, session_token: &str) {
        self.entries.lock().remove(session_token.trim());
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// 基于 HTTP 的令牌交换
pub struct HttpTokenExchanger {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTokenExchanger {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &CredentialConfig) -> Self {
        Self::new(client, config.token_endpoint.clone())
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(&self, session_token: &str) -> Result<String, CredentialError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .header("authorization", format!("token {}", session_token))
            .header("editor-version", "vscode/1.85.0")
            .header("editor-plugin-version", "copilot-chat/0.11.1")
            .header("user-agent", "GitHubCopilotChat/0.11.1")
            .header("accept", "*/*")
            .send()
            .await
            .map_err(|e| CredentialError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!("[CREDENTIAL] 令牌交换失败: status={}", status);
            return Err(CredentialError::Status(status.as_u16()));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| CredentialError::Request(e.to_string()))?;
        body.token
            .filter(|t| !t.is_empty())
            .ok_or(CredentialError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingExchanger {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenExchanger for CountingExchanger {
        async fn exchange(&self, session_token: &str) -> Result<String, CredentialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{session_token}-short-{n}"))
        }
    }

    fn counting() -> Arc<CountingExchanger> {
        Arc::new(CountingExchanger {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let exchanger = counting();
        let cache = CredentialCache::new(exchanger.clone(), Duration::from_secs(900));

        let first = cache.get_or_refresh("ghu_abc").await.unwrap();
        let second = cache.get_or_refresh(" ghu_abc ").await.unwrap();

        assert_eq!(first, "ghu_abc-short-0");
        assert_eq!(first, second);
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refreshed() {
        let exchanger = counting();
        let cache = CredentialCache::new(exchanger.clone(), Duration::ZERO);

        let first = cache.get_or_refresh("ghu_abc").await.unwrap();
        let second = cache.get_or_refresh("ghu_abc").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_and_empty_token() {
        let exchanger = counting();
        let cache = CredentialCache::new(exchanger.clone(), Duration::from_secs(900));

        cache.get_or_refresh("ghu_abc").await.unwrap();
        cache.invalidate("ghu_abc").await;
        cache.get_or_refresh("ghu_abc").await.unwrap();
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 2);

        assert!(matches!(
            cache.get_or_refresh("  ").await,
            Err(CredentialError::EmptyCredential)
        ));
    }

    /// `slow` 令牌的交换一直挂起直到收到通知
    struct GatedExchanger {
        gate: tokio::sync::Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenExchanger for GatedExchanger {
        async fn exchange(&self, session_token: &str) -> Result<String, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if session_token == "slow" {
                self.gate.notified().await;
            }
            Ok(format!("{session_token}-short"))
        }
    }

    #[tokio::test]
    async fn test_slow_exchange_does_not_block_other_tokens() {
        let exchanger = Arc::new(GatedExchanger {
            gate: tokio::sync::Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(CredentialCache::new(
            exchanger.clone(),
            Duration::from_secs(900),
        ));

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_refresh("slow").await })
        };
        let slow_again = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_refresh("slow").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fast = tokio::time::timeout(Duration::from_secs(1), cache.get_or_refresh("fast"))
            .await
            .expect("other tokens must not wait for a pending exchange")
            .unwrap();
        assert_eq!(fast, "fast-short");

        exchanger.gate.notify_one();
        assert_eq!(slow.await.unwrap().unwrap(), "slow-short");
        assert_eq!(slow_again.await.unwrap().unwrap(), "slow-short");
        // slow 只交换一次，fast 一次
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_pruned_on_insert() {
        let exchanger = counting();
        let cache = CredentialCache::new(exchanger.clone(), Duration::ZERO);

        cache.get_or_refresh("ghu_a").await.unwrap();
        cache.get_or_refresh("ghu_b").await.unwrap();
        cache.get_or_refresh("ghu_c").await.unwrap();

        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_http_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/copilot_internal/v2/token"))
            .and(header("authorization", "token ghu_abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"token": "tid=1;exp=2"})),
            )
            .mount(&server)
            .await;

        let exchanger = HttpTokenExchanger::new(
            reqwest::Client::new(),
            format!("{}/copilot_internal/v2/token", server.uri()),
        );
        assert_eq!(exchanger.exchange("ghu_abc").await.unwrap(), "tid=1;exp=2");
    }

    #[tokio::test]
    async fn test_http_exchange_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let denied = HttpTokenExchanger::new(client.clone(), format!("{}/denied", server.uri()));
        assert!(matches!(
            denied.exchange("ghu_abc").await,
            Err(CredentialError::Status(401))
        ));

        let empty = HttpTokenExchanger::new(client, format!("{}/empty", server.uri()));
        assert!(matches!(
            empty.exchange("ghu_abc").await,
            Err(CredentialError::MissingToken)
        ));
    }
}
