//! 配置类型定义

use crate::converter::NormalizerPolicy;
use crate::injection::InjectionConfig;
use crate::router::RoutingRule;
use crate::ProviderFamily;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// 网关配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub network: NetworkConfig,
    pub credential: CredentialConfig,
    pub routing: RoutingConfig,
    pub injection: InjectionConfig,
    pub groups: GroupsConfig,
}

/// 监听配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 请求体大小上限（字节）
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            body_limit_bytes: 32 * 1024 * 1024,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别，可被 `RUST_LOG` 覆盖
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// 出站网络配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// 出站代理 URL
    pub proxy: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// 流式响应两次读取之间的最长间隔（毫秒），0 表示不限制
    pub stream_idle_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout_secs: 30,
            request_timeout_secs: 600,
            stream_idle_timeout_ms: 0,
        }
    }
}

impl NetworkConfig {
    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        if self.stream_idle_timeout_ms > 0 {
            Some(Duration::from_millis(self.stream_idle_timeout_ms))
        } else {
            None
        }
    }
}

/// 会话凭证交换配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// 交换得到的令牌缓存时长（秒）
    pub ttl_secs: u64,
    pub token_endpoint: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 15 * 60,
            token_endpoint: "https://api.github.com/copilot_internal/v2/token".to_string(),
        }
    }
}

impl CredentialConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// 路由配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub default_provider: ProviderFamily,
    /// 是否加载内置规则表
    pub builtin_rules: bool,
    pub rules: Vec<RoutingRule>,
    /// Provider -> 排除的模型模式
    pub exclusions: HashMap<ProviderFamily, Vec<String>>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderFamily::OpenAI,
            builtin_rules: true,
            rules: Vec::new(),
            exclusions: HashMap::new(),
        }
    }
}

/// 出站鉴权方案
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    Basic,
    Bearer,
    /// `token <value>`
    GithubToken,
    /// 用调用方令牌换取会话令牌后以 Bearer 发送
    SessionExchange,
}

/// 请求体处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyMode {
    /// 规范化并注入参数后重新序列化
    Rewrite,
    /// 原样转发调用方请求体
    Relay,
}

/// 响应处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// 上游返回信封：非流式整形为 chat.completion，流式重新包装为标准 chunk
    Envelope,
    /// 上游已是 OpenAI 格式：流式只做分帧，非流式原样返回
    OpenAi,
    /// 原样转发字节
    Relay,
}

/// Embeddings 批量输入处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    /// 数组输入拆分为并发子请求
    FanOut,
    /// 整体转发
    Single,
}

/// 上游分组配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProfile {
    /// 入站路径前缀
    pub name: String,
    pub base_url: String,
    pub chat_path: String,
    #[serde(default)]
    pub embeddings_path: Option<String>,
    pub auth: AuthScheme,
    pub body_mode: BodyMode,
    pub response_mode: ResponseMode,
    #[serde(default = "default_embedding_mode")]
    pub embedding_mode: EmbeddingMode,
    /// 是否发送 `X-Ai-Engine` 头
    #[serde(default)]
    pub send_engine_tag: bool,
    /// 是否附带请求 ID、会话 ID、机器 ID 头
    #[serde(default)]
    pub identity_headers: bool,
    #[serde(default)]
    pub normalizer: NormalizerPolicy,
    /// 流式事件中 delta 的 JSON Pointer
    #[serde(default = "default_delta_pointer")]
    pub delta_pointer: String,
    /// 固定附加的请求头
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_embedding_mode() -> EmbeddingMode {
    EmbeddingMode::Single
}

fn default_delta_pointer() -> String {
    "/choices/0/delta".to_string()
}

impl GroupProfile {
    pub fn chat_url(&self) -> String {
        join_url(&self.base_url, &self.chat_path)
    }

    pub fn embeddings_url(&self) -> Option<String> {
        self.embeddings_path
            .as_deref()
            .map(|path| join_url(&self.base_url, path))
    }

    /// 使用 Basic 鉴权、返回信封格式的分组
    pub fn patgpt(base_url: &str) -> Self {
        Self {
            name: "patgpt".to_string(),
            base_url: base_url.to_string(),
            chat_path: "/compute/openai_chatgpt_turbo".to_string(),
            embeddings_path: Some("/compute/openai_embeddings".to_string()),
            auth: AuthScheme::Basic,
            body_mode: BodyMode::Rewrite,
            response_mode: ResponseMode::Envelope,
            embedding_mode: EmbeddingMode::FanOut,
            send_engine_tag: true,
            identity_headers: false,
            normalizer: NormalizerPolicy::default(),
            delta_pointer: default_delta_pointer(),
            headers: BTreeMap::new(),
        }
    }

    /// 使用 Bearer 鉴权、返回 OpenAI 格式的分组
    pub fn patgpt_new(base_url: &str) -> Self {
        Self {
            name: "patgpt_new".to_string(),
            base_url: base_url.to_string(),
            chat_path: "/v1/chat/completions".to_string(),
            embeddings_path: Some("/v1/embeddings".to_string()),
            auth: AuthScheme::Bearer,
            body_mode: BodyMode::Rewrite,
            response_mode: ResponseMode::OpenAi,
            embedding_mode: EmbeddingMode::Single,
            send_engine_tag: true,
            identity_headers: false,
            normalizer: NormalizerPolicy {
                repair_turn_order: true,
                ..NormalizerPolicy::default()
            },
            delta_pointer: default_delta_pointer(),
            headers: BTreeMap::new(),
        }
    }

    /// 会话令牌交换后原样转发的分组
    pub fn copilot() -> Self {
        let headers = [
            ("X-Github-Api-Version", "2023-07-07"),
            ("Editor-Version", "vscode/1.85.0"),
            ("Editor-Plugin-Version", "copilot-chat/0.11.1"),
            ("Openai-Organization", "github-copilot"),
            ("Openai-Intent", "conversation-panel"),
            ("User-Agent", "GitHubCopilotChat/0.11.1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            name: "copilot".to_string(),
            base_url: "https://api.githubcopilot.com".to_string(),
            chat_path: "/chat/completions".to_string(),
            embeddings_path: None,
            auth: AuthScheme::SessionExchange,
            body_mode: BodyMode::Relay,
            response_mode: ResponseMode::Relay,
            embedding_mode: EmbeddingMode::Single,
            send_engine_tag: false,
            identity_headers: true,
            normalizer: NormalizerPolicy::default(),
            delta_pointer: default_delta_pointer(),
            headers,
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// 分组配置列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupsConfig(pub Vec<GroupProfile>);

/// 默认上游地址
pub const DEFAULT_PAT_URL: &str = "https://pat-api.minws.com";

impl Default for GroupsConfig {
    fn default() -> Self {
        Self(vec![
            GroupProfile::patgpt(DEFAULT_PAT_URL),
            GroupProfile::patgpt_new(DEFAULT_PAT_URL),
            GroupProfile::copilot(),
        ])
    }
}

impl GroupsConfig {
    pub fn get(&self, name: &str) -> Option<&GroupProfile> {
        self.0.iter().find(|g| g.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupProfile> {
        self.0.iter()
    }
}
