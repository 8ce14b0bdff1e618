use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 上游 Provider 家族
///
/// 序列化值即为出站请求中的引擎标签（`X-Ai-Engine`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    OpenAI,
    Azure,
    Anthropic,
    Google,
    Patsnap,
    Deepseek,
}

impl ProviderFamily {
    pub const ALL: [ProviderFamily; 6] = [
        ProviderFamily::OpenAI,
        ProviderFamily::Azure,
        ProviderFamily::Anthropic,
        ProviderFamily::Google,
        ProviderFamily::Patsnap,
        ProviderFamily::Deepseek,
    ];

    /// 引擎标签
    pub fn engine_tag(&self) -> &'static str {
        match self {
            ProviderFamily::OpenAI => "openai",
            ProviderFamily::Azure => "azure",
            ProviderFamily::Anthropic => "anthropic",
            ProviderFamily::Google => "google",
            ProviderFamily::Patsnap => "patsnap",
            ProviderFamily::Deepseek => "deepseek",
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.engine_tag())
    }
}

impl FromStr for ProviderFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderFamily::ALL
            .into_iter()
            .find(|p| p.engine_tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("未知的 Provider: {s}"))
    }
}
