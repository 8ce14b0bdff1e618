//! 路由规则
//!
//! 提供模型路由规则定义和匹配功能

use crate::ProviderFamily;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 路由规则 - 定义模型到 Provider 家族的路由
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingRule {
    /// 模型模式（支持通配符）
    pub pattern: String,
    /// 目标 Provider
    pub target_provider: ProviderFamily,
    /// 优先级（数字越小优先级越高）
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// 是否启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_priority() -> i32 {
    50
}

fn default_enabled() -> bool {
    true
}

impl RoutingRule {
    /// 创建新的路由规则
    pub fn new(pattern: &str, target_provider: ProviderFamily, priority: i32) -> Self {
        Self {
            pattern: pattern.to_string(),
            target_provider,
            priority,
            enabled: true,
        }
    }

    /// 检查模型是否匹配此规则
    pub fn matches(&self, model: &str) -> bool {
        self.enabled && pattern_matches(&self.pattern, model)
    }

    /// 检查是否为精确匹配规则
    pub fn is_exact(&self) -> bool {
        !self.pattern.contains('*')
    }
}

/// 路由规则比较器 - 用于排序
impl Ord for RoutingRule {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // 首先按精确匹配优先
        match (self.is_exact(), other.is_exact()) {
            (true, false) => return std::cmp::Ordering::Less,
            (false, true) => return std::cmp::Ordering::Greater,
            _ => {}
        }
        // 然后按优先级排序
        self.priority.cmp(&other.priority)
    }
}

impl PartialOrd for RoutingRule {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for RoutingRule {}

/// 检查模式是否匹配模型名
///
/// 支持的通配符模式：
/// - 精确匹配: `gpt-4o`
/// - 前缀匹配: `claude-*`
/// - 后缀匹配: `*-preview`
/// - 包含匹配: `*flash*`
/// - 前缀+后缀匹配: `claude-*-preview`
pub fn pattern_matches(pattern: &str, model: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == model;
    }

    let parts: Vec<&str> = pattern.split('*').collect();

    match parts.as_slice() {
        [prefix, ""] => model.starts_with(prefix),
        ["", suffix] => model.ends_with(suffix),
        ["", middle, ""] => model.contains(middle),
        [prefix, suffix] => {
            model.len() >= prefix.len() + suffix.len()
                && model.starts_with(prefix)
                && model.ends_with(suffix)
        }
        // 其他复杂模式暂不支持
        _ => false,
    }
}

/// 路由结果
#[derive(Debug, Clone)]
pub struct RouteResult {
    /// 目标 Provider
    pub provider: ProviderFamily,
    /// 匹配的规则（如果有）
    pub matched_rule: Option<RoutingRule>,
    /// 是否使用默认 Provider
    pub is_default: bool,
}

/// 路由器 - 根据模型名路由到 Provider 家族
///
/// 规则表是模型到 Provider 映射的唯一来源：引擎标签头和请求体整形
/// 都使用同一次 `route` 的结果。
#[derive(Debug, Clone)]
pub struct Router {
    /// 路由规则列表（已排序）
    rules: Vec<RoutingRule>,
    /// 默认 Provider
    default_provider: ProviderFamily,
    /// 排除列表：Provider -> 排除的模型模式列表
    exclusions: HashMap<ProviderFamily, Vec<String>>,
}

impl Router {
    /// 创建新的路由器
    pub fn new(default_provider: ProviderFamily) -> Self {
        Self {
            rules: Vec::new(),
            default_provider,
            exclusions: HashMap::new(),
        }
    }

    /// 从规则列表创建路由器
    pub fn with_rules(default_provider: ProviderFamily, mut rules: Vec<RoutingRule>) -> Self {
        // 稳定排序，同优先级保持声明顺序
        rules.sort();
        Self {
            rules,
            default_provider,
            exclusions: HashMap::new(),
        }
    }

    /// 内置规则表
    pub fn builtin_rules() -> Vec<RoutingRule> {
        vec![
            RoutingRule::new("gpt-4o", ProviderFamily::Azure, 10),
            RoutingRule::new("gpt-3.5-turbo", ProviderFamily::Azure, 10),
            RoutingRule::new("gpt-4", ProviderFamily::Azure, 10),
            RoutingRule::new("claude-*", ProviderFamily::Anthropic, 20),
            RoutingRule::new("gemini-*", ProviderFamily::Google, 20),
            RoutingRule::new("patent-*", ProviderFamily::Patsnap, 20),
            RoutingRule::new("seekgpt-*", ProviderFamily::Patsnap, 20),
            RoutingRule::new("deepseek-*", ProviderFamily::Deepseek, 20),
        ]
    }

    /// 使用内置规则表创建路由器，未匹配的模型落到 OpenAI
    pub fn with_builtin_rules() -> Self {
        Self::with_rules(ProviderFamily::OpenAI, Self::builtin_rules())
    }

    /// 添加路由规则
    pub fn add_rule(&mut self, rule: RoutingRule) {
        self.rules.push(rule);
        self.rules.sort();
    }

    /// 获取所有规则
    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// 获取默认 Provider
    pub fn default_provider(&self) -> ProviderFamily {
        self.default_provider
    }

    /// 添加排除模式
    pub fn add_exclusion(&mut self, provider: ProviderFamily, pattern: &str) {
        self.exclusions
            .entry(provider)
            .or_default()
            .push(pattern.to_string());
    }

    /// 检查模型是否被排除
    pub fn is_excluded(&self, provider: ProviderFamily, model: &str) -> bool {
        self.exclusions
            .get(&provider)
            .map(|patterns| patterns.iter().any(|p| pattern_matches(p, model)))
            .unwrap_or(false)
    }

    /// 路由请求到 Provider
    ///
    /// 按以下优先级匹配：
    /// 1. 精确匹配规则优先于通配符规则
    /// 2. 同类型规则按 priority 数值排序（数字越小优先级越高）
    /// 3. 如果匹配的 Provider 排除了该模型，继续尝试下一个规则
    /// 4. 如果没有匹配的规则，使用默认 Provider
    pub fn route(&self, model: &str) -> RouteResult {
        for rule in &self.rules {
            if rule.matches(model) && !self.is_excluded(rule.target_provider, model) {
                return RouteResult {
                    provider: rule.target_provider,
                    matched_rule: Some(rule.clone()),
                    is_default: false,
                };
            }
        }

        RouteResult {
            provider: self.default_provider,
            matched_rule: None,
            is_default: true,
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::with_builtin_rules()
    }
}
