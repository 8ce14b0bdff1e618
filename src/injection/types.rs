//! 参数注入类型定义

use crate::router::pattern_matches;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// 注入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionMode {
    /// 仅补充请求中不存在的参数
    #[default]
    Merge,
    /// 覆盖请求中已有的参数
    Override,
}

/// 注入规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionRule {
    /// 规则 ID
    pub id: String,
    /// 模型模式（支持通配符）
    pub pattern: String,
    /// 要注入的参数（JSON 对象）
    pub parameters: Value,
    #[serde(default)]
    pub mode: InjectionMode,
    /// 优先级（数字越小优先级越高）
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_priority() -> i32 {
    100
}

fn default_enabled() -> bool {
    true
}

impl InjectionRule {
    pub fn new(id: &str, pattern: &str, parameters: Value) -> Self {
        Self {
            id: id.to_string(),
            pattern: pattern.to_string(),
            parameters,
            mode: InjectionMode::Merge,
            priority: default_priority(),
            enabled: true,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_mode(mut self, mode: InjectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn matches(&self, model: &str) -> bool {
        self.enabled && pattern_matches(&self.pattern, model)
    }

    pub fn is_exact(&self) -> bool {
        !self.pattern.contains('*')
    }
}

impl Ord for InjectionRule {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.is_exact(), other.is_exact()) {
            (true, false) => return std::cmp::Ordering::Less,
            (false, true) => return std::cmp::Ordering::Greater,
            _ => {}
        }
        self.priority.cmp(&other.priority)
    }
}

impl PartialOrd for InjectionRule {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for InjectionRule {}

/// 注入结果
#[derive(Debug, Clone, Default)]
pub struct InjectionResult {
    /// 实际生效的规则 ID
    pub applied_rules: Vec<String>,
    /// 被写入的参数名
    pub injected_params: Vec<String>,
}

impl InjectionResult {
    pub fn has_injections(&self) -> bool {
        !self.injected_params.is_empty()
    }
}

/// 注入配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    pub enabled: bool,
    /// 内置规则之外的附加规则
    pub rules: Vec<InjectionRule>,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: Vec::new(),
        }
    }
}

/// 参数注入器
///
/// 作用于序列化后的出站 JSON，调用方的请求对象不受影响。
#[derive(Debug, Clone, Default)]
pub struct Injector {
    rules: Vec<InjectionRule>,
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置采样参数覆盖规则
    pub fn builtin_rules() -> Vec<InjectionRule> {
        vec![
            InjectionRule::new(
                "seekgpt-sampling",
                "seekgpt-*",
                json!({"temperature": 1, "top_p": 0.75}),
            )
            .with_mode(InjectionMode::Override)
            .with_priority(10),
            InjectionRule::new(
                "deepseek-sampling",
                "deepseek-*",
                json!({"temperature": 1, "top_p": 1}),
            )
            .with_mode(InjectionMode::Override)
            .with_priority(20),
        ]
    }

    /// 内置规则加上配置中的附加规则
    pub fn from_config(config: &InjectionConfig) -> Self {
        let mut injector = Self::new();
        if !config.enabled {
            return injector;
        }
        for rule in Self::builtin_rules().into_iter().chain(config.rules.iter().cloned()) {
            injector.add_rule(rule);
        }
        injector
    }

    pub fn add_rule(&mut self, rule: InjectionRule) {
        self.rules.push(rule);
        self.rules.sort();
    }

    pub fn rules(&self) -> &[InjectionRule] {
        &self.rules
    }

    pub fn matching_rules(&self, model: &str) -> Vec<&InjectionRule> {
        self.rules.iter().filter(|r| r.matches(model)).collect()
    }

    /// 对请求 JSON 注入参数
    ///
    /// 规则按优先级依次应用；同一参数只由优先级最高的规则写入一次。
    pub fn inject(&self, model: &str, payload: &mut Value) -> InjectionResult {
        let mut result = InjectionResult::default();
        let Some(target) = payload.as_object_mut() else {
            return result;
        };

        for rule in self.matching_rules(model) {
            let Some(params) = rule.parameters.as_object() else {
                continue;
            };

            let mut applied = false;
            for (key, value) in params {
                if result.injected_params.contains(key) {
                    continue;
                }
                if rule.mode == InjectionMode::Merge && target.contains_key(key) {
                    continue;
                }
                target.insert(key.clone(), value.clone());
                result.injected_params.push(key.clone());
                applied = true;
            }

            if applied {
                result.applied_rules.push(rule.id.clone());
            }
        }

        result
    }
}
