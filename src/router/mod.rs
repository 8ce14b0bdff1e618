//! 路由系统模块
//!
//! 根据请求的模型名解析上游 Provider 家族与出站目标。
//!
//! 路由规则：
//! - 支持通配符模式匹配（精确、前缀、后缀、包含）
//! - 精确规则优先，其余按优先级排序
//! - 支持按 Provider 排除模型

mod rules;
mod target;

pub use rules::{pattern_matches, RouteResult, Router, RoutingRule};
pub use target::ProviderTarget;
