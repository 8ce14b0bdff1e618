//! 路由目标
//!
//! 一次路由查询的结果，供引擎标签头与请求体整形共同使用。

use super::rules::{RouteResult, Router};
use crate::ProviderFamily;

/// 出站目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTarget {
    /// Provider 家族
    pub family: ProviderFamily,
    /// 引擎标签（`X-Ai-Engine` 头的值）
    pub engine_tag: String,
    /// 出站 URL
    pub endpoint_url: String,
}

impl ProviderTarget {
    pub fn new(route: &RouteResult, endpoint_url: impl Into<String>) -> Self {
        Self {
            family: route.provider,
            engine_tag: route.provider.engine_tag().to_string(),
            endpoint_url: endpoint_url.into(),
        }
    }
}

impl Router {
    /// 解析模型对应的出站目标
    pub fn resolve(&self, model: &str, endpoint_url: &str) -> ProviderTarget {
        let route = self.route(model);
        tracing::debug!(
            "[ROUTER] model={} provider={} default={}",
            model,
            route.provider,
            route.is_default
        );
        ProviderTarget::new(&route, endpoint_url)
    }
}
