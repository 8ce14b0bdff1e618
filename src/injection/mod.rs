//! 参数注入模块
//!
//! 在请求分发前对出站 JSON 注入或覆盖采样参数：
//! - 模型通配符匹配规则
//! - merge 和 override 两种注入模式
//! - 规则优先级排序

mod types;

pub use types::{InjectionConfig, InjectionMode, InjectionResult, InjectionRule, Injector};
