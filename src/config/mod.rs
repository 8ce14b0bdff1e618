//! 配置模块
//!
//! 配置文件查找顺序：
//! 1. `CHATGATE_CONFIG` 指定的路径
//! 2. `~/.chatgate/config.yaml`
//! 3. 内置默认值
//!
//! 之后应用环境变量覆盖：`PORT`、`PROXY`、`PAT_URL`。

mod types;

pub use types::{
    AuthScheme, BodyMode, CredentialConfig, EmbeddingMode, GatewayConfig, GroupProfile,
    GroupsConfig, LoggingConfig, NetworkConfig, ResponseMode, RoutingConfig, ServerConfig,
    DEFAULT_PAT_URL,
};

use crate::router::Router;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path} 失败: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置文件 {path} 失败: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("无效的配置: {0}")]
    Invalid(String),
}

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "CHATGATE_CONFIG";

/// 默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".chatgate").join("config.yaml"))
}

impl GatewayConfig {
    /// 按查找顺序加载配置并应用环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// 从 YAML 文件加载
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// 应用环境变量覆盖
    ///
    /// `PAT_URL` 替换仍使用默认上游地址的分组的 base_url。
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = non_empty("PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }

        if let Some(proxy) = non_empty("PROXY") {
            self.network.proxy = Some(proxy);
        }

        if let Some(pat_url) = non_empty("PAT_URL") {
            for group in self.groups.0.iter_mut() {
                if group.base_url == DEFAULT_PAT_URL {
                    group.base_url = pat_url.clone();
                }
            }
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for group in self.groups.iter() {
            if group.name.is_empty() || group.name.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "分组名称不合法: {:?}",
                    group.name
                )));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(ConfigError::Invalid(format!("分组重复: {}", group.name)));
            }
            if !group.delta_pointer.is_empty() && !group.delta_pointer.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "分组 {} 的 delta_pointer 必须以 / 开头",
                    group.name
                )));
            }
        }
        Ok(())
    }

    /// 按路由配置构建路由器
    pub fn build_router(&self) -> Router {
        let mut rules = if self.routing.builtin_rules {
            Router::builtin_rules()
        } else {
            Vec::new()
        };
        rules.extend(self.routing.rules.iter().cloned());

        let mut router = Router::with_rules(self.routing.default_provider, rules);
        for (provider, patterns) in &self.routing.exclusions {
            for pattern in patterns {
                router.add_exclusion(*provider, pattern);
            }
        }
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderFamily;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  port: 9090
logging:
  level: debug
routing:
  rules:
    - pattern: "qwen-*"
      target_provider: patsnap
      priority: 5
"#
        )
        .unwrap();

        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.groups.0.len(), 3);

        let router = config.build_router();
        assert_eq!(router.route("qwen-max").provider, ProviderFamily::Patsnap);
        assert_eq!(router.route("claude-x").provider, ProviderFamily::Anthropic);
    }

    #[test]
    fn test_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server: [unclosed").unwrap();

        assert!(matches!(
            GatewayConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        assert!(matches!(
            GatewayConfig::from_file(&path),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "3000"),
            ("PROXY", "http://127.0.0.1:7890"),
            ("PAT_URL", "http://pat.internal"),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.network.proxy.as_deref(), Some("http://127.0.0.1:7890"));
        assert_eq!(
            config.groups.get("patgpt").unwrap().base_url,
            "http://pat.internal"
        );
        assert_eq!(
            config.groups.get("patgpt_new").unwrap().base_url,
            "http://pat.internal"
        );
        assert_eq!(
            config.groups.get("copilot").unwrap().base_url,
            "https://api.githubcopilot.com"
        );
    }

    #[test]
    fn test_bad_port_ignored() {
        let mut config = GatewayConfig::default();
        config.apply_env(|key| (key == "PORT").then(|| "http".to_string()));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validate_duplicate_group() {
        let mut config = GatewayConfig::default();
        config.groups.0.push(GroupProfile::copilot());

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_routing_without_builtin_rules() {
        let mut config = GatewayConfig::default();
        config.routing.builtin_rules = false;
        config.routing.default_provider = ProviderFamily::Azure;

        let router = config.build_router();
        assert!(router.rules().is_empty());
        assert_eq!(router.route("claude-x").provider, ProviderFamily::Azure);
    }
}
