//! 配置加载
//!
//! 加载顺序：默认值 → YAML 配置文件 → 环境变量覆盖。
//! 配置文件位置：`$CHATRELAY_CONFIG`，否则 `~/.chatrelay/config.yaml`（不存在时跳过）。

use crate::credential::{DEFAULT_FALLBACK_POOL, POOL_GEMINI, POOL_OFFICIAL, POOL_REVERSE};
use crate::models::ModelEntry;
use crate::registry::DEFAULT_MODEL;
use crate::resilience::{RetryConfig, TimeoutConfig};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://yunwu.ai/v1";
pub const CONFIG_PATH_ENV: &str = "CHATRELAY_CONFIG";

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置文件失败 {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("无效的环境变量 {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 请求体大小上限（字节）
    pub body_limit_bytes: usize,
    /// 整个请求的超时（毫秒），应大于路由时间预算
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            body_limit_bytes: 1024 * 1024,
            request_timeout_ms: 150_000,
        }
    }
}

/// 上游配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    /// 单次上游调用超时（毫秒）
    pub attempt_timeout_ms: u64,
    /// 可选代理，如 `http://127.0.0.1:7890`
    pub proxy: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_ms: 10_000,
            attempt_timeout_ms: 60_000,
            proxy: None,
        }
    }
}

/// 路由配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// 声明池全部为空时使用的兜底池
    pub fallback_pool: String,
    /// 整次路由的时间预算（毫秒），0 表示不限制
    pub request_budget_ms: u64,
    /// 请求未指定模型时使用的显示名
    pub default_model: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            fallback_pool: DEFAULT_FALLBACK_POOL.to_string(),
            request_budget_ms: 120_000,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter 语法，如 `info` 或 `chatrelay_lib=debug`
    pub level: String,
    /// 输出 JSON 格式
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// 应用配置
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub retry: RetryConfig,
    pub routing: RoutingConfig,
    /// 池名 → 逗号分隔的密钥串
    pub pools: IndexMap<String, String>,
    /// 显示名 → 模型条目，覆盖或追加到内置注册表
    pub models: IndexMap<String, ModelEntry>,
    pub logging: LoggingConfig,
    pub access_password: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pools: Vec<&str> = self.pools.keys().map(String::as_str).collect();
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("upstream", &self.upstream)
            .field("retry", &self.retry)
            .field("routing", &self.routing)
            .field("pools", &pools)
            .field("models", &self.models.len())
            .field("logging", &self.logging)
            .field("access_password", &self.access_password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Config {
    /// 从默认位置加载配置并应用环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// 配置文件路径
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::home_dir().map(|home| home.join(".chatrelay").join("config.yaml"))
    }

    /// 从 YAML 文件读取
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// 应用环境变量覆盖
    ///
    /// `lookup` 抽象出环境读取，空字符串视为未设置。
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for (name, pool) in [
            ("YUNWU_API_KEY", POOL_REVERSE),
            ("YUNWU_OFFICIAL_KEY", POOL_OFFICIAL),
            ("YUNWU_GEMINI_KEY", POOL_GEMINI),
        ] {
            if let Some(raw) = get(name) {
                self.pools.insert(pool.to_string(), raw);
            }
        }

        if let Some(password) = get("ACCESS_PASSWORD") {
            self.access_password = Some(password);
        }
        if let Some(base_url) = get("YUNWU_BASE_URL") {
            self.upstream.base_url = base_url;
        }
        if let Some(host) = get("CHATRELAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("CHATRELAY_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: "CHATRELAY_PORT",
                    value: port,
                })?;
        }
        if let Some(level) = get("CHATRELAY_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// 已配置的访问密码；空字符串视为未配置
    pub fn access_password(&self) -> Option<&str> {
        self.access_password
            .as_deref()
            .filter(|p| !p.is_empty())
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        TimeoutConfig::new(
            self.upstream.attempt_timeout_ms,
            self.routing.request_budget_ms,
        )
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
