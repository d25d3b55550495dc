//! 后端调用层 Trait 定义
//!
//! 后端层只负责 HTTP 请求/响应，不包含方言转换和重试逻辑。

use crate::credential::PoolCredential;
use crate::models::Dialect;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 后端调用结果
pub type BackendResult<T> = Result<T, BackendError>;

/// 后端错误类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// 网络错误（连接失败、读取响应失败）
    Network,
    /// 请求超时
    Timeout,
    /// 请求无法构建（URL、代理配置等）
    InvalidRequest,
}

impl BackendErrorKind {
    /// 网络抖动和超时值得在同一凭证上重试；请求本身有问题则不值得
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "NetworkError"),
            Self::Timeout => write!(f, "Timeout"),
            Self::InvalidRequest => write!(f, "InvalidRequest"),
        }
    }
}

/// 后端错误：没有拿到任何 HTTP 响应
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::InvalidRequest, message)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_builder() {
            Self::invalid_request(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// 一次上游调用
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub dialect: Dialect,
    pub url: String,
    pub payload: Value,
}

/// 上游 HTTP 响应（任意状态码）
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    /// 解析后的响应体；非 JSON 时为 `{"raw": text}`
    pub body: Value,
}

/// 上游后端
#[async_trait]
pub trait UpstreamBackend: Send + Sync {
    /// 用指定凭证发送一次请求
    ///
    /// 拿到任何 HTTP 响应都返回 `Ok`，状态码的含义由调用方判断。
    async fn send(
        &self,
        credential: &PoolCredential,
        request: &UpstreamRequest,
    ) -> BackendResult<UpstreamResponse>;

    /// 后端名称
    fn name(&self) -> &str;
}
