//! 路由模型
//!
//! 单次上游调用结果与整次路由结果的数据结构。

use super::model_entry::Dialect;
use crate::backends::{BackendError, BackendErrorKind};
use serde::Serialize;
use serde_json::Value;

/// 全部路由耗尽时的默认状态码
pub const STATUS_UNAVAILABLE: u16 = 503;
/// 最后一次失败为限流时透传的状态码
pub const STATUS_RATE_LIMITED: u16 = 429;

/// 单次上游调用的结果（折叠进路由状态后即丢弃）
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    /// 本次调用使用的方言
    pub dialect: Dialect,
    /// HTTP 状态码，传输层失败时为 None
    pub http_status: Option<u16>,
    /// 提取出的文本，可能为空
    pub extracted_text: String,
    /// 上游原始响应体
    pub raw_body: Value,
    /// 错误描述（成功时为空）
    pub error_detail: String,
    /// 传输层失败的类别，拿到 HTTP 响应时为 None
    pub transport_error: Option<BackendErrorKind>,
}

impl AttemptOutcome {
    /// 传输层失败（网络错误、超时、请求无法构建）
    pub fn transport_failure(dialect: Dialect, err: &BackendError) -> Self {
        Self {
            dialect,
            http_status: None,
            extracted_text: String::new(),
            raw_body: Value::Null,
            error_detail: err.to_string(),
            transport_error: Some(err.kind),
        }
    }

    pub fn is_http_success(&self) -> bool {
        matches!(self.http_status, Some(code) if (200..300).contains(&code))
    }

    /// 是否需要尝试回退方言：传输失败或非 2xx
    pub fn wants_dialect_fallback(&self) -> bool {
        !self.is_http_success()
    }
}

/// 路由诊断信息，随响应一起返回给调用方
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteDiagnostics {
    /// 最后一次调用的方言
    pub dialect: Option<Dialect>,
    /// 最后一次调用的凭证池名称
    pub pool: Option<String>,
    /// 凭证在池内的序号（从 0 开始）
    pub credential_index: Option<usize>,
    /// 当前凭证上的尝试序号（从 1 开始）
    pub attempt: u32,
    /// 上游模型 ID
    pub upstream_model: String,
    /// 总调用次数（含方言回退）
    pub calls: u32,
    /// 累计退避时间（毫秒）
    pub backoff_ms: u64,
}

/// 路由失败详情
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFailure {
    /// 建议的 HTTP 状态码（429 或 503）
    pub status_hint: u16,
    /// 最后一次记录的错误描述
    pub detail: String,
    /// 最后一次上游原始响应体
    pub raw: Value,
}

/// 路由结果：每个客户端请求恰好一个
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    pub succeeded: bool,
    pub text: String,
    pub diagnostics: RouteDiagnostics,
    pub failure: Option<RouteFailure>,
}

impl RouteResult {
    /// 成功结果；空文本一律视为失败，不会产生"看似成功"的结果
    pub fn success(text: String, diagnostics: RouteDiagnostics) -> Self {
        if text.trim().is_empty() {
            return Self::exhausted(
                diagnostics,
                false,
                "上游返回空内容".to_string(),
                Value::Null,
            );
        }
        Self {
            succeeded: true,
            text,
            diagnostics,
            failure: None,
        }
    }

    /// 所有凭证耗尽
    pub fn exhausted(
        diagnostics: RouteDiagnostics,
        rate_limited: bool,
        detail: String,
        raw: Value,
    ) -> Self {
        let status_hint = if rate_limited {
            STATUS_RATE_LIMITED
        } else {
            STATUS_UNAVAILABLE
        };
        Self {
            succeeded: false,
            text: String::new(),
            diagnostics,
            failure: Some(RouteFailure {
                status_hint,
                detail,
                raw,
            }),
        }
    }

    /// 映射到对外的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match &self.failure {
            None => 200,
            Some(failure) => failure.status_hint,
        }
    }
}
