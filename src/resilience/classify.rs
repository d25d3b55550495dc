//! 失败分类
//!
//! 根据状态码与上游错误文本判断一次调用的结果类别，决定重试、换凭证还是结束。
//! 上游错误文本只用于正则匹配，不做其他解析。

use crate::backends::BackendErrorKind;
use crate::models::AttemptOutcome;
use once_cell::sync::Lazy;
use regex::Regex;

/// 模型不存在 / 当前凭证无权使用该模型
static MODEL_UNAVAILABLE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)(model[_ ]?not[_ ]?found|model\b.*\b(does not exist|not exist|not found|not supported|unsupported)|no such model|unsupported model|invalid model|not supported model|无可用渠道|模型不存在|不支持该模型|不支持的模型)",
    )
    .ok()
});

/// 上游过载 / 临时不可用
static UPSTREAM_OVERLOADED: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)(overloaded|temporarily unavailable|service unavailable|server is busy|bad gateway|gateway timeout|upstream\b.*\b(error|timeout|unavailable)|try again later|负载已饱和|上游负载|系统繁忙|请稍后再试)",
    )
    .ok()
});

/// 单次尝试的结果类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// 2xx 且有文本
    Success,
    /// 429：退避后重试同一凭证
    RateLimited,
    /// 401/403/404 或模型不可用的 400：立即换下一个凭证
    AuthRejected,
    /// 5xx、网络错误、超时、过载提示：退避后重试同一凭证
    Transient,
    /// 2xx 但没有文本：换下一个凭证
    ContentEmpty,
    /// 其他无法归类的失败（含请求无法构建）：换下一个凭证
    Other,
}

impl FailureClass {
    /// 对一次调用结果分类
    pub fn classify(outcome: &AttemptOutcome) -> Self {
        if let Some(kind) = outcome.transport_error {
            return Self::from_transport(kind);
        }
        Self::detect(
            outcome.http_status,
            &outcome.error_detail,
            !outcome.extracted_text.trim().is_empty(),
        )
    }

    /// 没有拿到 HTTP 响应时的类别
    pub fn from_transport(kind: BackendErrorKind) -> Self {
        if kind.is_retryable() {
            FailureClass::Transient
        } else {
            FailureClass::Other
        }
    }

    /// 从状态码、错误文本和是否取到文本判断类别
    pub fn detect(status_code: Option<u16>, error_message: &str, has_text: bool) -> Self {
        let Some(code) = status_code else {
            return FailureClass::Transient;
        };

        match code {
            200..=299 if has_text => FailureClass::Success,
            200..=299 if is_overloaded(error_message) => FailureClass::Transient,
            200..=299 => FailureClass::ContentEmpty,
            429 => FailureClass::RateLimited,
            401 | 403 | 404 => FailureClass::AuthRejected,
            400 if is_model_unavailable(error_message) => FailureClass::AuthRejected,
            500..=599 => FailureClass::Transient,
            _ if is_overloaded(error_message) => FailureClass::Transient,
            _ => FailureClass::Other,
        }
    }

    /// 是否在同一凭证上退避重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureClass::RateLimited | FailureClass::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Success => "success",
            FailureClass::RateLimited => "rate_limited",
            FailureClass::AuthRejected => "auth_rejected",
            FailureClass::Transient => "transient",
            FailureClass::ContentEmpty => "content_empty",
            FailureClass::Other => "other",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn is_model_unavailable(message: &str) -> bool {
    MODEL_UNAVAILABLE
        .as_ref()
        .is_some_and(|re| re.is_match(message))
}

pub fn is_overloaded(message: &str) -> bool {
    UPSTREAM_OVERLOADED
        .as_ref()
        .is_some_and(|re| re.is_match(message))
}
