//! 网关错误类型
//!
//! 对客户端可见的错误分类，每种错误对应一个 HTTP 状态码和 JSON 响应体。

use crate::models::RouteDiagnostics;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

/// 网关错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("只允许 POST 请求")]
    MethodNotAllowed,

    #[error("请求体不是合法 JSON")]
    MalformedBody,

    #[error("请求体过大")]
    PayloadTooLarge,

    #[error("请求处理超时")]
    RequestTimeout,

    #[error("Unknown action")]
    UnknownAction,

    #[error("messages 必须是非空数组")]
    InvalidMessages,

    #[error("不支持的模型: {0}")]
    UnknownModel(String),

    /// 校验密码接口：密码不匹配
    #[error("密码错误")]
    WrongPassword,

    /// 聊天接口：密码缺失或不匹配
    #[error("未授权：密码错误或缺失")]
    Unauthorized,

    #[error("后端未配置 ACCESS_PASSWORD")]
    PasswordNotConfigured,

    #[error("后端未配置可用的凭证池: {routing_class}")]
    PoolNotConfigured { routing_class: String },

    /// 所有上游路由均已耗尽
    #[error("请求失败: {detail}")]
    UpstreamExhausted {
        status: u16,
        detail: String,
        raw: Value,
        meta: RouteDiagnostics,
    },
}

impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::MethodNotAllowed => 405,
            GatewayError::PayloadTooLarge => 413,
            GatewayError::RequestTimeout => 408,
            GatewayError::MalformedBody
            | GatewayError::UnknownAction
            | GatewayError::InvalidMessages
            | GatewayError::UnknownModel(_) => 400,
            GatewayError::WrongPassword | GatewayError::Unauthorized => 401,
            GatewayError::PasswordNotConfigured | GatewayError::PoolNotConfigured { .. } => 500,
            GatewayError::UpstreamExhausted { status, .. } => *status,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::MethodNotAllowed => "method_not_allowed",
            GatewayError::MalformedBody => "malformed_body",
            GatewayError::PayloadTooLarge => "payload_too_large",
            GatewayError::RequestTimeout => "request_timeout",
            GatewayError::UnknownAction => "unknown_action",
            GatewayError::InvalidMessages => "invalid_messages",
            GatewayError::UnknownModel(_) => "unknown_model",
            GatewayError::WrongPassword | GatewayError::Unauthorized => "unauthorized",
            GatewayError::PasswordNotConfigured | GatewayError::PoolNotConfigured { .. } => {
                "config_error"
            }
            GatewayError::UpstreamExhausted { .. } => "upstream_exhausted",
        }
    }

    /// 转换为 JSON 错误响应体
    pub fn to_json(&self) -> Value {
        match self {
            GatewayError::UpstreamExhausted {
                detail, raw, meta, ..
            } => json!({
                "ok": false,
                "error": self.to_string(),
                "detail": detail,
                "raw": raw,
                "meta": meta,
            }),
            _ => json!({
                "ok": false,
                "error": self.to_string(),
            }),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
