//! 方言适配
//!
//! Chat Completions 与 Responses 两种请求/响应形状的构建与解析。
//! 所有函数都是全函数：字段缺失返回空字符串，不会报错。

use crate::models::{ChatMessage, Dialect};
use serde_json::{json, Value};

/// 错误详情的最大字符数
pub const MAX_DETAIL_CHARS: usize = 2000;

/// 方言对应的上游路径（相对 base_url）
pub fn endpoint_path(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Chat => "/chat/completions",
        Dialect::Responses => "/responses",
    }
}

/// 拼接完整的上游 URL
pub fn endpoint_url(base_url: &str, dialect: Dialect) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), endpoint_path(dialect))
}

/// 构建上游请求体
///
/// Responses 方言直接把 messages 作为 `input` 传递，兼容大多数中转站。
pub fn build_payload(
    dialect: Dialect,
    model: &str,
    messages: &[ChatMessage],
    temperature: f64,
) -> Value {
    match dialect {
        Dialect::Chat => json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "stream": false,
        }),
        Dialect::Responses => json!({
            "model": model,
            "input": messages,
            "temperature": temperature,
        }),
    }
}

/// 从上游响应体中提取回复文本
pub fn extract_text(dialect: Dialect, body: &Value) -> String {
    match dialect {
        Dialect::Chat => extract_chat_text(body),
        Dialect::Responses => {
            let candidates = [
                body.get("output_text")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                body.pointer("/output/0/content/0/text")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                // 部分上游对 Responses 请求返回 Chat 形状
                Some(extract_chat_text(body)),
            ];
            candidates
                .into_iter()
                .flatten()
                .find(|text| !text.trim().is_empty())
                .unwrap_or_default()
        }
    }
}

fn extract_chat_text(body: &Value) -> String {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// 从错误响应体中提取人类可读的错误描述
///
/// 依次尝试 `error.message`、字符串形式的 `error`、`message`、`raw`，
/// 最后退回到整个响应体的 JSON 文本。
pub fn error_detail(body: &Value) -> String {
    let candidates = [
        body.pointer("/error/message").and_then(Value::as_str),
        body.get("error").and_then(Value::as_str),
        body.get("message").and_then(Value::as_str),
        body.get("raw").and_then(Value::as_str),
    ];
    let detail = candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    safe_truncate(&detail, MAX_DETAIL_CHARS)
}

/// 安全截断字符串到指定字符数，避免 UTF-8 边界问题
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_index, _)) => s[..byte_index].to_string(),
        None => s.to_string(),
    }
}

/// 解析上游响应文本；非 JSON 时包装成 `{"raw": text}`
pub fn parse_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}
