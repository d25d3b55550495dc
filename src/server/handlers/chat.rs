//! 聊天入口处理器
//!
//! 校验顺序：方法 → 请求体 → action → 密码 → messages → 模型 → 凭证池，
//! 全部通过后才会发出上游调用。

use crate::error::GatewayError;
use crate::models::{parse_messages, Action, ChatRequest, ReplyChoice, RouteResult};
use crate::server::AppState;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tracing::Instrument;

/// /api/chat - 任意方法进入，方法在这里校验
pub async fn handle_chat(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("chat", request_id = %request_id);

    async move {
        match process(&state, &method, &body).await {
            Ok(response) => response,
            Err(err) => {
                let status = err.status_code();
                if status >= 500 {
                    tracing::error!(status, error_type = err.error_type(), "[HANDLER] {}", err);
                } else {
                    tracing::info!(status, error_type = err.error_type(), "[HANDLER] {}", err);
                }
                err.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn process(
    state: &AppState,
    method: &Method,
    body: &[u8],
) -> Result<Response, GatewayError> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    if method != Method::POST {
        return Err(GatewayError::MethodNotAllowed);
    }

    let request = parse_request(body)?;
    let action = request
        .action
        .as_deref()
        .and_then(|a| a.parse::<Action>().ok())
        .ok_or(GatewayError::UnknownAction)?;

    match action {
        Action::CheckPassword => check_password(state, &request),
        Action::Chat => chat(state, &request).await,
    }
}

/// 请求体必须是 JSON 对象
fn parse_request(body: &[u8]) -> Result<ChatRequest, GatewayError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| GatewayError::MalformedBody)?;
    if !value.is_object() {
        return Err(GatewayError::MalformedBody);
    }
    serde_json::from_value(value).map_err(|_| GatewayError::MalformedBody)
}

/// 常量时间比较，避免通过耗时推断密码
fn password_matches(expected: &str, provided: Option<&str>) -> bool {
    match provided {
        Some(provided) => provided.as_bytes().ct_eq(expected.as_bytes()).into(),
        None => false,
    }
}

fn check_password(state: &AppState, request: &ChatRequest) -> Result<Response, GatewayError> {
    let expected = state
        .access_password
        .as_deref()
        .ok_or(GatewayError::PasswordNotConfigured)?;
    if !password_matches(expected, request.password.as_deref()) {
        return Err(GatewayError::WrongPassword);
    }
    Ok(Json(json!({"ok": true})).into_response())
}

async fn chat(state: &AppState, request: &ChatRequest) -> Result<Response, GatewayError> {
    if let Some(expected) = state.access_password.as_deref() {
        if !password_matches(expected, request.password.as_deref()) {
            return Err(GatewayError::Unauthorized);
        }
    }

    let messages = parse_messages(request.messages.as_ref()).ok_or(GatewayError::InvalidMessages)?;

    let display_name = request
        .model
        .clone()
        .unwrap_or_else(|| state.default_model.to_string());
    let entry = state
        .registry
        .resolve(&display_name)
        .ok_or_else(|| GatewayError::UnknownModel(display_name.clone()))?;

    let pool = state.pools.build(entry.routing_class, &state.secrets);
    if pool.is_empty() {
        return Err(GatewayError::PoolNotConfigured {
            routing_class: entry.routing_class.to_string(),
        });
    }

    tracing::info!(
        model = %display_name,
        upstream_model = %entry.upstream_id,
        pools = ?pool.pool_names(),
        credentials = pool.len(),
        "[HANDLER] 开始路由"
    );

    let result = state
        .router
        .route(entry, &messages, request.temperature(), &pool)
        .await;

    route_response(result, &display_name)
}

fn route_response(result: RouteResult, display_name: &str) -> Result<Response, GatewayError> {
    let status = result.status_code();
    match result.failure {
        None => Ok(Json(json!({
            "ok": true,
            "choices": [ReplyChoice::text(&result.text)],
            "model": display_name,
            "meta": result.diagnostics,
        }))
        .into_response()),
        Some(failure) => Err(GatewayError::UpstreamExhausted {
            status,
            detail: failure.detail,
            raw: failure.raw,
            meta: result.diagnostics,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_matches() {
        assert!(password_matches("secret", Some("secret")));
        assert!(!password_matches("secret", Some("Secret")));
        assert!(!password_matches("secret", Some("secret ")));
        assert!(!password_matches("secret", Some("")));
        assert!(!password_matches("secret", None));
    }

    #[test]
    fn test_parse_request() {
        assert!(parse_request(br#"{"action":"chat"}"#).is_ok());
        assert_eq!(
            parse_request(b"not json").unwrap_err(),
            GatewayError::MalformedBody
        );
        assert_eq!(
            parse_request(b"[1,2]").unwrap_err(),
            GatewayError::MalformedBody
        );
        assert_eq!(
            parse_request(br#"{"temperature":"hot"}"#).unwrap_err(),
            GatewayError::MalformedBody
        );
    }
}
