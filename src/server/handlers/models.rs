//! 模型列表与健康检查

use crate::server::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

/// GET /api/models - 按厂商分组的模型列表
pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "default": &*state.default_model,
        "groups": state.registry.grouped_by_vendor(),
    }))
}

/// 健康检查端点响应
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
