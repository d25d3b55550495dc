//! HTTP 服务
//!
//! axum 路由、共享状态与全局中间件（CORS、请求体大小、整体超时）。

pub mod handlers;

use crate::backends::{BackendError, HttpBackend, UpstreamBackend};
use crate::config::{Config, ServerConfig};
use crate::credential::{ConfiguredSecrets, PoolBuilder};
use crate::error::GatewayError;
use crate::registry::ModelRegistry;
use crate::router::UpstreamRouter;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// 请求间共享的只读状态
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub secrets: Arc<ConfiguredSecrets>,
    pub pools: PoolBuilder,
    pub router: UpstreamRouter,
    pub access_password: Option<Arc<str>>,
    pub default_model: Arc<str>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("models", &self.registry.len())
            .field("secrets", &self.secrets)
            .field("pools", &self.pools)
            .field("router", &self.router)
            .field("access_password", &self.access_password.as_ref().map(|_| "***"))
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl AppState {
    /// 用指定后端构建状态
    pub fn new(config: &Config, backend: Arc<dyn UpstreamBackend>) -> Self {
        let router = UpstreamRouter::new(
            backend,
            config.upstream.base_url.clone(),
            config.retry.clone(),
            config.timeouts(),
        );
        Self {
            registry: Arc::new(ModelRegistry::with_overrides(&config.models)),
            secrets: Arc::new(ConfiguredSecrets::from_raw(&config.pools)),
            pools: PoolBuilder::new(&config.routing.fallback_pool),
            router,
            access_password: config.access_password().map(Arc::from),
            default_model: Arc::from(config.routing.default_model.as_str()),
        }
    }

    /// 用 reqwest 后端构建状态
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let backend = HttpBackend::new(&config.upstream)?;
        Ok(Self::new(config, Arc::new(backend)))
    }
}

/// 构建 axum 路由
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/api/chat", any(handlers::chat::handle_chat))
        .route("/api/models", get(handlers::models::list_models))
        .route("/health", get(handlers::models::health))
        .layer(RequestBodyLimitLayer::new(server.body_limit_bytes));

    if server.request_timeout_ms > 0 {
        router = router.layer(TimeoutLayer::new(Duration::from_millis(
            server.request_timeout_ms,
        )));
    }

    router
        .layer(middleware::map_response(json_rejection))
        .layer(middleware::map_response(with_cors))
        .with_state(state)
}

/// 中间件层自己生成的拒绝响应（请求体过大、整体超时）是纯文本或空响应体，
/// 改写成统一的 `{ok:false,error}`
async fn json_rejection(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes().starts_with(b"application/json"));
    if is_json {
        return response;
    }

    let err = match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => GatewayError::PayloadTooLarge,
        StatusCode::REQUEST_TIMEOUT => GatewayError::RequestTimeout,
        _ => return response,
    };
    tracing::info!(status = err.status_code(), error_type = err.error_type(), "[SERVER] {}", err);
    err.into_response()
}

/// 所有响应都带上宽松的 CORS 头
async fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// 启动 HTTP 服务，直到收到 Ctrl+C
pub async fn run(config: Config) -> std::io::Result<()> {
    let state = AppState::from_config(&config).map_err(std::io::Error::other)?;
    tracing::info!(
        models = state.registry.len(),
        fallback_pool = state.pools.fallback_pool(),
        password = state.access_password.is_some(),
        "[SERVER] 配置加载完成: {:?}",
        state.secrets
    );
    tracing::debug!(
        models = ?state.registry.names().collect::<Vec<_>>(),
        "[SERVER] 已注册模型"
    );

    let app = build_router(state, &config.server);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("[SERVER] 监听 {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[SERVER] 无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("[SERVER] 收到退出信号，正在关闭");
}
