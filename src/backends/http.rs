//! reqwest 实现的上游后端

use super::traits::{
    BackendError, BackendResult, UpstreamBackend, UpstreamRequest, UpstreamResponse,
};
use crate::config::UpstreamConfig;
use crate::credential::PoolCredential;
use crate::translator::parse_body;
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use std::time::Duration;

/// HTTP 上游后端
///
/// `Client` 内部带连接池，进程内只构建一次。
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    pub fn new(config: &UpstreamConfig) -> BackendResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms));

        if config.attempt_timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.attempt_timeout_ms));
        }

        if let Some(url) = config.proxy.as_deref().filter(|u| !u.trim().is_empty()) {
            let proxy = Proxy::all(url)
                .map_err(|e| BackendError::invalid_request(format!("代理配置无效: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| BackendError::invalid_request(format!("客户端构建失败: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamBackend for HttpBackend {
    async fn send(
        &self,
        credential: &PoolCredential,
        request: &UpstreamRequest,
    ) -> BackendResult<UpstreamResponse> {
        let response = self
            .client
            .post(&request.url)
            .bearer_auth(&credential.credential)
            .json(&request.payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        Ok(UpstreamResponse {
            status,
            body: parse_body(&text),
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
