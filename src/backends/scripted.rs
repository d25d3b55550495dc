//! 测试用的脚本化后端
//!
//! 按凭证字符串排队预设响应，并记录每次调用。

use super::traits::{
    BackendError, BackendResult, UpstreamBackend, UpstreamRequest, UpstreamResponse,
};
use crate::credential::PoolCredential;
use crate::models::Dialect;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(u16, Value),
    Transport(BackendError),
    /// 一直不返回，用来触发超时
    Hang,
}

impl Scripted {
    pub fn chat_ok(text: &str) -> Self {
        Scripted::Reply(
            200,
            json!({"choices": [{"message": {"role": "assistant", "content": text}}]}),
        )
    }

    pub fn responses_ok(text: &str) -> Self {
        Scripted::Reply(200, json!({"output_text": text}))
    }

    pub fn error(status: u16, message: &str) -> Self {
        Scripted::Reply(status, json!({"error": {"message": message}}))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub credential: String,
    pub dialect: Dialect,
    pub url: String,
    pub payload: Value,
}

#[derive(Debug, Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为某个凭证追加一组响应
    pub fn script(self, credential: &str, replies: Vec<Scripted>) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts
                .entry(credential.to_string())
                .or_default()
                .extend(replies);
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UpstreamBackend for ScriptedBackend {
    async fn send(
        &self,
        credential: &PoolCredential,
        request: &UpstreamRequest,
    ) -> BackendResult<UpstreamResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                credential: credential.credential.clone(),
                dialect: request.dialect,
                url: request.url.clone(),
                payload: request.payload.clone(),
            });
        }

        let next = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut s| s.get_mut(&credential.credential).and_then(VecDeque::pop_front));

        match next {
            Some(Scripted::Reply(status, body)) => Ok(UpstreamResponse { status, body }),
            Some(Scripted::Transport(err)) => Err(err),
            Some(Scripted::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BackendError::timeout("hang"))
            }
            None => Ok(UpstreamResponse {
                status: 500,
                body: json!({"error": {"message": "script exhausted"}}),
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
