//! 上游路由器
//!
//! 驱动状态机：方言回退、凭证池遍历、单凭证退避重试。
//! 一个请求内严格串行，同一时刻最多一个上游调用在途。

use super::state::{advance_credential, after_backoff, after_outcome, CallVerdict, RouteState};
use crate::backends::{BackendError, UpstreamBackend, UpstreamRequest};
use crate::credential::{CredentialPool, PoolCredential};
use crate::logger::sanitize_log_message;
use crate::models::{
    AttemptOutcome, ChatMessage, Dialect, ModelEntry, RouteDiagnostics, RouteResult,
};
use crate::resilience::{
    BackoffBudget, FailureClass, RequestBudget, Retrier, RetryConfig, TimeoutConfig,
    TimeoutController,
};
use crate::translator::{build_payload, endpoint_url, error_detail, extract_text};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const EMPTY_CONTENT_DETAIL: &str = "上游返回空内容";
const EMPTY_POOL_DETAIL: &str = "凭证池为空";

/// 上游路由器（无状态，可在请求间共享）
#[derive(Clone)]
pub struct UpstreamRouter {
    backend: Arc<dyn UpstreamBackend>,
    base_url: String,
    retrier: Retrier,
    timeouts: TimeoutController,
}

impl std::fmt::Debug for UpstreamRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamRouter")
            .field("backend", &self.backend.name())
            .field("base_url", &self.base_url)
            .field("retrier", &self.retrier)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// 一次路由过程中的可变记录
struct RouteLedger {
    diagnostics: RouteDiagnostics,
    last_class: Option<FailureClass>,
    last_detail: String,
    last_raw: Value,
    backoff: BackoffBudget,
    budget: RequestBudget,
}

impl RouteLedger {
    fn record_call(&mut self, credential: &PoolCredential, attempt: u32, dialect: Dialect) {
        let d = &mut self.diagnostics;
        d.dialect = Some(dialect);
        d.pool = Some(credential.pool_name.clone());
        d.credential_index = Some(credential.index);
        d.attempt = attempt;
        d.calls += 1;
    }

    fn record_failure(&mut self, class: FailureClass, outcome: AttemptOutcome) {
        self.last_class = Some(class);
        self.last_detail = if outcome.error_detail.trim().is_empty() {
            EMPTY_CONTENT_DETAIL.to_string()
        } else {
            outcome.error_detail
        };
        self.last_raw = outcome.raw_body;
    }

    fn into_failure(self) -> RouteResult {
        let rate_limited = self.last_class == Some(FailureClass::RateLimited);
        RouteResult::exhausted(self.diagnostics, rate_limited, self.last_detail, self.last_raw)
    }
}

impl UpstreamRouter {
    pub fn new(
        backend: Arc<dyn UpstreamBackend>,
        base_url: impl Into<String>,
        retry: RetryConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            backend,
            base_url: base_url.into(),
            retrier: Retrier::new(retry),
            timeouts: TimeoutController::new(timeouts),
        }
    }

    /// 路由一个聊天请求，恰好返回一个终态结果
    pub async fn route(
        &self,
        entry: &ModelEntry,
        messages: &[ChatMessage],
        temperature: f64,
        pool: &CredentialPool,
    ) -> RouteResult {
        let (primary, fallback) = entry.dialect_plan();
        let mut ledger = RouteLedger {
            diagnostics: RouteDiagnostics {
                upstream_model: entry.upstream_id.clone(),
                ..RouteDiagnostics::default()
            },
            last_class: None,
            last_detail: EMPTY_POOL_DETAIL.to_string(),
            last_raw: Value::Null,
            backoff: BackoffBudget::new(Duration::from_millis(
                self.retrier.config().max_total_backoff_ms,
            )),
            budget: self.timeouts.start_budget(),
        };

        let mut state = RouteState::initial(pool.len());
        loop {
            state = match state {
                RouteState::TryPrimaryDialect { slot, attempt }
                | RouteState::TryFallbackDialect { slot, attempt } => {
                    let Some(credential) = pool.get(slot) else {
                        break;
                    };
                    if ledger.budget.is_exhausted() {
                        let err = ledger.budget.exhausted_error();
                        tracing::warn!("[ROUTER] {}", err);
                        ledger.last_class = Some(FailureClass::Transient);
                        ledger.last_detail = err.to_string();
                        RouteState::ExhaustedFailure
                    } else {
                        let dialect = match (state, fallback) {
                            (RouteState::TryFallbackDialect { .. }, Some(alt)) => alt,
                            _ => primary,
                        };
                        let outcome = self
                            .call(credential, entry, dialect, messages, temperature, &ledger.budget)
                            .await;
                        ledger.record_call(credential, attempt, dialect);

                        let class = FailureClass::classify(&outcome);
                        let verdict = CallVerdict {
                            class,
                            wants_dialect_fallback: outcome.wants_dialect_fallback(),
                            has_fallback_dialect: fallback.is_some(),
                            attempts_left: self.retrier.has_attempts_left(attempt),
                        };
                        let next = after_outcome(state, &verdict);

                        if class == FailureClass::Success {
                            tracing::info!(
                                pool = %credential.pool_name,
                                credential_index = credential.index,
                                attempt,
                                dialect = %dialect,
                                calls = ledger.diagnostics.calls,
                                "[ROUTER] 上游调用成功"
                            );
                            return RouteResult::success(outcome.extracted_text, ledger.diagnostics);
                        }

                        tracing::warn!(
                            pool = %credential.pool_name,
                            credential_index = credential.index,
                            attempt,
                            dialect = %dialect,
                            status = ?outcome.http_status,
                            class = %class,
                            next = next.name(),
                            "[ROUTER] 上游调用失败: {}",
                            sanitize_log_message(&outcome.error_detail)
                        );
                        ledger.record_failure(class, outcome);
                        next
                    }
                }

                RouteState::BackoffWait { slot, attempt } => {
                    let label = pool.get(slot).map(PoolCredential::label).unwrap_or_default();
                    let delay = self.retrier.backoff_delay(attempt);
                    let fits = ledger.budget.can_wait(delay)
                        && ledger.backoff.reserve(delay).is_some();
                    if fits {
                        tracing::debug!(
                            credential = %label,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "[ROUTER] 退避等待"
                        );
                        tokio::time::sleep(delay).await;
                        ledger.diagnostics.backoff_ms += delay.as_millis() as u64;
                        after_backoff(state)
                    } else {
                        tracing::info!(
                            credential = %label,
                            attempt,
                            spent_ms = ledger.backoff.spent().as_millis() as u64,
                            "[ROUTER] 退避预算不足，换下一个凭证"
                        );
                        advance_credential(state, pool.len())
                    }
                }

                RouteState::NextCredential { .. } => advance_credential(state, pool.len()),

                RouteState::Success | RouteState::ExhaustedFailure => break,
            };
        }

        tracing::warn!(
            model = %entry.upstream_id,
            calls = ledger.diagnostics.calls,
            backoff_ms = ledger.diagnostics.backoff_ms,
            "[ROUTER] 所有凭证均已耗尽: {}",
            sanitize_log_message(&ledger.last_detail)
        );
        ledger.into_failure()
    }

    /// 发出一次上游调用并归一化为 AttemptOutcome
    async fn call(
        &self,
        credential: &PoolCredential,
        entry: &ModelEntry,
        dialect: Dialect,
        messages: &[ChatMessage],
        temperature: f64,
        budget: &RequestBudget,
    ) -> AttemptOutcome {
        let request = UpstreamRequest {
            dialect,
            url: endpoint_url(&self.base_url, dialect),
            payload: build_payload(dialect, &entry.upstream_id, messages, temperature),
        };

        let sent = self
            .timeouts
            .execute_with_timeout(budget.remaining(), self.backend.send(credential, &request))
            .await;

        match sent {
            Ok(Ok(response)) => {
                let text = extract_text(dialect, &response.body);
                let is_2xx = (200..300).contains(&response.status);
                let detail = if is_2xx && !text.trim().is_empty() {
                    String::new()
                } else {
                    error_detail(&response.body)
                };
                AttemptOutcome {
                    dialect,
                    http_status: Some(response.status),
                    extracted_text: text,
                    raw_body: response.body,
                    error_detail: detail,
                    transport_error: None,
                }
            }
            Ok(Err(err)) => AttemptOutcome::transport_failure(dialect, &err),
            Err(err) => {
                AttemptOutcome::transport_failure(dialect, &BackendError::timeout(err.to_string()))
            }
        }
    }
}
