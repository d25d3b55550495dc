//! 超时控制
//!
//! 单次上游调用的超时与整次路由的时间预算。

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// 超时配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutConfig {
    /// 单次上游调用超时（毫秒），0 表示无超时
    pub attempt_timeout_ms: u64,
    /// 整次路由的时间预算（毫秒），0 表示无预算
    pub request_budget_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: 60_000,
            request_budget_ms: 120_000,
        }
    }
}

impl TimeoutConfig {
    pub fn new(attempt_timeout_ms: u64, request_budget_ms: u64) -> Self {
        Self {
            attempt_timeout_ms,
            request_budget_ms,
        }
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        (self.attempt_timeout_ms > 0).then(|| Duration::from_millis(self.attempt_timeout_ms))
    }

    pub fn request_budget(&self) -> Option<Duration> {
        (self.request_budget_ms > 0).then(|| Duration::from_millis(self.request_budget_ms))
    }
}

/// 超时错误
#[derive(Debug, Clone, PartialEq)]
pub enum TimeoutError {
    /// 单次调用超时
    AttemptTimeout { timeout_ms: u64, elapsed_ms: u64 },
    /// 整次路由预算耗尽
    BudgetExhausted { budget_ms: u64, elapsed_ms: u64 },
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutError::AttemptTimeout {
                timeout_ms,
                elapsed_ms,
            } => write!(
                f,
                "上游调用超时: 配置 {}ms, 已耗时 {}ms",
                timeout_ms, elapsed_ms
            ),
            TimeoutError::BudgetExhausted {
                budget_ms,
                elapsed_ms,
            } => write!(
                f,
                "请求时间预算耗尽: 配置 {}ms, 已耗时 {}ms",
                budget_ms, elapsed_ms
            ),
        }
    }
}

impl std::error::Error for TimeoutError {}

/// 超时控制器
#[derive(Debug, Clone)]
pub struct TimeoutController {
    config: TimeoutConfig,
}

impl TimeoutController {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    /// 带单次调用超时执行异步操作
    ///
    /// `limit` 为本次允许的最长时间，取配置超时与剩余预算中较小的一个。
    pub async fn execute_with_timeout<F, T>(
        &self,
        limit: Option<Duration>,
        operation: F,
    ) -> Result<T, TimeoutError>
    where
        F: Future<Output = T>,
    {
        let effective = match (self.config.attempt_timeout(), limit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let Some(timeout) = effective else {
            return Ok(operation.await);
        };

        let start = Instant::now();
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => Ok(result),
            Err(_) => Err(TimeoutError::AttemptTimeout {
                timeout_ms: timeout.as_millis() as u64,
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }

    /// 开始一次路由的时间预算
    pub fn start_budget(&self) -> RequestBudget {
        RequestBudget::new(self.config.request_budget())
    }
}

/// 整次路由的时间预算
#[derive(Debug, Clone)]
pub struct RequestBudget {
    started: Instant,
    budget: Option<Duration>,
}

impl RequestBudget {
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// 剩余时间；无预算时为 None
    pub fn remaining(&self) -> Option<Duration> {
        self.budget
            .map(|budget| budget.saturating_sub(self.elapsed()))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.remaining(), Some(left) if left.is_zero())
    }

    /// 剩余预算能否容纳一段退避
    pub fn can_wait(&self, delay: Duration) -> bool {
        match self.remaining() {
            Some(left) => delay < left,
            None => true,
        }
    }

    pub fn exhausted_error(&self) -> TimeoutError {
        TimeoutError::BudgetExhausted {
            budget_ms: self.budget.map(|b| b.as_millis() as u64).unwrap_or(0),
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}
