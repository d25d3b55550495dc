//! 重试退避
//!
//! 单个凭证上的重试上限与指数退避计算，以及整次请求的累计退避预算。

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 重试配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// 每个凭证的最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 基础延迟（毫秒）
    pub base_delay_ms: u64,
    /// 单次退避上限（毫秒）
    pub max_delay_ms: u64,
    /// 整次请求累计退避上限（毫秒）
    pub max_total_backoff_ms: u64,
    /// 是否叠加 [0, base_delay) 的随机抖动
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            max_total_backoff_ms: 20000,
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            ..Self::default()
        }
    }

    /// 尝试次数至少为 1
    pub fn attempt_ceiling(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// 退避计算器
#[derive(Debug, Clone)]
pub struct Retrier {
    config: RetryConfig,
}

impl Retrier {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// 当前凭证上是否还能进行第 `attempt + 1` 次尝试
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.config.attempt_ceiling()
    }

    /// 第 `attempt` 次尝试失败后的退避时间
    ///
    /// 公式: min(base * 2^attempt + jitter, max_delay)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter_factor = if self.config.jitter {
            rand::thread_rng().gen_range(0.0..1.0)
        } else {
            0.0
        };
        self.backoff_delay_with_jitter(attempt, jitter_factor)
    }

    /// 计算退避时间（可指定抖动因子，用于测试）
    ///
    /// jitter_factor 应在 [0.0, 1.0) 范围内
    pub fn backoff_delay_with_jitter(&self, attempt: u32, jitter_factor: f64) -> Duration {
        let base = self.config.base_delay_ms as f64;
        let max = self.config.max_delay_ms as f64;

        let exponential = base * 2_f64.powi(attempt.min(32) as i32);
        let jitter = base * jitter_factor.clamp(0.0, 1.0);
        let delay = (exponential + jitter).min(max);

        Duration::from_millis(delay as u64)
    }
}

/// 累计退避预算
///
/// 用户同步等待响应，累计等待时间必须有上限。
#[derive(Debug, Clone)]
pub struct BackoffBudget {
    cap: Duration,
    spent: Duration,
}

impl BackoffBudget {
    pub fn new(cap: Duration) -> Self {
        Self {
            cap,
            spent: Duration::ZERO,
        }
    }

    /// 预留一段退避时间；超出预算时返回 None，不记账
    pub fn reserve(&mut self, delay: Duration) -> Option<Duration> {
        let next = self.spent + delay;
        if next > self.cap {
            return None;
        }
        self.spent = next;
        Some(delay)
    }

    pub fn spent(&self) -> Duration {
        self.spent
    }
}
