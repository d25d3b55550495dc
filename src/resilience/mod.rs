//! 容错机制模块
//!
//! 失败分类、退避重试和超时控制

mod classify;
mod retry;
mod timeout;

pub use classify::{is_model_unavailable, is_overloaded, FailureClass};
pub use retry::{BackoffBudget, Retrier, RetryConfig};
pub use timeout::{RequestBudget, TimeoutConfig, TimeoutController, TimeoutError};
