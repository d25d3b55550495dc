//! 路由状态机
//!
//! 状态与纯转移函数，不涉及 IO，便于单独测试终止条件。

use crate::resilience::FailureClass;

/// 路由状态
///
/// `slot` 是凭证在整个凭证池中的位置，`attempt` 从 1 开始。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    TryPrimaryDialect { slot: usize, attempt: u32 },
    TryFallbackDialect { slot: usize, attempt: u32 },
    BackoffWait { slot: usize, attempt: u32 },
    NextCredential { slot: usize },
    Success,
    ExhaustedFailure,
}

impl RouteState {
    /// 初始状态：第一个凭证的第一次尝试
    pub fn initial(pool_len: usize) -> Self {
        if pool_len == 0 {
            RouteState::ExhaustedFailure
        } else {
            RouteState::TryPrimaryDialect {
                slot: 0,
                attempt: 1,
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RouteState::Success | RouteState::ExhaustedFailure)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RouteState::TryPrimaryDialect { .. } => "try_primary_dialect",
            RouteState::TryFallbackDialect { .. } => "try_fallback_dialect",
            RouteState::BackoffWait { .. } => "backoff_wait",
            RouteState::NextCredential { .. } => "next_credential",
            RouteState::Success => "success",
            RouteState::ExhaustedFailure => "exhausted_failure",
        }
    }
}

/// 一次调用后做转移判断所需的信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallVerdict {
    pub class: FailureClass,
    /// 传输失败或非 2xx
    pub wants_dialect_fallback: bool,
    /// 模型支持另一种方言
    pub has_fallback_dialect: bool,
    /// 当前凭证还能再尝试
    pub attempts_left: bool,
}

/// 调用结束后的状态转移
///
/// 只对两个 Try 状态有意义，其他状态原样返回。
pub fn after_outcome(state: RouteState, verdict: &CallVerdict) -> RouteState {
    match state {
        RouteState::TryPrimaryDialect { slot, attempt } => {
            if verdict.class != FailureClass::Success
                && verdict.wants_dialect_fallback
                && verdict.has_fallback_dialect
            {
                RouteState::TryFallbackDialect { slot, attempt }
            } else {
                settle_attempt(slot, attempt, verdict)
            }
        }
        RouteState::TryFallbackDialect { slot, attempt } => settle_attempt(slot, attempt, verdict),
        other => other,
    }
}

/// 回退方言与主方言共用一个尝试序号，按最后一次调用的类别结算
fn settle_attempt(slot: usize, attempt: u32, verdict: &CallVerdict) -> RouteState {
    match verdict.class {
        FailureClass::Success => RouteState::Success,
        class if class.is_retryable() && verdict.attempts_left => {
            RouteState::BackoffWait { slot, attempt }
        }
        _ => RouteState::NextCredential { slot },
    }
}

/// 退避结束：同一凭证的下一次尝试
pub fn after_backoff(state: RouteState) -> RouteState {
    match state {
        RouteState::BackoffWait { slot, attempt } => RouteState::TryPrimaryDialect {
            slot,
            attempt: attempt + 1,
        },
        other => other,
    }
}

/// 换下一个凭证；没有了就结束
pub fn advance_credential(state: RouteState, pool_len: usize) -> RouteState {
    match state {
        RouteState::NextCredential { slot } | RouteState::BackoffWait { slot, .. } => {
            if slot + 1 < pool_len {
                RouteState::TryPrimaryDialect {
                    slot: slot + 1,
                    attempt: 1,
                }
            } else {
                RouteState::ExhaustedFailure
            }
        }
        other => other,
    }
}
