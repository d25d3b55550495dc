//! 上游路由模块
//!
//! 给定模型条目和凭证池，按以下层次寻找可用的上游响应：
//! - 凭证池顺序（便宜的在前）
//! - 单凭证上的有限次退避重试
//! - 每次尝试内的方言回退
//!
//! 嵌套循环展开为显式状态机，见 `state.rs`。

pub mod state;
mod upstream;

pub use state::RouteState;
pub use upstream::UpstreamRouter;

#[cfg(test)]
mod tests;
