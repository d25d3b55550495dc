//! 后端调用层
//!
//! 与上游 OpenAI 兼容中转站的 HTTP 通信。
//! 后端层只负责 HTTP 请求/响应，不包含方言转换逻辑。
//!
//! ```text
//! backends/
//! ├── traits.rs          # UpstreamBackend trait 与错误类型
//! └── http.rs            # reqwest 实现
//! ```

pub mod http;
pub mod traits;

#[cfg(test)]
pub(crate) mod scripted;

pub use http::HttpBackend;
pub use traits::{
    BackendError, BackendErrorKind, BackendResult, UpstreamBackend, UpstreamRequest,
    UpstreamResponse,
};
