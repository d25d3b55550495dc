//! 方言转换层
//!
//! 为两种上游 API 方言构建请求体、解析响应体，对路由层屏蔽形状差异。
//!
//! ```text
//! translator/
//! └── dialect.rs   # Chat / Responses 请求构建与文本提取
//! ```

pub mod dialect;

pub use dialect::{
    build_payload, endpoint_path, endpoint_url, error_detail, extract_text, parse_body,
    safe_truncate,
};
