//! 数据模型
//!
//! 模型条目、聊天请求/响应与路由结果。

pub mod chat_model;
pub mod model_entry;
pub mod route_model;

pub use chat_model::{parse_messages, Action, ChatMessage, ChatRequest, ReplyChoice};
pub use model_entry::{Dialect, DialectSet, ModelEntry, RoutingClass};
pub use route_model::{AttemptOutcome, RouteDiagnostics, RouteFailure, RouteResult};
