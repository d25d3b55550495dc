//! chatrelay
//!
//! 聊天补全请求中转：按模型选择上游方言和凭证池链，
//! 在方言、凭证池、单个凭证三个层次上做故障转移。

pub mod backends;
pub mod config;
pub mod credential;
pub mod error;
pub mod logger;
pub mod models;
pub mod registry;
pub mod resilience;
pub mod router;
pub mod server;
pub mod translator;

pub use config::{Config, ConfigError};
pub use error::GatewayError;
pub use registry::ModelRegistry;
pub use router::UpstreamRouter;
pub use server::{build_router, AppState};
