//! 凭证池模块
//!
//! 按路由类别构建有序凭证池，凭证只在请求内存活，不落盘不缓存。

mod pool;
mod types;

pub use pool::{
    declared_pools, PoolBuilder, DEFAULT_FALLBACK_POOL, POOL_GEMINI, POOL_OFFICIAL, POOL_REVERSE,
};
pub use types::{split_secret, ConfiguredSecrets, CredentialPool, PoolCredential};

#[cfg(test)]
mod tests;
