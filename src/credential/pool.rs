//! 凭证池构建
//!
//! 将路由类别展开为有序的 (池名, 凭证) 列表。
//! 池的声明顺序就是成本策略：便宜的在前，贵而稳定的在后。

use super::types::{ConfiguredSecrets, CredentialPool, PoolCredential};
use crate::models::RoutingClass;

pub const POOL_REVERSE: &str = "reverse";
pub const POOL_OFFICIAL: &str = "official";
pub const POOL_GEMINI: &str = "gemini";

/// 默认兜底池
pub const DEFAULT_FALLBACK_POOL: &str = POOL_REVERSE;

/// 路由类别声明的池链
///
/// Gemini 专用池被拒后降级到 reverse，最后才用 official。
pub fn declared_pools(class: RoutingClass) -> &'static [&'static str] {
    match class {
        RoutingClass::Reverse => &[POOL_REVERSE, POOL_OFFICIAL],
        RoutingClass::Gemini => &[POOL_GEMINI, POOL_REVERSE, POOL_OFFICIAL],
        RoutingClass::Official => &[POOL_OFFICIAL],
    }
}

/// 凭证池构建器
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    fallback_pool: String,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_POOL)
    }
}

impl PoolBuilder {
    pub fn new(fallback_pool: &str) -> Self {
        Self {
            fallback_pool: fallback_pool.to_string(),
        }
    }

    pub fn fallback_pool(&self) -> &str {
        &self.fallback_pool
    }

    /// 构建凭证池
    ///
    /// - 空池直接跳过，不占位
    /// - 声明的池全部为空时换用兜底池
    /// - 兜底池也为空时返回空列表，由调用方报告配置错误
    pub fn build(&self, class: RoutingClass, secrets: &ConfiguredSecrets) -> CredentialPool {
        let mut entries = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for &pool_name in declared_pools(class) {
            if seen.contains(&pool_name) {
                continue;
            }
            seen.push(pool_name);
            push_pool(&mut entries, pool_name, secrets);
        }

        if entries.is_empty() && secrets.has_pool(&self.fallback_pool) {
            tracing::info!(
                "[POOL] 路由类别 {} 的声明池均未配置，使用兜底池 {}",
                class,
                self.fallback_pool
            );
            push_pool(&mut entries, &self.fallback_pool, secrets);
        }

        CredentialPool::new(entries)
    }
}

fn push_pool(entries: &mut Vec<PoolCredential>, pool_name: &str, secrets: &ConfiguredSecrets) {
    for (index, credential) in secrets.credentials(pool_name).iter().enumerate() {
        entries.push(PoolCredential {
            pool_name: pool_name.to_string(),
            credential: credential.clone(),
            index,
        });
    }
}
