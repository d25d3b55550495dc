//! 模型注册表
//!
//! 显示名 → 上游模型 ID / 方言 / 路由类别 的静态映射。
//! 启动时构建一次（内置表 + 配置覆盖），之后只读。

use crate::models::{Dialect, DialectSet, ModelEntry, RoutingClass};
use indexmap::IndexMap;
use serde::Serialize;

/// 客户端未指定模型时使用的显示名
pub const DEFAULT_MODEL: &str = "GPT-5.2";

/// 模型列表中的一项（前端下拉框用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelListing {
    pub name: String,
    pub id: String,
}

/// 模型注册表
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: IndexMap<String, ModelEntry>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelRegistry {
    /// 内置模型表
    pub fn builtin() -> Self {
        let gpt5 = |id: &str| {
            ModelEntry::new(
                id,
                DialectSet::Both,
                Dialect::Responses,
                RoutingClass::Reverse,
                "openai",
            )
        };

        let mut entries = IndexMap::new();
        entries.insert("GPT-5.2".to_string(), gpt5("gpt-5.2"));
        entries.insert("GPT-5.1".to_string(), gpt5("gpt-5.1"));
        entries.insert(
            "GPT-4o".to_string(),
            ModelEntry::chat("gpt-4o", RoutingClass::Reverse, "openai"),
        );
        entries.insert(
            "Claude Opus 4.5".to_string(),
            ModelEntry::chat("claude-opus-4-5", RoutingClass::Official, "anthropic"),
        );
        entries.insert(
            "Gemini 3 Pro".to_string(),
            ModelEntry::chat("gemini-3-pro-preview", RoutingClass::Gemini, "google"),
        );
        entries.insert(
            "Grok-4.1".to_string(),
            ModelEntry::chat("grok-4.1", RoutingClass::Official, "xai"),
        );

        Self { entries }
    }

    /// 内置表叠加配置中的条目（同名覆盖）
    ///
    /// 首选方言不在支持集合内的条目会被忽略。
    pub fn with_overrides(overrides: &IndexMap<String, ModelEntry>) -> Self {
        let mut registry = Self::builtin();
        for (name, entry) in overrides {
            if !entry.is_consistent() {
                tracing::warn!(
                    "[REGISTRY] 忽略模型 {}: 首选方言 {} 不在支持列表中",
                    name,
                    entry.preferred
                );
                continue;
            }
            registry.entries.insert(name.clone(), entry.clone());
        }
        registry
    }

    /// 按显示名精确查找（区分大小写）
    pub fn resolve(&self, display_name: &str) -> Option<&ModelEntry> {
        self.entries.get(display_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// 按厂商分组的模型列表，保持注册顺序
    pub fn grouped_by_vendor(&self) -> IndexMap<String, Vec<ModelListing>> {
        let mut groups: IndexMap<String, Vec<ModelListing>> = IndexMap::new();
        for (name, entry) in &self.entries {
            groups
                .entry(entry.vendor.clone())
                .or_default()
                .push(ModelListing {
                    name: name.clone(),
                    id: name.clone(),
                });
        }
        groups
    }
}
