//! 模型条目
//!
//! 显示名到上游模型 ID、API 方言和路由类别的映射定义。

use serde::{Deserialize, Serialize};

/// 上游 API 方言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `/chat/completions`：messages 入，choices[0].message.content 出
    Chat,
    /// `/responses`：input 入，output_text 或 output[] 出
    Responses,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Chat => "chat",
            Dialect::Responses => "responses",
        }
    }

    /// 另一种方言
    pub fn other(&self) -> Dialect {
        match self {
            Dialect::Chat => Dialect::Responses,
            Dialect::Responses => Dialect::Chat,
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(Dialect::Chat),
            "responses" => Ok(Dialect::Responses),
            _ => Err(format!("Invalid dialect: {s}")),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 模型支持的方言集合（至少一种）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectSet {
    ChatOnly,
    ResponsesOnly,
    Both,
}

impl DialectSet {
    pub fn contains(&self, dialect: Dialect) -> bool {
        match self {
            DialectSet::ChatOnly => dialect == Dialect::Chat,
            DialectSet::ResponsesOnly => dialect == Dialect::Responses,
            DialectSet::Both => true,
        }
    }

    /// 首选方言之外的另一种方言（仅当两种都支持时存在）
    pub fn fallback_for(&self, preferred: Dialect) -> Option<Dialect> {
        match self {
            DialectSet::Both => Some(preferred.other()),
            _ => None,
        }
    }
}

/// 路由类别：决定使用哪条凭证池链
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingClass {
    /// 逆向渠道优先，官方渠道兜底
    Reverse,
    /// Gemini 专用渠道优先
    Gemini,
    /// 只走官方渠道
    Official,
}

impl RoutingClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingClass::Reverse => "reverse",
            RoutingClass::Gemini => "gemini",
            RoutingClass::Official => "official",
        }
    }
}

impl std::fmt::Display for RoutingClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 模型条目（进程生命周期内不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// 上游模型 ID
    pub upstream_id: String,
    /// 支持的方言
    pub dialects: DialectSet,
    /// 首选方言
    pub preferred: Dialect,
    /// 路由类别
    pub routing_class: RoutingClass,
    /// 厂商（仅用于模型列表分组）
    #[serde(default = "default_vendor")]
    pub vendor: String,
}

fn default_vendor() -> String {
    "other".to_string()
}

impl ModelEntry {
    pub fn new(
        upstream_id: &str,
        dialects: DialectSet,
        preferred: Dialect,
        routing_class: RoutingClass,
        vendor: &str,
    ) -> Self {
        Self {
            upstream_id: upstream_id.to_string(),
            dialects,
            preferred,
            routing_class,
            vendor: vendor.to_string(),
        }
    }

    /// 只支持 Chat 方言的条目
    pub fn chat(upstream_id: &str, routing_class: RoutingClass, vendor: &str) -> Self {
        Self::new(
            upstream_id,
            DialectSet::ChatOnly,
            Dialect::Chat,
            routing_class,
            vendor,
        )
    }

    /// 首选方言与回退方言
    pub fn dialect_plan(&self) -> (Dialect, Option<Dialect>) {
        (self.preferred, self.dialects.fallback_for(self.preferred))
    }

    /// 首选方言必须属于支持的方言集合
    pub fn is_consistent(&self) -> bool {
        self.dialects.contains(self.preferred)
    }
}
