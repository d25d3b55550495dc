//! 聊天接口模型
//!
//! 入站请求体与出站响应体的数据结构。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 默认采样温度
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// 单条消息
///
/// `content` 与其他附加字段原样转发给上游。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Value::String(content.to_string()),
            extra: Map::new(),
        }
    }
}

/// 请求动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CheckPassword,
    Chat,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CheckPassword => "check_password",
            Action::Chat => "chat",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check_password" => Ok(Action::CheckPassword),
            "chat" => Ok(Action::Chat),
            _ => Err(format!("Unknown action: {s}")),
        }
    }
}

/// 入站请求体
///
/// 字段都是可选的，缺失与类型错误在处理器里逐项校验。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub action: Option<String>,
    /// 数字、布尔等标量按字符串比较，不因类型不对而变成请求体错误
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Option<Value>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl ChatRequest {
    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    })
}

/// 校验 messages：必须是非空数组，且每一项都是 `{role, content}`
pub fn parse_messages(value: Option<&Value>) -> Option<Vec<ChatMessage>> {
    let items = value?.as_array()?;
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| serde_json::from_value::<ChatMessage>(item.clone()).ok())
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyMessage {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyChoice {
    pub message: ReplyMessage,
}

impl ReplyChoice {
    pub fn text(content: &str) -> Self {
        Self {
            message: ReplyMessage {
                content: content.to_string(),
            },
        }
    }
}
