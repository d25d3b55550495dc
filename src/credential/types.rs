//! 凭证类型定义

use indexmap::IndexMap;
use std::collections::HashMap;

/// 池中的单个凭证
///
/// `Debug` 输出不包含凭证本身，只包含池名和序号。
#[derive(Clone, PartialEq, Eq)]
pub struct PoolCredential {
    /// 凭证池名称
    pub pool_name: String,
    /// Bearer token（不透明字符串）
    pub credential: String,
    /// 在所属池内的序号，从 0 开始
    pub index: usize,
}

impl PoolCredential {
    /// 日志里用来指代凭证的标签，如 `reverse#1`
    pub fn label(&self) -> String {
        format!("{}#{}", self.pool_name, self.index)
    }
}

impl std::fmt::Debug for PoolCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolCredential")
            .field("pool_name", &self.pool_name)
            .field("index", &self.index)
            .field("credential", &"***")
            .finish()
    }
}

/// 按顺序排列的凭证列表，每个请求重新构建
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPool {
    entries: Vec<PoolCredential>,
}

impl CredentialPool {
    pub fn new(entries: Vec<PoolCredential>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PoolCredential> {
        self.entries.iter()
    }

    pub fn get(&self, slot: usize) -> Option<&PoolCredential> {
        self.entries.get(slot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 出现过的池名，按首次出现顺序
    pub fn pool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !names.contains(&entry.pool_name.as_str()) {
                names.push(&entry.pool_name);
            }
        }
        names
    }
}

impl<'a> IntoIterator for &'a CredentialPool {
    type Item = &'a PoolCredential;
    type IntoIter = std::slice::Iter<'a, PoolCredential>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// 拆分逗号分隔的密钥串：去掉首尾空白，丢弃空项，保持原顺序
pub fn split_secret(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 已配置的各池密钥
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConfiguredSecrets {
    pools: HashMap<String, Vec<String>>,
}

impl ConfiguredSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 池名 → 逗号分隔串 的映射构建
    pub fn from_raw(raw: &IndexMap<String, String>) -> Self {
        let mut secrets = Self::new();
        for (name, value) in raw {
            secrets.insert_raw(name, value);
        }
        secrets
    }

    /// 设置某个池的密钥串（覆盖已有值）
    pub fn insert_raw(&mut self, pool_name: &str, raw: &str) {
        self.pools.insert(pool_name.to_string(), split_secret(raw));
    }

    /// 池内凭证；未配置时为空切片
    pub fn credentials(&self, pool_name: &str) -> &[String] {
        self.pools
            .get(pool_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_pool(&self, pool_name: &str) -> bool {
        !self.credentials(pool_name).is_empty()
    }
}

impl std::fmt::Debug for ConfiguredSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<(&str, usize)> = self
            .pools
            .iter()
            .map(|(name, keys)| (name.as_str(), keys.len()))
            .collect();
        counts.sort();
        f.debug_struct("ConfiguredSecrets")
            .field("pools", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_secret() {
        assert_eq!(split_secret("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(split_secret("").is_empty());
        assert!(split_secret(" , ,").is_empty());
    }

    #[test]
    fn test_debug_hides_credentials() {
        let cred = PoolCredential {
            pool_name: "reverse".to_string(),
            credential: "sk-secret-value".to_string(),
            index: 0,
        };
        let out = format!("{:?}", cred);
        assert!(!out.contains("sk-secret-value"));
        assert!(out.contains("reverse"));

        let mut secrets = ConfiguredSecrets::new();
        secrets.insert_raw("reverse", "sk-secret-value");
        assert!(!format!("{:?}", secrets).contains("sk-secret-value"));
    }

    #[test]
    fn test_label() {
        let cred = PoolCredential {
            pool_name: "gemini".to_string(),
            credential: "k".to_string(),
            index: 2,
        };
        assert_eq!(cred.label(), "gemini#2");
    }
}
