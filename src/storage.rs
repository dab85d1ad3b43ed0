//! 客户端本地偏好
//!
//! 只持久化一项：引导提示是否已被永久关闭。读取失败或缺失都按「未关闭」处理，写入失败只记日志。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

pub const ONBOARDING_DISMISSED_KEY: &str = "miniapp.onboarding.dismissed";

/// 简单的 get / set 存储
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// JSON 文件存储（键值对对象）
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> anyhow::Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", self.path.display()))
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        // 文件损坏时从空表重写
        let mut values = self.read_all().unwrap_or_default();
        values.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&values)?;
        std::fs::write(&self.path, raw).with_context(|| format!("write {}", self.path.display()))
    }
}

/// 内存存储（测试与无数据目录时）
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("preference store poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("preference store poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn onboarding_dismissed(store: &dyn PreferenceStore) -> bool {
    match store.get(ONBOARDING_DISMISSED_KEY) {
        Ok(Some(value)) => matches!(value.trim(), "1" | "true"),
        Ok(None) => false,
        Err(e) => {
            tracing::debug!("Preference read failed, treating onboarding as active: {:#}", e);
            false
        }
    }
}

pub fn remember_onboarding_dismissed(store: &dyn PreferenceStore) {
    if let Err(e) = store.set(ONBOARDING_DISMISSED_KEY, "1") {
        tracing::warn!("Could not persist onboarding dismissal: {:#}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("prefs.json"));
        assert!(!onboarding_dismissed(&store));
        remember_onboarding_dismissed(&store);
        assert!(onboarding_dismissed(&store));

        let reopened = FileStore::new(store.path().to_path_buf());
        assert!(onboarding_dismissed(&reopened));
    }

    #[test]
    fn test_corrupt_file_means_not_dismissed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileStore::new(&path);
        assert!(!onboarding_dismissed(&store));
        remember_onboarding_dismissed(&store);
        assert!(onboarding_dismissed(&store));
    }

    #[test]
    fn test_unknown_value_is_not_dismissed() {
        let store = MemoryStore::default();
        store.set(ONBOARDING_DISMISSED_KEY, "maybe").unwrap();
        assert!(!onboarding_dismissed(&store));
    }
}
