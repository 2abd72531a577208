//! Persistence seam for small name→string tables such as bookmarks.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use fsbot_core::write_text_atomic;

pub type NamedStrings = BTreeMap<String, String>;

/// Load/save of a named string-to-string mapping.
pub trait NamedStringStore: Send + Sync {
    /// Returns an empty mapping when nothing was saved under `key` yet.
    fn load(&self, key: &str) -> Result<NamedStrings>;
    fn save(&self, key: &str, mapping: &NamedStrings) -> Result<()>;
}

/// One pretty-printed JSON object per key, stored as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            bail!("invalid store key '{key}'");
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl NamedStringStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<NamedStrings> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(NamedStrings::new());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(NamedStrings::new());
        }
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    fn save(&self, key: &str, mapping: &NamedStrings) -> Result<()> {
        let path = self.path_for(key)?;
        let mut rendered =
            serde_json::to_string_pretty(mapping).context("failed to encode mapping")?;
        rendered.push('\n');
        write_text_atomic(&path, &rendered)
    }
}

/// Process-local store, mainly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, NamedStrings>>,
}

impl NamedStringStore for MemoryStore {
    fn load(&self, key: &str) -> Result<NamedStrings> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(tables.get(key).cloned().unwrap_or_default())
    }

    fn save(&self, key: &str, mapping: &NamedStrings) -> Result<()> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        tables.insert(key.to_string(), mapping.clone());
        Ok(())
    }
}
