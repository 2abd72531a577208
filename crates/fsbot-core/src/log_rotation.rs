use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const LOG_ROTATION_MAX_BYTES_ENV: &str = "FSBOT_LOG_ROTATION_MAX_BYTES";
pub const LOG_ROTATION_MAX_FILES_ENV: &str = "FSBOT_LOG_ROTATION_MAX_FILES";

const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;
const DEFAULT_MAX_FILES: usize = 5;

/// Size-based rotation limits for append-only logs.
///
/// `max_files` counts the active file plus its numbered backups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotationPolicy {
    pub max_bytes: u64,
    pub max_files: usize,
}

impl Default for LogRotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl LogRotationPolicy {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a policy from a key lookup, ignoring unparsable or zero values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_bytes = lookup(LOG_ROTATION_MAX_BYTES_ENV)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(defaults.max_bytes);
        let max_files = lookup(LOG_ROTATION_MAX_FILES_ENV)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(defaults.max_files);
        Self {
            max_bytes,
            max_files,
        }
    }
}

/// Appends `line` plus a newline to `path`, rotating first when the write
/// would push the active file past `policy.max_bytes`.
pub fn append_line_with_rotation(path: &Path, line: &str, policy: LogRotationPolicy) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    if let Ok(metadata) = std::fs::metadata(path) {
        let incoming = u64::try_from(line.len()).unwrap_or(u64::MAX).saturating_add(1);
        if metadata.len().saturating_add(incoming) > policy.max_bytes {
            rotate(path, policy.max_files)?;
        }
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("failed to append {}", path.display()))?;
    Ok(())
}

fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(format!(".{index}"));
    PathBuf::from(raw)
}

fn rotate(path: &Path, max_files: usize) -> Result<()> {
    if max_files <= 1 {
        return std::fs::remove_file(path)
            .with_context(|| format!("failed to truncate {}", path.display()));
    }

    let oldest = backup_path(path, max_files - 1);
    if oldest.exists() {
        std::fs::remove_file(&oldest)
            .with_context(|| format!("failed to drop {}", oldest.display()))?;
    }
    for index in (1..max_files - 1).rev() {
        let from = backup_path(path, index);
        if from.exists() {
            let to = backup_path(path, index + 1);
            std::fs::rename(&from, &to).with_context(|| {
                format!("failed to shift {} to {}", from.display(), to.display())
            })?;
        }
    }
    let first = backup_path(path, 1);
    std::fs::rename(path, &first)
        .with_context(|| format!("failed to rotate {} to {}", path.display(), first.display()))
}
