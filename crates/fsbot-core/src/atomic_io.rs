use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::time_utils::current_unix_timestamp_ms;

/// Persists `content` at `path` through a sibling temp file and a rename, so a
/// reader sees either the previous mapping or the new one, never a torn write.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)
        .with_context(|| format!("failed to create {}", directory.display()))?;

    let stem = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("state");
    let staging = directory.join(format!(
        ".{stem}.tmp-{}-{}",
        std::process::id(),
        current_unix_timestamp_ms()
    ));
    std::fs::write(&staging, content)
        .with_context(|| format!("failed to stage {}", staging.display()))?;
    if let Err(error) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        return Err(error).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                staging.display(),
                path.display()
            )
        });
    }
    Ok(())
}
