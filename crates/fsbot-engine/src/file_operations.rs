//! Single-item file operations behind `cat`, `tail`, `cp`, `mv`, `mkdir` and
//! the download hand-off checks.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::engine_error::{EngineError, EngineResult};

/// Worst-case UTF-8 width, used to bound preview reads.
const MAX_UTF8_WIDTH: u64 = 4;

#[cfg(unix)]
const EXDEV: i32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextPreview {
    pub path: PathBuf,
    pub content: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TailResult {
    pub path: PathBuf,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub files: usize,
}

/// Fails unless `path` is an existing regular file; returns its metadata.
pub fn ensure_file(path: &Path) -> EngineResult<fs::Metadata> {
    let metadata = fs::metadata(path).map_err(|error| EngineError::from_io(error, path))?;
    if !metadata.is_file() {
        return Err(EngineError::NotAFile(path.display().to_string()));
    }
    Ok(metadata)
}

/// Checks that `path` can be handed to the transport as a download.
pub fn check_downloadable(path: &Path, max_bytes: u64) -> EngineResult<u64> {
    let size = ensure_file(path)?.len();
    if size > max_bytes {
        return Err(EngineError::InvalidArgument(format!(
            "{} is {size} bytes, above the {max_bytes} byte download limit; try /getzip",
            path.display()
        )));
    }
    Ok(size)
}

/// Reads at most `max_chars` characters from the start of a UTF-8 file.
pub fn read_text_prefix(path: &Path, max_chars: usize) -> EngineResult<TextPreview> {
    let file_len = ensure_file(path)?.len();
    let byte_budget = (max_chars as u64).saturating_mul(MAX_UTF8_WIDTH);
    let file = File::open(path).map_err(|error| EngineError::from_io(error, path))?;
    let mut bytes = Vec::new();
    file.take(byte_budget)
        .read_to_end(&mut bytes)
        .map_err(|error| EngineError::from_io(error, path))?;

    let text = match std::str::from_utf8(&bytes) {
        Ok(text) => text,
        // a multi-byte character cut by the read budget
        Err(error) if error.error_len().is_none() => {
            std::str::from_utf8(&bytes[..error.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => {
            return Err(EngineError::InvalidArgument(format!(
                "{} is not a UTF-8 text file",
                path.display()
            )))
        }
    };
    let content: String = text.chars().take(max_chars).collect();
    let truncated = content.len() < bytes.len() || (bytes.len() as u64) < file_len;
    Ok(TextPreview {
        path: path.to_path_buf(),
        content,
        truncated,
    })
}

/// Returns the last `count` lines of `path`, keeping only a `count`-line
/// window in memory. Invalid UTF-8 is replaced rather than rejected.
pub fn tail_lines(path: &Path, count: usize) -> EngineResult<TailResult> {
    ensure_file(path)?;
    if count == 0 {
        return Err(EngineError::InvalidArgument(
            "line count must be positive".to_string(),
        ));
    }
    let mut reader =
        BufReader::new(File::open(path).map_err(|error| EngineError::from_io(error, path))?);
    let mut window: VecDeque<String> = VecDeque::with_capacity(count.min(1024));
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        let read = reader
            .read_until(b'\n', &mut buffer)
            .map_err(|error| EngineError::from_io(error, path))?;
        if read == 0 {
            break;
        }
        while matches!(buffer.last(), Some(b'\n' | b'\r')) {
            buffer.pop();
        }
        if window.len() == count {
            window.pop_front();
        }
        window.push_back(String::from_utf8_lossy(&buffer).into_owned());
    }
    Ok(TailResult {
        path: path.to_path_buf(),
        lines: window.into(),
    })
}

/// Creates `path` and any missing parents. An existing target is an error.
pub fn make_directory(path: &Path) -> EngineResult<()> {
    if fs::symlink_metadata(path).is_ok() {
        return Err(EngineError::InvalidArgument(format!(
            "{} already exists",
            path.display()
        )));
    }
    fs::create_dir_all(path).map_err(|error| EngineError::from_io(error, path))
}

/// When `destination` is an existing directory the item lands inside it.
fn landing_path(source: &Path, destination: &Path) -> EngineResult<PathBuf> {
    if destination.is_dir() {
        let name = source.file_name().ok_or_else(|| {
            EngineError::InvalidArgument(format!("{} has no file name", source.display()))
        })?;
        return Ok(destination.join(name));
    }
    Ok(destination.to_path_buf())
}

fn reject_nested(source: &Path, target: &Path, verb: &str) -> EngineResult<()> {
    if target.starts_with(source) {
        return Err(EngineError::InvalidArgument(format!(
            "cannot {verb} {} into itself",
            source.display()
        )));
    }
    Ok(())
}

/// Refuses a landing path that is already taken, including the source
/// itself. `fs::copy` onto its own source truncates it.
fn reject_existing(target: &Path) -> EngineResult<()> {
    if fs::symlink_metadata(target).is_ok() {
        return Err(EngineError::InvalidArgument(format!(
            "{} already exists",
            target.display()
        )));
    }
    Ok(())
}

/// Copies a file, or a directory tree, to `destination`. Symbolic links
/// inside a copied tree are skipped.
pub fn copy_item(source: &Path, destination: &Path) -> EngineResult<TransferReport> {
    let metadata = fs::metadata(source).map_err(|error| EngineError::from_io(error, source))?;
    let target = landing_path(source, destination)?;

    if !metadata.is_dir() {
        reject_existing(&target)?;
        fs::copy(source, &target).map_err(|error| EngineError::from_io(error, &target))?;
        return Ok(TransferReport {
            source: source.to_path_buf(),
            destination: target,
            files: 1,
        });
    }

    reject_nested(source, &target, "copy")?;
    reject_existing(&target)?;
    let mut files = 0;
    for item in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let item = item.map_err(|error| {
            let at = error.path().unwrap_or(source).to_path_buf();
            EngineError::from_io(error.into(), &at)
        })?;
        let relative = item.path().strip_prefix(source).unwrap_or(item.path());
        let landing = target.join(relative);
        let file_type = item.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&landing).map_err(|error| EngineError::from_io(error, &landing))?;
        } else if file_type.is_file() {
            fs::copy(item.path(), &landing)
                .map_err(|error| EngineError::from_io(error, item.path()))?;
            files += 1;
        } else {
            tracing::debug!(path = %item.path().display(), "copy skipped non-regular entry");
        }
    }
    Ok(TransferReport {
        source: source.to_path_buf(),
        destination: target,
        files,
    })
}

/// Moves or renames `source`. Falls back to copy-then-delete when the
/// destination is on another filesystem. Existing targets are not replaced.
pub fn move_item(source: &Path, destination: &Path) -> EngineResult<TransferReport> {
    fs::symlink_metadata(source).map_err(|error| EngineError::from_io(error, source))?;
    let target = landing_path(source, destination)?;
    reject_nested(source, &target, "move")?;
    if fs::symlink_metadata(&target).is_ok() {
        return Err(EngineError::InvalidArgument(format!(
            "{} already exists",
            target.display()
        )));
    }

    match fs::rename(source, &target) {
        Ok(()) => Ok(TransferReport {
            source: source.to_path_buf(),
            destination: target,
            files: 1,
        }),
        Err(error) if crosses_devices(&error) => {
            let report = copy_item(source, &target)?;
            let removal = if source.is_dir() {
                fs::remove_dir_all(source)
            } else {
                fs::remove_file(source)
            };
            removal.map_err(|error| EngineError::from_io(error, source))?;
            Ok(report)
        }
        Err(error) => Err(EngineError::from_io(error, source)),
    }
}

#[cfg(unix)]
fn crosses_devices(error: &io::Error) -> bool {
    error.raw_os_error() == Some(EXDEV)
}

#[cfg(not(unix))]
fn crosses_devices(_error: &io::Error) -> bool {
    false
}
