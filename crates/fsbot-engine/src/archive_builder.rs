//! Streaming zip packaging of a file or directory subtree.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};
use std::time::{Duration, Instant};

use tempfile::TempPath;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::engine_error::{EngineError, EngineResult};

const MAX_DEFLATE_LEVEL: i64 = 9;
const ZIP32_LIMIT: u64 = u32::MAX as u64;

/// A packaged archive on disk. The file is removed when this value drops,
/// whether or not the hand-off to the transport succeeded.
#[derive(Debug)]
pub struct TransientArchive {
    file_name: String,
    path: TempPath,
}

impl TransientArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Suggested download name, `<source name>.zip`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }

    /// Removes the archive now, reporting failures the drop would swallow.
    pub fn close(self) -> io::Result<()> {
        self.path.close()
    }
}

#[derive(Debug)]
pub struct ArchiveResult {
    pub archive: TransientArchive,
    /// Packaging time only.
    pub elapsed: Duration,
    /// Number of files stored (directories not counted).
    pub entry_count: usize,
}

impl ArchiveResult {
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Packages `source` into a temporary zip under `scratch_dir` with maximum
/// deflate compression. Entry names are relative to the parent of `source`,
/// so the archive root is the source's own name.
pub fn build_zip(source: &Path, scratch_dir: &Path) -> EngineResult<ArchiveResult> {
    build_zip_filtered(source, scratch_dir, |_| true)
}

/// Like [`build_zip`], storing only files accepted by `include`.
pub fn build_zip_filtered(
    source: &Path,
    scratch_dir: &Path,
    include: impl Fn(&Path) -> bool,
) -> EngineResult<ArchiveResult> {
    let metadata = fs::metadata(source).map_err(|error| EngineError::from_io(error, source))?;
    let source_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());

    let staging = tempfile::Builder::new()
        .prefix(&format!("{source_name}-"))
        .suffix(".zip")
        .tempfile_in(scratch_dir)
        .map_err(|error| {
            EngineError::internal(
                format!("failed to create archive in {}", scratch_dir.display()),
                error,
            )
        })?;
    let (file, path) = staging.into_parts();

    let started = Instant::now();
    let base = source.parent().unwrap_or(source);
    let mut writer = ZipWriter::new(file);
    let mut entry_count = 0;

    if metadata.is_dir() {
        for item in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let item = item.map_err(|error| {
                let at = error.path().unwrap_or(source).to_path_buf();
                EngineError::from_io(error.into(), &at)
            })?;
            let file_type = item.file_type();
            if file_type.is_dir() {
                writer
                    .add_directory(entry_name(base, item.path()), archive_options(0))
                    .map_err(|error| zip_failure(source, error))?;
            } else if file_type.is_file() && include(item.path()) {
                append_file(&mut writer, base, item.path())?;
                entry_count += 1;
            } else {
                tracing::debug!(path = %item.path().display(), "archive skipped entry");
            }
        }
    } else {
        append_file(&mut writer, base, source)?;
        entry_count = 1;
    }

    writer.finish().map_err(|error| zip_failure(source, error))?;
    let elapsed = started.elapsed();
    tracing::info!(
        source = %source.display(),
        entries = entry_count,
        elapsed_ms = elapsed.as_millis() as u64,
        "archive packaged"
    );

    Ok(ArchiveResult {
        archive: TransientArchive {
            file_name: format!("{source_name}.zip"),
            path,
        },
        elapsed,
        entry_count,
    })
}

fn archive_options(size: u64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(MAX_DEFLATE_LEVEL))
        .large_file(size >= ZIP32_LIMIT)
}

fn append_file(writer: &mut ZipWriter<File>, base: &Path, path: &Path) -> EngineResult<()> {
    let mut input = File::open(path).map_err(|error| EngineError::from_io(error, path))?;
    let size = input
        .metadata()
        .map_err(|error| EngineError::from_io(error, path))?
        .len();
    writer
        .start_file(entry_name(base, path), archive_options(size))
        .map_err(|error| zip_failure(path, error))?;
    io::copy(&mut input, writer).map_err(|error| EngineError::from_io(error, path))?;
    Ok(())
}

/// Zip entry names always use `/` separators.
fn entry_name(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn zip_failure(path: &Path, error: zip::result::ZipError) -> EngineError {
    EngineError::internal(format!("failed to archive {}", path.display()), error)
}
