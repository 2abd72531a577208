//! Directory listings, depth-bounded trees, and recursive name/content search.
//!
//! Recursive operations are pull-based iterators: each `next()` does just
//! enough filesystem work to produce one item, so large trees are never
//! buffered in full. Recursive walks do not follow symbolic links.

use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, BufReader};
use std::iter::Peekable;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use walkdir::WalkDir;

use crate::engine_error::{EngineError, EngineResult};

pub const DEFAULT_TREE_DEPTH: usize = 3;

/// Extensions considered text by content search, compared case-insensitively.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "log", "py", "java", "cpp", "h", "c", "js", "html", "css", "xml", "json", "md", "ini",
    "conf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// One inspected directory entry.
pub struct EntryInfo {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    /// Why an `Unreadable` entry could not be inspected.
    pub error: Option<String>,
}

impl EntryInfo {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Fails unless `path` exists and is a directory.
pub fn ensure_directory(path: &Path) -> EngineResult<()> {
    let metadata = fs::metadata(path).map_err(|error| EngineError::from_io(error, path))?;
    if !metadata.is_dir() {
        return Err(EngineError::NotADirectory(path.display().to_string()));
    }
    Ok(())
}

/// Lists one level of `directory`, directories first, then by case-insensitive
/// name. Entries that cannot be inspected become `Unreadable` items.
pub fn list_directory(directory: &Path) -> EngineResult<Vec<EntryInfo>> {
    ensure_directory(directory)?;
    let reader = fs::read_dir(directory).map_err(|error| EngineError::from_io(error, directory))?;

    let mut entries = Vec::new();
    for dir_entry in reader {
        match dir_entry {
            Ok(dir_entry) => entries.push(inspect_entry(
                dir_entry.file_name().to_string_lossy().into_owned(),
                dir_entry.path(),
            )),
            Err(error) => {
                tracing::debug!(directory = %directory.display(), %error, "skipping unreadable entry");
            }
        }
    }
    sort_entries(&mut entries);
    Ok(entries)
}

fn inspect_entry(name: String, path: PathBuf) -> EntryInfo {
    match fs::metadata(&path) {
        Ok(metadata) => {
            let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
            if metadata.is_dir() {
                EntryInfo {
                    name,
                    path,
                    kind: EntryKind::Directory,
                    size: None,
                    modified,
                    error: None,
                }
            } else {
                EntryInfo {
                    name,
                    path,
                    kind: EntryKind::File,
                    size: Some(metadata.len()),
                    modified,
                    error: None,
                }
            }
        }
        Err(error) => EntryInfo {
            name,
            path,
            kind: EntryKind::Unreadable,
            size: None,
            modified: None,
            error: Some(error.to_string()),
        },
    }
}

fn sort_entries(entries: &mut [EntryInfo]) {
    entries.sort_by_cached_key(|entry| {
        (
            !entry.is_directory(),
            entry.name.to_lowercase(),
            entry.name.clone(),
        )
    });
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// A tree entry with what a renderer needs to draw connectors.
pub struct TreeRow {
    /// 1 for immediate children of the tree root.
    pub depth: usize,
    pub is_last: bool,
    pub entry: EntryInfo,
}

struct TreeFrame {
    depth: usize,
    children: Peekable<std::vec::IntoIter<EntryInfo>>,
}

/// Depth-first, pre-order walk yielding [`TreeRow`]s in listing order.
pub struct DirectoryTree {
    max_depth: usize,
    stack: Vec<TreeFrame>,
}

/// Starts a tree walk of `root`. `max_depth == 0` yields nothing.
pub fn tree(root: &Path, max_depth: usize) -> EngineResult<DirectoryTree> {
    let mut stack = Vec::new();
    if max_depth == 0 {
        ensure_directory(root)?;
    } else {
        stack.push(TreeFrame {
            depth: 1,
            children: list_directory(root)?.into_iter().peekable(),
        });
    }
    Ok(DirectoryTree { max_depth, stack })
}

impl Iterator for DirectoryTree {
    type Item = TreeRow;

    fn next(&mut self) -> Option<TreeRow> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.children.next() else {
                self.stack.pop();
                continue;
            };
            let depth = frame.depth;
            let is_last = frame.children.peek().is_none();

            if depth < self.max_depth && is_real_directory(&entry.path) {
                match list_directory(&entry.path) {
                    Ok(children) if !children.is_empty() => self.stack.push(TreeFrame {
                        depth: depth + 1,
                        children: children.into_iter().peekable(),
                    }),
                    Ok(_) => {}
                    Err(error) => {
                        tracing::debug!(path = %entry.path.display(), %error, "tree skipped children");
                    }
                }
            }
            return Some(TreeRow {
                depth,
                is_last,
                entry,
            });
        }
    }
}

/// True for directories reached without passing through a symbolic link.
fn is_real_directory(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|metadata| metadata.is_dir())
}

fn walk_below(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameMatch {
    pub relative_path: PathBuf,
    pub is_directory: bool,
}

/// Lazy case-insensitive substring search over entry names below a root.
pub struct NameSearch {
    root: PathBuf,
    needle: String,
    walker: walkdir::IntoIter,
}

pub fn find_by_name(root: &Path, term: &str) -> EngineResult<NameSearch> {
    ensure_directory(root)?;
    Ok(NameSearch {
        root: root.to_path_buf(),
        needle: term.to_lowercase(),
        walker: walk_below(root),
    })
}

impl Iterator for NameSearch {
    type Item = NameMatch;

    fn next(&mut self) -> Option<NameMatch> {
        for result in self.walker.by_ref() {
            let entry = match result {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::debug!(%error, "name search skipped entry");
                    continue;
                }
            };
            if !entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .contains(&self.needle)
            {
                continue;
            }
            return Some(NameMatch {
                relative_path: relative_to(&self.root, entry.path()),
                is_directory: entry.file_type().is_dir(),
            });
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentMatch {
    pub relative_path: PathBuf,
    /// 1-based.
    pub line_number: usize,
    pub line: String,
}

/// Lazy line-level search over text files below a root.
///
/// Only files whose extension is in [`TEXT_EXTENSIONS`] are read. A file that
/// fails to open or is not valid UTF-8 contributes no matches at all.
pub struct ContentSearch {
    root: PathBuf,
    needle: String,
    walker: walkdir::IntoIter,
    pending: VecDeque<ContentMatch>,
}

pub fn search_content(root: &Path, text: &str) -> EngineResult<ContentSearch> {
    ensure_directory(root)?;
    Ok(ContentSearch {
        root: root.to_path_buf(),
        needle: text.to_lowercase(),
        walker: walk_below(root),
        pending: VecDeque::new(),
    })
}

pub fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            TEXT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
        .unwrap_or(false)
}

impl ContentSearch {
    /// Matches up to the first unreadable line are kept.
    fn scan_file(&self, path: &Path) -> Vec<ContentMatch> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "content search skipped file");
                return Vec::new();
            }
        };
        let relative_path = relative_to(&self.root, path);
        let mut matches = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(error) => {
                    tracing::debug!(
                        path = %path.display(),
                        line_number = index + 1,
                        %error,
                        "content search stopped reading file"
                    );
                    break;
                }
            };
            if line.to_lowercase().contains(&self.needle) {
                matches.push(ContentMatch {
                    relative_path: relative_path.clone(),
                    line_number: index + 1,
                    line: line.trim().to_string(),
                });
            }
        }
        matches
    }
}

impl Iterator for ContentSearch {
    type Item = ContentMatch;

    fn next(&mut self) -> Option<ContentMatch> {
        loop {
            if let Some(found) = self.pending.pop_front() {
                return Some(found);
            }
            let entry = loop {
                match self.walker.next()? {
                    Ok(entry) if entry.file_type().is_file() && has_text_extension(entry.path()) => {
                        break entry
                    }
                    Ok(_) => {}
                    Err(error) => tracing::debug!(%error, "content search skipped entry"),
                }
            };
            let matches = self.scan_file(entry.path());
            self.pending.extend(matches);
        }
    }
}
