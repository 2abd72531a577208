//! Path token resolution shared by every command that accepts a path.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

const HOME_ALIASES: &[&str] = &["~", "$HOME"];

/// Resolves a user-supplied path token against `base`.
///
/// Rules apply in order: `..` is the parent of `base`; a home alias is the
/// platform home directory; an absolute token is taken verbatim; anything
/// else is joined onto `base`. The result is lexically normalized. Existence
/// is not checked here.
pub fn resolve_path(token: &str, base: &Path) -> PathBuf {
    let token = token.trim();
    if token == ".." {
        return normalize_path(&base.join(".."));
    }
    if HOME_ALIASES.contains(&token) {
        if let Some(home) = home_directory() {
            return normalize_path(&home);
        }
    }
    if let Some(rest) = token.strip_prefix("~/") {
        if let Some(home) = home_directory() {
            return normalize_path(&home.join(rest));
        }
    }
    if is_absolute_token(token) {
        return normalize_path(Path::new(token));
    }
    normalize_path(&base.join(token))
}

/// Absolute on the host platform, or rooted with a leading separator.
fn is_absolute_token(token: &str) -> bool {
    Path::new(token).is_absolute() || token.starts_with('/') || token.starts_with('\\')
}

pub fn home_directory() -> Option<PathBuf> {
    let variables: &[&str] = if cfg!(windows) {
        &["USERPROFILE", "HOME"]
    } else {
        &["HOME"]
    };
    variables
        .iter()
        .filter_map(|name| std::env::var_os(name))
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Collapses `.` and `..` components without touching the filesystem.
/// `..` at the root stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut prefix: Option<OsString> = None;
    let mut rooted = false;
    let mut parts: Vec<OsString> = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(value) => prefix = Some(value.as_os_str().to_os_string()),
            Component::RootDir => rooted = true,
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() && !rooted {
                    parts.push(OsString::from(".."));
                }
            }
            Component::Normal(value) => parts.push(value.to_os_string()),
        }
    }

    let mut normalized = PathBuf::new();
    if let Some(prefix) = prefix {
        normalized.push(prefix);
    }
    if rooted {
        normalized.push(Component::RootDir.as_os_str());
    }
    for part in parts {
        normalized.push(part);
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}
