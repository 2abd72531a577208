//! Plain-text rendering of engine results for the console transport.

use std::fmt::Write as _;

use fsbot_engine::{
    BookmarkChange, CommandFailure, CommandOutput, ConfirmationOutcome, DigestAlgorithm,
    EntryInfo, EntryKind, PendingAction, TreeRow,
};

const TREE_BRANCH: &str = "├── ";
const TREE_LAST: &str = "└── ";
const TREE_PIPE: &str = "│   ";
const TREE_GAP: &str = "    ";

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn entry_line(entry: &EntryInfo) -> String {
    match entry.kind {
        EntryKind::Directory => format!("[dir]  {}/", entry.name),
        EntryKind::File => format!(
            "[file] {} ({})",
            entry.name,
            format_size(entry.size.unwrap_or(0))
        ),
        EntryKind::Unreadable => format!(
            "[?]    {} (unreadable: {})",
            entry.name,
            entry.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Draws connectors from each row's depth and last-sibling flag.
pub fn render_tree_rows(root_label: &str, rows: &[TreeRow]) -> String {
    let mut out = format!("{root_label}/");
    let mut ancestors_last: Vec<bool> = Vec::new();
    for row in rows {
        ancestors_last.truncate(row.depth.saturating_sub(1));
        out.push('\n');
        for last in &ancestors_last {
            out.push_str(if *last { TREE_GAP } else { TREE_PIPE });
        }
        out.push_str(if row.is_last { TREE_LAST } else { TREE_BRANCH });
        out.push_str(&row.entry.name);
        if row.entry.is_directory() {
            out.push('/');
        }
        ancestors_last.push(row.is_last);
    }
    out
}

fn omitted_note(out: &mut String, omitted: usize) {
    if omitted > 0 {
        let _ = write!(out, "\n... and {omitted} more");
    }
}

pub fn render_output(output: &CommandOutput) -> String {
    match output {
        CommandOutput::Help { commands, topic } => match topic {
            Some(spec) => format!(
                "command: {}\nusage: {}\n{}\n{}\nexample: {}",
                spec.name, spec.usage, spec.description, spec.details, spec.example
            ),
            None => {
                let mut lines = vec!["commands:".to_string()];
                for spec in commands.iter() {
                    lines.push(format!("  {:<36} {}", spec.usage, spec.description));
                }
                lines.push("  /confirm <token> <yes|no>            Answer a pending confirmation".to_string());
                lines.push("tip: run /help <command> for details".to_string());
                lines.join("\n")
            }
        },
        CommandOutput::Listing {
            directory,
            entries,
            total_file_bytes,
        } => {
            let mut out = format!("{}", directory.display());
            if entries.is_empty() {
                out.push_str("\n(empty)");
            }
            for entry in entries {
                out.push('\n');
                out.push_str(&entry_line(entry));
            }
            let _ = write!(
                out,
                "\n{} items, {} in files",
                entries.len(),
                format_size(*total_file_bytes)
            );
            out
        }
        CommandOutput::DirectoryChanged {
            directory,
            directories,
            files,
        } => format!(
            "now in {}\n{directories} folders, {files} files",
            directory.display()
        ),
        CommandOutput::WorkingDirectory { path, name, parent } => {
            let parent = parent
                .as_ref()
                .map(|parent| parent.display().to_string())
                .unwrap_or_else(|| "(none)".to_string());
            format!("{}\nname: {name}\nparent: {parent}", path.display())
        }
        CommandOutput::Tree { root, depth, rows } => {
            let label = root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| root.display().to_string());
            format!("{}\n(depth {depth})", render_tree_rows(&label, rows))
        }
        CommandOutput::NameMatches {
            term,
            matches,
            omitted,
            ..
        } => {
            if matches.is_empty() {
                return format!("no names match '{term}'");
            }
            let mut out = format!("names matching '{term}':");
            for found in matches {
                let marker = if found.is_directory { "/" } else { "" };
                let _ = write!(out, "\n  {}{marker}", found.relative_path.display());
            }
            omitted_note(&mut out, *omitted);
            out
        }
        CommandOutput::ContentMatches {
            text,
            matches,
            omitted,
            ..
        } => {
            if matches.is_empty() {
                return format!("no lines contain '{text}'");
            }
            let mut out = format!("lines containing '{text}':");
            for found in matches {
                let _ = write!(
                    out,
                    "\n  {}:{}: {}",
                    found.relative_path.display(),
                    found.line_number,
                    found.line
                );
            }
            omitted_note(&mut out, *omitted);
            out
        }
        CommandOutput::Digest(result) => {
            let mut out = format!(
                "{} ({})",
                result.path.display(),
                format_size(result.bytes_read)
            );
            for algorithm in [
                DigestAlgorithm::Md5,
                DigestAlgorithm::Sha256,
                DigestAlgorithm::Sha512,
            ] {
                if let Some(hex) = result.hex(algorithm) {
                    let _ = write!(out, "\n{}: {hex}", algorithm.as_str().to_uppercase());
                }
            }
            out
        }
        CommandOutput::Archive(result) => format!(
            "packaged {} ({} files) in {:.2}s",
            result.archive.file_name(),
            result.entry_count,
            result.elapsed_seconds()
        ),
        CommandOutput::File { path, size } => {
            format!("sending {} ({})", path.display(), format_size(*size))
        }
        CommandOutput::Text(preview) => {
            let mut out = format!("{}\n{}", preview.path.display(), preview.content);
            if preview.truncated {
                out.push_str("\n... (truncated)");
            }
            out
        }
        CommandOutput::Tail(tail) => {
            let mut out = format!(
                "last {} lines of {}",
                tail.lines.len(),
                tail.path.display()
            );
            for line in &tail.lines {
                out.push('\n');
                out.push_str(line);
            }
            out
        }
        CommandOutput::Bookmarks(bookmarks) => {
            if bookmarks.is_empty() {
                return "no bookmarks saved".to_string();
            }
            let mut out = "bookmarks:".to_string();
            for (name, path) in bookmarks {
                let _ = write!(out, "\n  {name} -> {path}");
            }
            out
        }
        CommandOutput::Bookmark { name, path, change } => match change {
            BookmarkChange::Saved => format!("bookmark '{name}' saved: {}", path.display()),
            BookmarkChange::Opened => format!("now in {} (bookmark '{name}')", path.display()),
            BookmarkChange::Removed => {
                format!("bookmark '{name}' removed (was {})", path.display())
            }
        },
        CommandOutput::DirectoryCreated { path } => format!("created {}", path.display()),
        CommandOutput::Copied(report) => format!(
            "copied {} -> {} ({} files)",
            report.source.display(),
            report.destination.display(),
            report.files
        ),
        CommandOutput::Moved(report) => format!(
            "moved {} -> {}",
            report.source.display(),
            report.destination.display()
        ),
        CommandOutput::ConfirmationRequired { token, prompt, .. } => format!(
            "{prompt}\nreply /confirm {token} yes  or  /confirm {token} no"
        ),
        CommandOutput::ConfirmationResolved(outcome) => match outcome {
            ConfirmationOutcome::Accepted { action } => match action {
                PendingAction::DeleteItem { path } => format!("deleted {}", path.display()),
                PendingAction::KillProcess { pid } => format!("sent terminate to pid {pid}"),
            },
            ConfirmationOutcome::Rejected { action } => {
                format!("cancelled {} of {}", action.label(), action.target())
            }
        },
    }
}

pub fn render_failure(failure: &CommandFailure) -> String {
    format!("error [{}]: {}", failure.kind, failure.message)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use fsbot_engine::ErrorKind;

    use super::*;

    fn row(depth: usize, is_last: bool, name: &str, kind: EntryKind) -> TreeRow {
        TreeRow {
            depth,
            is_last,
            entry: EntryInfo {
                name: name.to_string(),
                path: PathBuf::from(name),
                kind,
                size: None,
                modified: None,
                error: None,
            },
        }
    }

    #[test]
    fn unit_format_size_scales_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn functional_tree_connectors_follow_last_sibling_flags() {
        let rows = vec![
            row(1, false, "a", EntryKind::Directory),
            row(2, false, "b", EntryKind::Directory),
            row(3, true, "deep.txt", EntryKind::File),
            row(2, true, "one.txt", EntryKind::File),
            row(1, true, "z.txt", EntryKind::File),
        ];
        let rendered = render_tree_rows("root", &rows);
        assert_eq!(
            rendered,
            "root/\n├── a/\n│   ├── b/\n│   │   └── deep.txt\n│   └── one.txt\n└── z.txt"
        );
        assert_eq!(render_tree_rows("root", &[]), "root/");
    }

    #[test]
    fn functional_search_rendering_notes_omitted_matches() {
        let output = CommandOutput::ContentMatches {
            root: PathBuf::from("/srv"),
            text: "todo".to_string(),
            matches: vec![fsbot_engine::ContentMatch {
                relative_path: PathBuf::from("plan.txt"),
                line_number: 2,
                line: "fix TODO".to_string(),
            }],
            omitted: 7,
        };
        let rendered = render_output(&output);
        assert!(rendered.contains("plan.txt:2: fix TODO"));
        assert!(rendered.ends_with("... and 7 more"));
    }

    #[test]
    fn unit_failure_rendering_carries_kind() {
        let failure = CommandFailure {
            kind: ErrorKind::NavigationError,
            message: "cannot move up: / is the filesystem root".to_string(),
        };
        assert_eq!(
            render_failure(&failure),
            "error [navigation_error]: cannot move up: / is the filesystem root"
        );
    }
}
