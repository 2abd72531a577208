use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    pub details: &'static str,
    pub example: &'static str,
}

pub const COMMAND_SPECS: &[CommandSpec] = &[
    CommandSpec {
        name: "/help",
        usage: "/help [command]",
        description: "Show command list or detailed command help",
        details: "'/start' is an alias. Use '/help cd' for command-specific guidance.",
        example: "/help tree",
    },
    CommandSpec {
        name: "/ls",
        usage: "/ls",
        description: "List the current directory",
        details: "Directories first, then files, each sorted case-insensitively. Shows item count and total file size.",
        example: "/ls",
    },
    CommandSpec {
        name: "/cd",
        usage: "/cd <dir>",
        description: "Change the working directory",
        details: "Accepts relative paths, absolute paths, '..' and '~'.",
        example: "/cd ~/projects",
    },
    CommandSpec {
        name: "/up",
        usage: "/up",
        description: "Move to the parent directory",
        details: "Fails at the filesystem root without changing directory.",
        example: "/up",
    },
    CommandSpec {
        name: "/pwd",
        usage: "/pwd",
        description: "Show the working directory",
        details: "Includes the directory name and its parent.",
        example: "/pwd",
    },
    CommandSpec {
        name: "/tree",
        usage: "/tree [depth]",
        description: "Show the directory tree",
        details: "Depth counts from the immediate children of the working directory and defaults to 3.",
        example: "/tree 2",
    },
    CommandSpec {
        name: "/get",
        usage: "/get <file>",
        description: "Download a file",
        details: "Files above the configured download limit are refused; archive them with /getzip instead.",
        example: "/get report.pdf",
    },
    CommandSpec {
        name: "/getzip",
        usage: "/getzip <path>",
        description: "Download a file or folder as a zip archive",
        details: "Uses maximum compression and reports packaging time. The archive is removed after the hand-off.",
        example: "/getzip src",
    },
    CommandSpec {
        name: "/cat",
        usage: "/cat <file>",
        description: "Show the beginning of a text file",
        details: "Shows at most the first 1000 characters of UTF-8 text.",
        example: "/cat notes.txt",
    },
    CommandSpec {
        name: "/tail",
        usage: "/tail <file> [lines]",
        description: "Show the last lines of a file",
        details: "A trailing number selects the line count, default 10.",
        example: "/tail app.log 50",
    },
    CommandSpec {
        name: "/find",
        usage: "/find <term>",
        description: "Find files and folders by name",
        details: "Case-insensitive substring match below the working directory.",
        example: "/find report",
    },
    CommandSpec {
        name: "/search",
        usage: "/search <text>",
        description: "Search text file contents",
        details: "Case-insensitive line match in text-like files. The first 20 matches are shown.",
        example: "/search TODO",
    },
    CommandSpec {
        name: "/bookmark",
        usage: "/bookmark <add|list|go|del> [name]",
        description: "Manage directory bookmarks",
        details: "'add' saves the working directory under a name; 'go' navigates to it.",
        example: "/bookmark add logs",
    },
    CommandSpec {
        name: "/mkdir",
        usage: "/mkdir <name>",
        description: "Create a directory",
        details: "Missing parent directories are created too. Existing targets are refused.",
        example: "/mkdir build/output",
    },
    CommandSpec {
        name: "/rm",
        usage: "/rm <path>",
        description: "Delete a file or folder",
        details: "Asks for confirmation first. Folders are removed recursively.",
        example: "/rm old.log",
    },
    CommandSpec {
        name: "/cp",
        usage: "/cp <src> <dst>",
        description: "Copy a file or folder",
        details: "Folders are copied recursively. Quote paths containing spaces.",
        example: "/cp notes.txt backup/",
    },
    CommandSpec {
        name: "/mv",
        usage: "/mv <src> <dst>",
        description: "Move or rename a file or folder",
        details: "Existing targets are not replaced. Quote paths containing spaces.",
        example: "/mv draft.md final.md",
    },
    CommandSpec {
        name: "/hash",
        usage: "/hash <file>",
        description: "Compute MD5 and SHA-256 digests",
        details: "Reads the file once, feeding both algorithms per chunk.",
        example: "/hash release.tar.gz",
    },
    CommandSpec {
        name: "/kill",
        usage: "/kill <pid>",
        description: "Terminate a process",
        details: "Asks for confirmation first and shows the process name.",
        example: "/kill 4242",
    },
    CommandSpec {
        name: "/logs",
        usage: "/logs",
        description: "Download the bot logs as a zip archive",
        details: "Packages *.log and *.jsonl files from the configured log directory.",
        example: "/logs",
    },
];

pub fn find_command_spec(name: &str) -> Option<&'static CommandSpec> {
    let trimmed = name.trim();
    let normalized = if trimmed.starts_with('/') {
        trimmed.to_ascii_lowercase()
    } else {
        format!("/{}", trimmed.to_ascii_lowercase())
    };
    let canonical = match normalized.as_str() {
        "/start" => "/help",
        other => other,
    };
    COMMAND_SPECS.iter().find(|spec| spec.name == canonical)
}

pub fn usage_for(name: &str) -> &'static str {
    find_command_spec(name)
        .map(|spec| spec.usage)
        .unwrap_or("/help")
}

pub fn unknown_command_message(command: &str) -> String {
    match suggest_command(command) {
        Some(suggestion) => {
            format!("unknown command: {command}; did you mean {suggestion}? run /help for command list")
        }
        None => format!("unknown command: {command}; run /help for command list"),
    }
}

fn suggest_command(command: &str) -> Option<&'static str> {
    let command = command.trim().to_ascii_lowercase();
    let command = if command.starts_with('/') {
        command
    } else {
        format!("/{command}")
    };
    if command.len() < 2 {
        return None;
    }
    if let Some(prefix_match) = COMMAND_SPECS
        .iter()
        .map(|spec| spec.name)
        .find(|candidate| candidate.starts_with(&command))
    {
        return Some(prefix_match);
    }

    let (candidate, distance) = COMMAND_SPECS
        .iter()
        .map(|spec| (spec.name, levenshtein_distance(&command, spec.name)))
        .min_by_key(|(_, distance)| *distance)?;
    let threshold = match command.len() {
        0..=4 => 1,
        5..=8 => 2,
        _ => 3,
    };
    (distance <= threshold).then_some(candidate)
}

fn levenshtein_distance(left: &str, right: &str) -> usize {
    let right_chars: Vec<char> = right.chars().collect();
    let mut previous: Vec<usize> = (0..=right_chars.len()).collect();
    let mut current = vec![0; right_chars.len() + 1];
    for (i, left_char) in left.chars().enumerate() {
        current[0] = i + 1;
        for (j, right_char) in right_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(left_char != *right_char);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[right_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_catalogue_names_are_unique_and_slashed() {
        let mut names: Vec<&str> = COMMAND_SPECS.iter().map(|spec| spec.name).collect();
        assert!(names.iter().all(|name| name.starts_with('/')));
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), COMMAND_SPECS.len());
        assert_eq!(COMMAND_SPECS[0].name, "/help");
    }

    #[test]
    fn unit_lookup_accepts_bare_and_aliased_names() {
        assert_eq!(find_command_spec("TREE").map(|spec| spec.name), Some("/tree"));
        assert_eq!(find_command_spec("/start").map(|spec| spec.name), Some("/help"));
        assert_eq!(usage_for("cp"), "/cp <src> <dst>");
        assert!(find_command_spec("/df").is_none());
    }

    #[test]
    fn functional_unknown_command_suggests_nearby_name() {
        assert!(unknown_command_message("/serch").contains("did you mean /search?"));
        assert!(unknown_command_message("/getz").contains("did you mean /getzip?"));
        assert!(!unknown_command_message("/qqqqqqqq").contains("did you mean"));
    }

    #[test]
    fn unit_levenshtein_distance_counts_edits() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }
}
