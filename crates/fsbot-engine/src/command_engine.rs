//! Top-level dispatcher: authorize, validate arguments, run the component,
//! and map failures into the uniform `{ok:false, kind, message}` shape.
//!
//! The session lock is held only while navigation state is read or changed.
//! Traversal, archiving, digesting and copying run against a snapshot of the
//! working directory taken at dispatch start.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fsbot_access::CallerAuthorizer;
use serde::Serialize;

use crate::archive_builder::{build_zip, build_zip_filtered, ArchiveResult};
use crate::command_catalog::{find_command_spec, unknown_command_message, usage_for, CommandSpec};
use crate::confirmation_registry::{
    ConfirmationOutcome, ConfirmationRegistry, PendingAction, RegistryLimits,
    DEFAULT_CONFIRMATION_TTL, DEFAULT_MAX_PENDING_CONFIRMATIONS,
};
use crate::digest_calculator::{digest_file, DigestAlgorithm, DigestResult};
use crate::engine_error::{EngineError, EngineResult, ErrorKind};
use crate::file_operations::{
    check_downloadable, copy_item, make_directory, move_item, read_text_prefix, tail_lines,
    TailResult, TextPreview, TransferReport,
};
use crate::named_string_store::NamedStrings;
use crate::path_resolver::resolve_path;
use crate::process_control::ProcessControl;
use crate::session_state::SessionState;
use crate::traversal_engine::{
    ensure_directory, find_by_name, list_directory, search_content, tree, ContentMatch, EntryInfo,
    EntryKind, NameMatch, TreeRow, DEFAULT_TREE_DEPTH,
};

pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const SEARCH_DISPLAY_LIMIT: usize = 20;
pub const CAT_MAX_CHARS: usize = 1000;
pub const DEFAULT_TAIL_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub confirmation_ttl: Duration,
    pub max_pending_confirmations: usize,
    pub max_download_bytes: u64,
    /// Where transient archives are staged.
    pub scratch_dir: PathBuf,
    /// Source of the `logs` verb; `None` disables it.
    pub log_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confirmation_ttl: DEFAULT_CONFIRMATION_TTL,
            max_pending_confirmations: DEFAULT_MAX_PENDING_CONFIRMATIONS,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            scratch_dir: std::env::temp_dir(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkChange {
    Saved,
    Opened,
    Removed,
}

/// Plain result values for the transport to render.
#[derive(Debug)]
pub enum CommandOutput {
    Help {
        commands: &'static [CommandSpec],
        topic: Option<&'static CommandSpec>,
    },
    Listing {
        directory: PathBuf,
        entries: Vec<EntryInfo>,
        total_file_bytes: u64,
    },
    DirectoryChanged {
        directory: PathBuf,
        directories: usize,
        files: usize,
    },
    WorkingDirectory {
        path: PathBuf,
        name: String,
        parent: Option<PathBuf>,
    },
    Tree {
        root: PathBuf,
        depth: usize,
        rows: Vec<TreeRow>,
    },
    NameMatches {
        root: PathBuf,
        term: String,
        matches: Vec<NameMatch>,
        omitted: usize,
    },
    ContentMatches {
        root: PathBuf,
        text: String,
        matches: Vec<ContentMatch>,
        omitted: usize,
    },
    Digest(DigestResult),
    /// Transient archive; the file is deleted when this value drops.
    Archive(ArchiveResult),
    File {
        path: PathBuf,
        size: u64,
    },
    Text(TextPreview),
    Tail(TailResult),
    Bookmarks(NamedStrings),
    Bookmark {
        name: String,
        path: PathBuf,
        change: BookmarkChange,
    },
    DirectoryCreated {
        path: PathBuf,
    },
    Copied(TransferReport),
    Moved(TransferReport),
    ConfirmationRequired {
        token: String,
        action: PendingAction,
        prompt: String,
    },
    ConfirmationResolved(ConfirmationOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Serialize for CommandFailure {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("CommandFailure", 3)?;
        state.serialize_field("ok", &false)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("message", &self.message)?;
        state.end()
    }
}

impl std::fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<EngineError> for CommandFailure {
    fn from(error: EngineError) -> Self {
        Self {
            kind: error.kind(),
            message: error.public_message(),
        }
    }
}

pub type CommandResult = Result<CommandOutput, CommandFailure>;

pub struct CommandEngine {
    authorizer: Arc<dyn CallerAuthorizer>,
    session: Mutex<SessionState>,
    registry: ConfirmationRegistry,
    config: EngineConfig,
}

impl CommandEngine {
    pub fn new(
        config: EngineConfig,
        authorizer: Arc<dyn CallerAuthorizer>,
        session: SessionState,
        process_control: Arc<dyn ProcessControl>,
    ) -> Self {
        let registry = ConfirmationRegistry::new(
            RegistryLimits {
                ttl: config.confirmation_ttl,
                max_pending: config.max_pending_confirmations,
            },
            process_control,
        );
        Self {
            authorizer,
            session: Mutex::new(session),
            registry,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn current_directory(&self) -> PathBuf {
        self.session().current_directory().to_path_buf()
    }

    pub fn pending_confirmations(&self) -> usize {
        self.registry.pending_count()
    }

    /// Runs one tokenized command on behalf of `caller`.
    pub fn dispatch(&self, caller: &str, verb: &str, args: &[String]) -> CommandResult {
        let verb = normalize_verb(verb);
        let outcome = self
            .authorize(caller)
            .and_then(|()| self.run(caller, &verb, args));
        self.finish(caller, &verb, outcome)
    }

    /// Delivers an accept/reject decision for a pending confirmation.
    pub fn resolve_confirmation(&self, caller: &str, token: &str, accepted: bool) -> CommandResult {
        let outcome = self.authorize(caller).and_then(|()| {
            self.registry
                .resolve(token.trim(), accepted)
                .map(CommandOutput::ConfirmationResolved)
        });
        self.finish(caller, "confirm", outcome)
    }

    fn finish(&self, caller: &str, verb: &str, outcome: EngineResult<CommandOutput>) -> CommandResult {
        match outcome {
            Ok(output) => {
                tracing::info!(caller, verb, "command completed");
                Ok(output)
            }
            Err(error @ EngineError::Internal { .. }) => {
                tracing::error!(caller, verb, error = %error, "command failed");
                Err(error.into())
            }
            Err(error) => {
                tracing::info!(caller, verb, kind = %error.kind(), "command rejected");
                Err(error.into())
            }
        }
    }

    fn authorize(&self, caller: &str) -> EngineResult<()> {
        if self.authorizer.authorize(caller).is_allowed() {
            Ok(())
        } else {
            Err(EngineError::Unauthorized(caller.to_string()))
        }
    }

    fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve_arg(&self, verb: &str, args: &[String]) -> EngineResult<PathBuf> {
        let token = joined_arg(verb, args)?;
        Ok(resolve_path(&token, &self.current_directory()))
    }

    fn run(&self, caller: &str, verb: &str, args: &[String]) -> EngineResult<CommandOutput> {
        match verb {
            "help" | "start" => self.help(args),
            "ls" => {
                expect_no_args(verb, args)?;
                self.list()
            }
            "cd" => self.change_directory(args),
            "up" => {
                expect_no_args(verb, args)?;
                let directory = self.session().up()?.to_path_buf();
                Ok(working_directory(directory))
            }
            "pwd" => {
                expect_no_args(verb, args)?;
                Ok(working_directory(self.current_directory()))
            }
            "tree" => self.tree(args),
            "get" => {
                let path = self.resolve_arg(verb, args)?;
                let size = check_downloadable(&path, self.config.max_download_bytes)?;
                Ok(CommandOutput::File { path, size })
            }
            "getzip" => {
                let path = self.resolve_arg(verb, args)?;
                Ok(CommandOutput::Archive(build_zip(
                    &path,
                    &self.config.scratch_dir,
                )?))
            }
            "cat" => {
                let path = self.resolve_arg(verb, args)?;
                Ok(CommandOutput::Text(read_text_prefix(&path, CAT_MAX_CHARS)?))
            }
            "tail" => self.tail(args),
            "find" => {
                let term = joined_arg(verb, args)?;
                let root = self.current_directory();
                let (matches, omitted) =
                    take_with_remainder(find_by_name(&root, &term)?, SEARCH_DISPLAY_LIMIT);
                Ok(CommandOutput::NameMatches {
                    root,
                    term,
                    matches,
                    omitted,
                })
            }
            "search" => {
                let text = joined_arg(verb, args)?;
                let root = self.current_directory();
                let (matches, omitted) =
                    take_with_remainder(search_content(&root, &text)?, SEARCH_DISPLAY_LIMIT);
                Ok(CommandOutput::ContentMatches {
                    root,
                    text,
                    matches,
                    omitted,
                })
            }
            "bookmark" => self.bookmark(args),
            "mkdir" => {
                let path = self.resolve_arg(verb, args)?;
                make_directory(&path)?;
                Ok(CommandOutput::DirectoryCreated { path })
            }
            "rm" => self.request_delete(caller, args),
            "cp" => {
                let (source, destination) = self.resolve_pair(verb, args)?;
                Ok(CommandOutput::Copied(copy_item(&source, &destination)?))
            }
            "mv" => {
                let (source, destination) = self.resolve_pair(verb, args)?;
                Ok(CommandOutput::Moved(move_item(&source, &destination)?))
            }
            "hash" => {
                let path = self.resolve_arg(verb, args)?;
                Ok(CommandOutput::Digest(digest_file(
                    &path,
                    &DigestAlgorithm::DEFAULT_SET,
                )?))
            }
            "kill" => self.request_kill(caller, args),
            "logs" => {
                expect_no_args(verb, args)?;
                self.archive_logs()
            }
            other => Err(EngineError::InvalidArgument(unknown_command_message(
                &format!("/{other}"),
            ))),
        }
    }

    fn help(&self, args: &[String]) -> EngineResult<CommandOutput> {
        let topic = match args.first() {
            None => None,
            Some(topic) => Some(find_command_spec(topic).ok_or_else(|| {
                EngineError::InvalidArgument(unknown_command_message(topic))
            })?),
        };
        Ok(CommandOutput::Help {
            commands: crate::command_catalog::COMMAND_SPECS,
            topic,
        })
    }

    fn list(&self) -> EngineResult<CommandOutput> {
        let directory = self.current_directory();
        let entries = list_directory(&directory)?;
        let total_file_bytes = entries.iter().filter_map(|entry| entry.size).sum();
        Ok(CommandOutput::Listing {
            directory,
            entries,
            total_file_bytes,
        })
    }

    fn change_directory(&self, args: &[String]) -> EngineResult<CommandOutput> {
        let token = joined_arg("cd", args)?;
        let directory = {
            let mut session = self.session();
            let target = resolve_path(&token, session.current_directory());
            session.set_current_directory(&target)?;
            target
        };
        let (directories, files) = match list_directory(&directory) {
            Ok(entries) => count_kinds(&entries),
            Err(error) => {
                tracing::debug!(directory = %directory.display(), %error, "cd summary unavailable");
                (0, 0)
            }
        };
        Ok(CommandOutput::DirectoryChanged {
            directory,
            directories,
            files,
        })
    }

    fn tree(&self, args: &[String]) -> EngineResult<CommandOutput> {
        let depth = match args {
            [] => DEFAULT_TREE_DEPTH,
            [raw] => raw.trim().parse::<usize>().map_err(|_| {
                EngineError::InvalidArgument(format!(
                    "depth must be a non-negative number, got '{raw}'; usage: {}",
                    usage_for("tree")
                ))
            })?,
            _ => return Err(usage_error("tree")),
        };
        let root = self.current_directory();
        let rows = tree(&root, depth)?.collect();
        Ok(CommandOutput::Tree { root, depth, rows })
    }

    fn tail(&self, args: &[String]) -> EngineResult<CommandOutput> {
        let (path_args, count) = match args.split_last() {
            Some((last, rest)) if !rest.is_empty() => match last.trim().parse::<usize>() {
                Ok(count) => (rest, count),
                Err(_) => (args, DEFAULT_TAIL_LINES),
            },
            _ => (args, DEFAULT_TAIL_LINES),
        };
        let path = self.resolve_arg("tail", path_args)?;
        Ok(CommandOutput::Tail(tail_lines(&path, count)?))
    }

    fn bookmark(&self, args: &[String]) -> EngineResult<CommandOutput> {
        let Some((action, rest)) = args.split_first() else {
            return Err(usage_error("bookmark"));
        };
        let action = action.to_ascii_lowercase();
        if action == "list" {
            expect_no_args("bookmark", rest)?;
            return Ok(CommandOutput::Bookmarks(self.session().bookmarks().clone()));
        }
        let name = joined_arg("bookmark", rest)?;
        let mut session = self.session();
        let (path, change) = match action.as_str() {
            "add" => (session.add_bookmark(&name)?, BookmarkChange::Saved),
            "go" => (session.go_to_bookmark(&name)?, BookmarkChange::Opened),
            "del" => (
                PathBuf::from(session.remove_bookmark(&name)?),
                BookmarkChange::Removed,
            ),
            _ => return Err(usage_error("bookmark")),
        };
        Ok(CommandOutput::Bookmark { name, path, change })
    }

    fn resolve_pair(&self, verb: &str, args: &[String]) -> EngineResult<(PathBuf, PathBuf)> {
        let [source, destination] = args else {
            return Err(usage_error(verb));
        };
        let base = self.current_directory();
        Ok((resolve_path(source, &base), resolve_path(destination, &base)))
    }

    fn request_delete(&self, caller: &str, args: &[String]) -> EngineResult<CommandOutput> {
        let path = self.resolve_arg("rm", args)?;
        let metadata =
            std::fs::symlink_metadata(&path).map_err(|error| EngineError::from_io(error, &path))?;
        let noun = if metadata.is_dir() { "folder" } else { "file" };
        let prompt = format!("Delete {noun} {}?", path.display());
        let pending = self
            .registry
            .register(PendingAction::DeleteItem { path }, caller);
        Ok(CommandOutput::ConfirmationRequired {
            token: pending.token,
            action: pending.action,
            prompt,
        })
    }

    fn request_kill(&self, caller: &str, args: &[String]) -> EngineResult<CommandOutput> {
        let [raw] = args else {
            return Err(usage_error("kill"));
        };
        let pid = parse_pid(raw)?;
        let name = self
            .registry
            .process_control()
            .process_name(pid)
            .map_err(|error| EngineError::internal("failed to look up process", error))?
            .ok_or_else(|| EngineError::NotFound(format!("process {pid}")))?;
        let prompt = format!("Terminate process {name} (pid {pid})?");
        let pending = self
            .registry
            .register(PendingAction::KillProcess { pid }, caller);
        Ok(CommandOutput::ConfirmationRequired {
            token: pending.token,
            action: pending.action,
            prompt,
        })
    }

    fn archive_logs(&self) -> EngineResult<CommandOutput> {
        let Some(log_dir) = self.config.log_dir.as_deref() else {
            return Err(EngineError::NotFound("log directory is not configured".to_string()));
        };
        ensure_directory(log_dir)?;
        let archive = build_zip_filtered(log_dir, &self.config.scratch_dir, is_log_file)?;
        Ok(CommandOutput::Archive(archive))
    }
}

fn normalize_verb(verb: &str) -> String {
    verb.trim().trim_start_matches('/').to_ascii_lowercase()
}

fn usage_error(verb: &str) -> EngineError {
    EngineError::InvalidArgument(format!("usage: {}", usage_for(verb)))
}

fn expect_no_args(verb: &str, args: &[String]) -> EngineResult<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(usage_error(verb))
    }
}

/// Single-argument verbs accept names containing spaces.
fn joined_arg(verb: &str, args: &[String]) -> EngineResult<String> {
    let joined = args.join(" ");
    if joined.trim().is_empty() {
        return Err(usage_error(verb));
    }
    Ok(joined.trim().to_string())
}

fn parse_pid(raw: &str) -> EngineResult<u32> {
    let invalid = || EngineError::InvalidArgument(format!("'{raw}' is not a valid process id"));
    let pid = raw.trim().parse::<u32>().map_err(|_| invalid())?;
    // 0 and values beyond i32 address process groups on unix
    if pid == 0 || pid > i32::MAX as u32 {
        return Err(invalid());
    }
    Ok(pid)
}

fn working_directory(path: PathBuf) -> CommandOutput {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let parent = path.parent().map(Path::to_path_buf);
    CommandOutput::WorkingDirectory { path, name, parent }
}

fn count_kinds(entries: &[EntryInfo]) -> (usize, usize) {
    let directories = entries
        .iter()
        .filter(|entry| entry.kind == EntryKind::Directory)
        .count();
    (directories, entries.len() - directories)
}

fn take_with_remainder<T>(mut items: impl Iterator<Item = T>, limit: usize) -> (Vec<T>, usize) {
    let kept: Vec<T> = items.by_ref().take(limit).collect();
    (kept, items.count())
}

fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|name| name.contains(".log") || name.contains(".jsonl"))
}
