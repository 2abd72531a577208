//! Line-oriented stand-in for a chat transport: one `/verb args` line in,
//! rendered text out. Downloads are delivered by copying into a local
//! downloads directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fsbot_engine::{CommandEngine, CommandOutput, CommandResult};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::audit_log::{AuditLog, AuditRecord};
use crate::command_text::{parse_console_line, ConsoleInput};
use crate::render::{render_failure, render_output};

const PROMPT: &str = "fsbot> ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopControl {
    Continue(String),
    Exit,
}

pub struct ConsoleTransport {
    engine: Arc<CommandEngine>,
    caller: String,
    audit: AuditLog,
    downloads_dir: PathBuf,
}

impl ConsoleTransport {
    pub fn new(
        engine: Arc<CommandEngine>,
        caller: impl Into<String>,
        audit: AuditLog,
        downloads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            caller: caller.into(),
            audit,
            downloads_dir: downloads_dir.into(),
        }
    }

    /// Runs one input line to completion. Blocking; call off the async runtime.
    pub fn handle_line(&self, line: &str) -> LoopControl {
        let input = match parse_console_line(line) {
            Ok(input) => input,
            Err(message) => return LoopControl::Continue(message),
        };
        match input {
            ConsoleInput::Blank => LoopControl::Continue(String::new()),
            ConsoleInput::Quit => LoopControl::Exit,
            ConsoleInput::Command { verb, args } => {
                let result = self.engine.dispatch(&self.caller, &verb, &args);
                LoopControl::Continue(self.complete(&verb, result))
            }
            ConsoleInput::Confirm { token, accepted } => {
                let result = self
                    .engine
                    .resolve_confirmation(&self.caller, &token, accepted);
                LoopControl::Continue(self.complete("confirm", result))
            }
        }
    }

    fn complete(&self, verb: &str, result: CommandResult) -> String {
        let record = AuditRecord::new(
            &self.caller,
            verb,
            result.as_ref().err().map(|failure| failure.kind),
        );
        if let Err(error) = self.audit.append(&record) {
            tracing::warn!(error = %format!("{error:#}"), "audit log append failed");
        }

        match result {
            Ok(output) => {
                let mut text = render_output(&output);
                if let Some(note) = self.hand_off(output) {
                    text.push('\n');
                    text.push_str(&note);
                }
                text
            }
            Err(failure) => render_failure(&failure),
        }
    }

    /// Delivers file-bearing outputs. Archives are removed once this returns,
    /// whether or not the copy succeeded.
    fn hand_off(&self, output: CommandOutput) -> Option<String> {
        let delivered = match &output {
            CommandOutput::File { path, .. } => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "download".to_string());
                deliver_file(path, &self.downloads_dir, &name)
            }
            CommandOutput::Archive(result) => deliver_file(
                result.archive.path(),
                &self.downloads_dir,
                result.archive.file_name(),
            ),
            _ => return None,
        };
        drop(output);
        Some(match delivered {
            Ok(target) => format!("saved to {}", target.display()),
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "download hand-off failed");
                format!("error [internal_error]: delivery failed: {error}")
            }
        })
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        loop {
            print!("{PROMPT}");
            std::io::stdout()
                .flush()
                .context("failed to flush stdout")?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let transport = Arc::clone(&self);
            let control = tokio::task::spawn_blocking(move || transport.handle_line(&line))
                .await
                .context("command task failed")?;
            match control {
                LoopControl::Continue(text) if text.is_empty() => {}
                LoopControl::Continue(text) => println!("{text}"),
                LoopControl::Exit => break,
            }
        }
        Ok(())
    }
}

/// Copies `source` into `downloads_dir` as `file_name`, numbering the name
/// when it is already taken.
pub fn deliver_file(source: &Path, downloads_dir: &Path, file_name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(downloads_dir)
        .with_context(|| format!("failed to create {}", downloads_dir.display()))?;
    let mut target = downloads_dir.join(file_name);
    let mut attempt = 1;
    while target.exists() {
        target = downloads_dir.join(format!("{attempt}-{file_name}"));
        attempt += 1;
    }
    std::fs::copy(source, &target)
        .with_context(|| format!("failed to copy {} to {}", source.display(), target.display()))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use fsbot_access::AllowlistAuthorizer;
    use fsbot_core::LogRotationPolicy;
    use fsbot_engine::{EngineConfig, HostProcessControl, MemoryStore, SessionState};

    use super::*;

    fn transport_at(root: &Path, state: &Path, caller: &str) -> ConsoleTransport {
        let session =
            SessionState::open(root, Arc::new(MemoryStore::default())).expect("session");
        let engine = CommandEngine::new(
            EngineConfig {
                scratch_dir: state.to_path_buf(),
                log_dir: Some(state.join("logs")),
                ..EngineConfig::default()
            },
            Arc::new(AllowlistAuthorizer::new(["console"])),
            session,
            Arc::new(HostProcessControl),
        );
        ConsoleTransport::new(
            Arc::new(engine),
            caller,
            AuditLog::new(&state.join("logs"), LogRotationPolicy::default()),
            state.join("downloads"),
        )
    }

    fn text(control: LoopControl) -> String {
        match control {
            LoopControl::Continue(text) => text,
            LoopControl::Exit => panic!("unexpected exit"),
        }
    }

    #[test]
    fn functional_getzip_delivers_copy_and_removes_archive() {
        let root = tempfile::tempdir().expect("root");
        let state = tempfile::tempdir().expect("state");
        std::fs::create_dir(root.path().join("project")).expect("mkdir");
        std::fs::write(root.path().join("project/a.txt"), "a").expect("write");
        let transport = transport_at(root.path(), state.path(), "console");

        let reply = text(transport.handle_line("/getzip project"));
        assert!(reply.contains("packaged project.zip (1 files)"), "{reply}");
        assert!(state.path().join("downloads/project.zip").exists());
        let leftovers = std::fs::read_dir(state.path())
            .expect("list")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".zip"))
            .count();
        assert_eq!(leftovers, 0, "staged archive must be deleted after hand-off");
    }

    #[test]
    fn functional_confirmation_round_trip_over_console() {
        let root = tempfile::tempdir().expect("root");
        let state = tempfile::tempdir().expect("state");
        std::fs::write(root.path().join("old.log"), "x").expect("write");
        let transport = transport_at(root.path(), state.path(), "console");

        let prompt = text(transport.handle_line("/rm old.log"));
        let token = prompt
            .split_whitespace()
            .skip_while(|word| *word != "/confirm")
            .nth(1)
            .expect("token in prompt")
            .to_string();
        let done = text(transport.handle_line(&format!("/confirm {token} yes")));
        assert!(done.starts_with("deleted"), "{done}");
        assert!(!root.path().join("old.log").exists());

        let again = text(transport.handle_line(&format!("/confirm {token} yes")));
        assert!(again.contains("unknown_confirmation"), "{again}");
    }

    #[test]
    fn functional_denied_caller_is_audited() {
        let root = tempfile::tempdir().expect("root");
        let state = tempfile::tempdir().expect("state");
        let transport = transport_at(root.path(), state.path(), "stranger");

        let reply = text(transport.handle_line("/ls"));
        assert!(reply.starts_with("error [unauthorized]"), "{reply}");
        let audit = std::fs::read_to_string(state.path().join("logs/commands.jsonl"))
            .expect("audit log");
        assert!(audit.contains("\"error_kind\":\"unauthorized\""));
        assert_eq!(transport.handle_line("/quit"), LoopControl::Exit);
    }

    #[test]
    fn unit_deliver_file_never_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("report.txt");
        std::fs::write(&source, "r").expect("write");
        let downloads = temp.path().join("downloads");
        let first = deliver_file(&source, &downloads, "report.txt").expect("first");
        let second = deliver_file(&source, &downloads, "report.txt").expect("second");
        assert_ne!(first, second);
        assert_eq!(second, downloads.join("1-report.txt"));
    }
}
