use std::{
    fs,
    io::{self, Read},
    path::Path,
    sync::{Arc, Barrier},
};

use fsbot_access::AllowlistAuthorizer;
use fsbot_engine::{
    CommandEngine, CommandOutput, DigestAlgorithm, EngineConfig, EntryKind, ErrorKind,
    JsonFileStore, ProcessControl, SessionState,
};

struct NoProcesses;

impl ProcessControl for NoProcesses {
    fn process_name(&self, _pid: u32) -> io::Result<Option<String>> {
        Ok(None)
    }

    fn terminate(&self, _pid: u32) -> io::Result<()> {
        Err(io::Error::other("no processes in this harness"))
    }
}

fn engine(root: &Path, state: &Path, allowed: &[&str]) -> CommandEngine {
    let store = Arc::new(JsonFileStore::new(state.join("state")));
    let session = SessionState::open(root, store).expect("open session");
    CommandEngine::new(
        EngineConfig {
            scratch_dir: state.to_path_buf(),
            log_dir: Some(state.join("logs")),
            ..EngineConfig::default()
        },
        Arc::new(AllowlistAuthorizer::new(allowed.iter().copied())),
        session,
        Arc::new(NoProcesses),
    )
}

fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|arg| arg.to_string()).collect()
}

fn write(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write fixture");
}

fn confirmation_token(output: CommandOutput) -> String {
    match output {
        CommandOutput::ConfirmationRequired { token, .. } => token,
        other => panic!("expected confirmation request, got {other:?}"),
    }
}

#[test]
fn integration_listing_and_tree_follow_ordering_and_depth() {
    let root = tempfile::tempdir().expect("root");
    let state = tempfile::tempdir().expect("state");
    write(&root.path().join("b.txt"), b"bb");
    write(&root.path().join("A.txt"), b"a");
    write(&root.path().join("src/lib/deep/x.rs"), b"x");
    write(&root.path().join("Docs/readme.md"), b"r");
    let engine = engine(root.path(), state.path(), &[]);

    match engine.dispatch("u", "ls", &[]).expect("ls") {
        CommandOutput::Listing {
            entries,
            total_file_bytes,
            ..
        } => {
            let names: Vec<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
            assert_eq!(names, vec!["Docs", "src", "A.txt", "b.txt"]);
            assert_eq!(entries[0].kind, EntryKind::Directory);
            assert_eq!(total_file_bytes, 3);
        }
        other => panic!("unexpected: {other:?}"),
    }

    match engine.dispatch("u", "tree", &args(&["2"])).expect("tree") {
        CommandOutput::Tree { rows, depth, .. } => {
            assert_eq!(depth, 2);
            assert!(rows.iter().all(|row| row.depth <= 2));
            assert!(rows.iter().any(|row| row.entry.name == "lib"));
            assert!(!rows.iter().any(|row| row.entry.name == "deep"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    match engine.dispatch("u", "tree", &args(&["0"])).expect("tree 0") {
        CommandOutput::Tree { rows, .. } => assert!(rows.is_empty()),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn integration_confirmed_delete_of_vanished_target_reports_action_failure() {
    let root = tempfile::tempdir().expect("root");
    let state = tempfile::tempdir().expect("state");
    write(&root.path().join("x"), b"x");
    let engine = engine(root.path(), state.path(), &[]);

    let token = confirmation_token(engine.dispatch("u", "rm", &args(&["x"])).expect("rm"));
    fs::remove_file(root.path().join("x")).expect("external delete");

    let failed = engine
        .resolve_confirmation("u", &token, true)
        .expect_err("vanished target");
    assert_eq!(failed.kind, ErrorKind::ActionFailed);
    let again = engine
        .resolve_confirmation("u", &token, true)
        .expect_err("consumed token");
    assert_eq!(again.kind, ErrorKind::UnknownConfirmation);
}

#[test]
fn integration_unauthorized_resolution_leaves_token_pending() {
    let root = tempfile::tempdir().expect("root");
    let state = tempfile::tempdir().expect("state");
    write(&root.path().join("keep/me.txt"), b"x");
    let engine = engine(root.path(), state.path(), &["owner"]);

    let token = confirmation_token(
        engine
            .dispatch("owner", "rm", &args(&["keep"]))
            .expect("rm"),
    );
    let denied = engine
        .resolve_confirmation("intruder", &token, true)
        .expect_err("denied");
    assert_eq!(denied.kind, ErrorKind::Unauthorized);
    assert_eq!(engine.pending_confirmations(), 1);
    assert!(root.path().join("keep/me.txt").exists());

    match engine
        .resolve_confirmation("owner", &token, false)
        .expect("rejected")
    {
        CommandOutput::ConfirmationResolved(_) => {}
        other => panic!("unexpected: {other:?}"),
    }
    assert!(root.path().join("keep").exists());
}

#[test]
fn integration_concurrent_confirmations_have_one_winner() {
    let root = tempfile::tempdir().expect("root");
    let state = tempfile::tempdir().expect("state");
    write(&root.path().join("target/file.txt"), b"x");
    let engine = Arc::new(engine(root.path(), state.path(), &[]));
    let token = confirmation_token(engine.dispatch("u", "rm", &args(&["target"])).expect("rm"));

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let token = token.clone();
            std::thread::spawn(move || {
                barrier.wait();
                engine
                    .resolve_confirmation("u", &token, true)
                    .map(|_| ())
                    .map_err(|failure| failure.kind)
            })
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .collect();
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|result| **result == Err(ErrorKind::UnknownConfirmation))
            .count(),
        3
    );
    assert!(!root.path().join("target").exists());
}

#[test]
fn integration_content_search_ignores_binary_files() {
    let root = tempfile::tempdir().expect("root");
    let state = tempfile::tempdir().expect("state");
    write(&root.path().join("notes/todo.txt"), b"intro\nremember the TODO list\n");
    write(&root.path().join("image.png"), b"\x89PNG TODO \x00\xff");
    let engine = engine(root.path(), state.path(), &[]);

    match engine.dispatch("u", "search", &args(&["TODO"])).expect("search") {
        CommandOutput::ContentMatches {
            matches, omitted, ..
        } => {
            assert_eq!(omitted, 0);
            assert_eq!(matches.len(), 1);
            assert_eq!(matches[0].relative_path, Path::new("notes").join("todo.txt"));
            assert_eq!(matches[0].line_number, 2);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn integration_getzip_archive_reads_back_and_is_removed_on_drop() {
    let root = tempfile::tempdir().expect("root");
    let state = tempfile::tempdir().expect("state");
    write(&root.path().join("bundle/data/values.json"), b"{\"a\":1}");
    let engine = engine(root.path(), state.path(), &[]);

    let output = engine
        .dispatch("u", "getzip", &args(&["bundle"]))
        .expect("getzip");
    let CommandOutput::Archive(result) = output else {
        panic!("expected archive output");
    };
    let archive_path = result.archive.path().to_path_buf();
    let mut archive =
        zip::ZipArchive::new(result.archive.open().expect("open")).expect("zip archive");
    let mut content = String::new();
    archive
        .by_name("bundle/data/values.json")
        .expect("entry")
        .read_to_string(&mut content)
        .expect("read entry");
    assert_eq!(content, "{\"a\":1}");
    drop(archive);
    drop(result);
    assert!(!archive_path.exists());

    let missing = engine
        .dispatch("u", "getzip", &args(&["absent"]))
        .expect_err("missing source");
    assert_eq!(missing.kind, ErrorKind::NotFound);
}

#[test]
fn integration_hash_is_deterministic_across_copies() {
    let root = tempfile::tempdir().expect("root");
    let state = tempfile::tempdir().expect("state");
    write(&root.path().join("one.bin"), b"same bytes");
    let engine = engine(root.path(), state.path(), &[]);
    engine
        .dispatch("u", "cp", &args(&["one.bin", "two.bin"]))
        .expect("cp");

    let digest = |name: &str| match engine.dispatch("u", "hash", &args(&[name])).expect("hash") {
        CommandOutput::Digest(result) => result,
        other => panic!("unexpected: {other:?}"),
    };
    let first = digest("one.bin");
    let second = digest("two.bin");
    assert_eq!(first.digests, second.digests);
    assert_eq!(first.hex(DigestAlgorithm::Md5).map(str::len), Some(32));
    assert_eq!(first.hex(DigestAlgorithm::Sha256).map(str::len), Some(64));
}

#[test]
fn integration_bookmarks_survive_restart_while_directory_resets() {
    let root = tempfile::tempdir().expect("root");
    let state = tempfile::tempdir().expect("state");
    fs::create_dir_all(root.path().join("var/log")).expect("mkdir");

    {
        let engine = engine(root.path(), state.path(), &[]);
        engine
            .dispatch("u", "cd", &args(&["var/log"]))
            .expect("cd");
        engine
            .dispatch("u", "bookmark", &args(&["add", "logs"]))
            .expect("add");
    }

    let raw = fs::read_to_string(state.path().join("state/bookmarks.json")).expect("persisted");
    let table: serde_json::Value = serde_json::from_str(&raw).expect("json object");
    assert!(table["logs"].is_string());

    let restarted = engine(root.path(), state.path(), &[]);
    assert_eq!(restarted.current_directory(), root.path());
    restarted
        .dispatch("u", "bookmark", &args(&["go", "logs"]))
        .expect("go");
    assert_eq!(restarted.current_directory(), root.path().join("var/log"));
}

#[test]
fn integration_logs_verb_packages_only_log_files() {
    let root = tempfile::tempdir().expect("root");
    let state = tempfile::tempdir().expect("state");
    write(&state.path().join("logs/commands.jsonl"), b"{}\n");
    write(&state.path().join("logs/commands.jsonl.1"), b"{}\n");
    write(&state.path().join("logs/notes.bin"), b"x");
    let engine = engine(root.path(), state.path(), &[]);

    match engine.dispatch("u", "logs", &[]).expect("logs") {
        CommandOutput::Archive(result) => {
            assert_eq!(result.entry_count, 2);
            assert_eq!(result.archive.file_name(), "logs.zip");
        }
        other => panic!("unexpected: {other:?}"),
    }
}
