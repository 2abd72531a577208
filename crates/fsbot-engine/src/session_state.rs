//! Navigation context: the working directory and the bookmark table.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine_error::{EngineError, EngineResult};
use crate::named_string_store::{NamedStringStore, NamedStrings};

pub const BOOKMARKS_STORE_KEY: &str = "bookmarks";

/// Fails unless `path` is an existing directory whose entries can be read.
/// Checked on every navigation; nothing is cached.
pub fn check_navigable(path: &Path) -> EngineResult<()> {
    let metadata = fs::metadata(path).map_err(|error| EngineError::from_io(error, path))?;
    if !metadata.is_dir() {
        return Err(EngineError::NotADirectory(path.display().to_string()));
    }
    fs::read_dir(path).map_err(|error| EngineError::from_io(error, path))?;
    Ok(())
}

pub struct SessionState {
    current_directory: PathBuf,
    bookmarks: NamedStrings,
    store: Arc<dyn NamedStringStore>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("current_directory", &self.current_directory)
            .field("bookmarks", &self.bookmarks)
            .finish_non_exhaustive()
    }
}

impl SessionState {
    /// Starts a session at `start_directory`, loading persisted bookmarks.
    pub fn open(start_directory: &Path, store: Arc<dyn NamedStringStore>) -> EngineResult<Self> {
        check_navigable(start_directory)?;
        let bookmarks = store
            .load(BOOKMARKS_STORE_KEY)
            .map_err(|error| EngineError::internal("failed to load bookmarks", error))?;
        Ok(Self {
            current_directory: start_directory.to_path_buf(),
            bookmarks,
            store,
        })
    }

    pub fn current_directory(&self) -> &Path {
        &self.current_directory
    }

    pub fn set_current_directory(&mut self, path: &Path) -> EngineResult<()> {
        check_navigable(path)?;
        self.current_directory = path.to_path_buf();
        Ok(())
    }

    /// Moves to the parent directory. Fails with a navigation error, leaving
    /// the session untouched, at the filesystem root or when the parent
    /// cannot be read.
    pub fn up(&mut self) -> EngineResult<&Path> {
        let Some(parent) = self.current_directory.parent() else {
            return Err(EngineError::Navigation(format!(
                "cannot move up: {} is the filesystem root",
                self.current_directory.display()
            )));
        };
        let parent = parent.to_path_buf();
        if let Err(error) = check_navigable(&parent) {
            return Err(EngineError::Navigation(format!(
                "cannot move up to {}: {}",
                parent.display(),
                error.public_message()
            )));
        }
        self.current_directory = parent;
        Ok(&self.current_directory)
    }

    pub fn bookmarks(&self) -> &NamedStrings {
        &self.bookmarks
    }

    /// Saves the current directory under `name`, replacing any previous entry.
    pub fn add_bookmark(&mut self, name: &str) -> EngineResult<PathBuf> {
        let name = validate_bookmark_name(name)?;
        let target = self.current_directory.clone();
        let previous = self
            .bookmarks
            .insert(name.to_string(), target.display().to_string());
        if let Err(error) = self.persist_bookmarks() {
            match previous {
                Some(previous) => self.bookmarks.insert(name.to_string(), previous),
                None => self.bookmarks.remove(name),
            };
            return Err(error);
        }
        Ok(target)
    }

    /// Navigates to a bookmark. A bookmark whose directory is gone fails
    /// without moving the session.
    pub fn go_to_bookmark(&mut self, name: &str) -> EngineResult<PathBuf> {
        let name = validate_bookmark_name(name)?;
        let Some(target) = self.bookmarks.get(name) else {
            return Err(EngineError::NotFound(format!("bookmark '{name}'")));
        };
        let target = PathBuf::from(target);
        self.set_current_directory(&target)?;
        Ok(target)
    }

    /// Deletes a bookmark, returning the path it pointed at.
    pub fn remove_bookmark(&mut self, name: &str) -> EngineResult<String> {
        let name = validate_bookmark_name(name)?;
        let Some(removed) = self.bookmarks.remove(name) else {
            return Err(EngineError::NotFound(format!("bookmark '{name}'")));
        };
        if let Err(error) = self.persist_bookmarks() {
            self.bookmarks.insert(name.to_string(), removed);
            return Err(error);
        }
        Ok(removed)
    }

    fn persist_bookmarks(&self) -> EngineResult<()> {
        self.store
            .save(BOOKMARKS_STORE_KEY, &self.bookmarks)
            .map_err(|error| EngineError::internal("failed to save bookmarks", error))
    }
}

fn validate_bookmark_name(name: &str) -> EngineResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidArgument(
            "bookmark name cannot be empty".to_string(),
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_error::ErrorKind;
    use crate::named_string_store::MemoryStore;

    fn session_at(path: &Path) -> (SessionState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let session = SessionState::open(path, store.clone()).expect("open session");
        (session, store)
    }

    #[test]
    fn functional_up_moves_to_parent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).expect("mkdir");
        let (mut session, _) = session_at(&nested);

        let moved = session.up().expect("up").to_path_buf();
        assert_eq!(moved, temp.path().join("a"));
        assert_eq!(session.current_directory(), temp.path().join("a"));
    }

    #[cfg(unix)]
    #[test]
    fn regression_up_at_root_fails_and_keeps_directory() {
        let (mut session, _) = session_at(Path::new("/"));
        for _ in 0..3 {
            let error = session.up().expect_err("root has no parent");
            assert_eq!(error.kind(), ErrorKind::NavigationError);
        }
        assert_eq!(session.current_directory(), Path::new("/"));
    }

    #[test]
    fn regression_set_current_directory_rejects_invalid_targets() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").expect("write");
        let (mut session, _) = session_at(temp.path());

        let missing = session
            .set_current_directory(&temp.path().join("missing"))
            .expect_err("missing");
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        let not_dir = session.set_current_directory(&file).expect_err("file");
        assert_eq!(not_dir.kind(), ErrorKind::NotADirectory);
        assert_eq!(session.current_directory(), temp.path());
    }

    #[test]
    fn functional_bookmarks_persist_and_navigate() {
        let temp = tempfile::tempdir().expect("tempdir");
        let docs = temp.path().join("docs");
        fs::create_dir(&docs).expect("mkdir");
        let (mut session, store) = session_at(&docs);

        session.add_bookmark("docs").expect("add");
        session.set_current_directory(temp.path()).expect("cd");
        let target = session.go_to_bookmark("docs").expect("go");
        assert_eq!(target, docs);
        assert_eq!(session.current_directory(), docs);

        let persisted = store.load(BOOKMARKS_STORE_KEY).expect("load");
        assert_eq!(
            persisted.get("docs").map(String::as_str),
            Some(docs.display().to_string().as_str())
        );

        let reopened = SessionState::open(temp.path(), store.clone()).expect("reopen");
        assert!(reopened.bookmarks().contains_key("docs"));

        session.remove_bookmark("docs").expect("del");
        assert!(store.load(BOOKMARKS_STORE_KEY).expect("load").is_empty());
        assert_eq!(
            session.remove_bookmark("docs").expect_err("gone").kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn regression_go_to_vanished_bookmark_keeps_session() {
        let temp = tempfile::tempdir().expect("tempdir");
        let doomed = temp.path().join("doomed");
        fs::create_dir(&doomed).expect("mkdir");
        let (mut session, _) = session_at(&doomed);
        session.add_bookmark("doomed").expect("add");
        session.set_current_directory(temp.path()).expect("cd");
        fs::remove_dir(&doomed).expect("rmdir");

        let error = session.go_to_bookmark("doomed").expect_err("vanished");
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(session.current_directory(), temp.path());
    }

    #[test]
    fn unit_later_add_overwrites_same_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        fs::create_dir(&first).expect("mkdir");
        fs::create_dir(&second).expect("mkdir");
        let (mut session, _) = session_at(&first);
        session.add_bookmark("work").expect("add");
        session.set_current_directory(&second).expect("cd");
        session.add_bookmark("work").expect("overwrite");
        assert_eq!(session.bookmarks().len(), 1);
        assert_eq!(
            session.bookmarks().get("work").map(String::as_str),
            Some(second.display().to_string().as_str())
        );
    }
}
