//! Session and command-execution engine for remote filesystem browsing.
//!
//! `CommandEngine::dispatch` receives already-tokenized commands, authorizes
//! the caller, and returns plain result values. Destructive verbs only
//! register a pending action; `CommandEngine::resolve_confirmation` performs
//! it once the caller accepts.

pub mod archive_builder;
pub mod command_catalog;
pub mod command_engine;
pub mod confirmation_registry;
pub mod digest_calculator;
pub mod engine_error;
pub mod file_operations;
pub mod named_string_store;
pub mod path_resolver;
pub mod process_control;
pub mod session_state;
pub mod traversal_engine;

pub use archive_builder::{build_zip, build_zip_filtered, ArchiveResult, TransientArchive};
pub use command_catalog::{find_command_spec, CommandSpec, COMMAND_SPECS};
pub use command_engine::{
    BookmarkChange, CommandEngine, CommandFailure, CommandOutput, CommandResult, EngineConfig,
    CAT_MAX_CHARS, DEFAULT_MAX_DOWNLOAD_BYTES, DEFAULT_TAIL_LINES, SEARCH_DISPLAY_LIMIT,
};
pub use confirmation_registry::{
    ConfirmationOutcome, ConfirmationRegistry, PendingAction, PendingConfirmation, RegistryLimits,
    DEFAULT_CONFIRMATION_TTL, DEFAULT_MAX_PENDING_CONFIRMATIONS,
};
pub use digest_calculator::{digest_file, DigestAlgorithm, DigestResult};
pub use engine_error::{EngineError, EngineResult, ErrorKind};
pub use file_operations::{TailResult, TextPreview, TransferReport};
pub use named_string_store::{JsonFileStore, MemoryStore, NamedStringStore, NamedStrings};
pub use path_resolver::{normalize_path, resolve_path};
pub use process_control::{HostProcessControl, ProcessControl};
pub use session_state::SessionState;
pub use traversal_engine::{
    ContentMatch, EntryInfo, EntryKind, NameMatch, TreeRow, DEFAULT_TREE_DEPTH,
};
