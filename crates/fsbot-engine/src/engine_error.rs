use std::io;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Result alias for engine components.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
/// Failure categories reported to the transport.
pub enum ErrorKind {
    Unauthorized,
    InvalidArgument,
    NotFound,
    NotAFile,
    NotADirectory,
    PermissionDenied,
    NavigationError,
    UnknownConfirmation,
    ActionFailed,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::NotAFile => "not_a_file",
            Self::NotADirectory => "not_a_directory",
            Self::PermissionDenied => "permission_denied",
            Self::NavigationError => "navigation_error",
            Self::UnknownConfirmation => "unknown_confirmation",
            Self::ActionFailed => "action_failed",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("caller '{0}' is not authorized")]
    Unauthorized(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not a file: {0}")]
    NotAFile(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Navigation(String),
    #[error("unknown or already resolved confirmation '{0}'")]
    UnknownConfirmation(String),
    #[error("{action} failed for {target}: {reason}")]
    ActionFailed {
        action: &'static str,
        target: String,
        reason: String,
    },
    #[error("{context}: {source}")]
    Internal {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotAFile(_) => ErrorKind::NotAFile,
            Self::NotADirectory(_) => ErrorKind::NotADirectory,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Navigation(_) => ErrorKind::NavigationError,
            Self::UnknownConfirmation(_) => ErrorKind::UnknownConfirmation,
            Self::ActionFailed { .. } => ErrorKind::ActionFailed,
            Self::Internal { .. } => ErrorKind::InternalError,
        }
    }

    pub fn internal(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Classifies an I/O failure on `path` into the most specific kind.
    pub fn from_io(error: io::Error, path: &Path) -> Self {
        let shown = path.display().to_string();
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(shown),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(shown),
            _ => Self::internal(format!("i/o failure on {shown}"), error),
        }
    }

    /// Short, caller-safe description. Internal details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal { context, .. } => context.clone(),
            other => other.to_string(),
        }
    }
}
