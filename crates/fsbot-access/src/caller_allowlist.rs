use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const CALLER_ALLOWLIST_SCHEMA_VERSION: u32 = 1;

const ALLOW_OPEN_MODE: &str = "allow_open_mode";
const ALLOW_ALLOWLISTED: &str = "allow_allowlisted";
const DENY_CALLER_ID_MISSING: &str = "deny_caller_id_missing";
const DENY_CALLER_NOT_ALLOWLISTED: &str = "deny_caller_not_allowlisted";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of an authorization check, tagged with a stable reason code.
pub enum AccessDecision {
    Allow { reason_code: &'static str },
    Deny { reason_code: &'static str },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Allow { reason_code } | Self::Deny { reason_code } => reason_code,
        }
    }
}

/// Capability predicate consulted before every command and confirmation.
pub trait CallerAuthorizer: Send + Sync {
    fn authorize(&self, caller_id: &str) -> AccessDecision;

    fn is_authorized(&self, caller_id: &str) -> bool {
        self.authorize(caller_id).is_allowed()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// On-disk allowlist: `{"schema_version": 1, "callers": ["1234", ...]}`.
pub struct CallerAllowlistFile {
    pub schema_version: u32,
    #[serde(default)]
    pub callers: Vec<String>,
}

/// Allowlist-backed authorizer. An empty allowlist admits every caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowlistAuthorizer {
    callers: BTreeSet<String>,
}

impl AllowlistAuthorizer {
    pub fn new<I, S>(callers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let callers = callers
            .into_iter()
            .map(|caller| caller.as_ref().trim().to_string())
            .filter(|caller| !caller.is_empty())
            .collect();
        Self { callers }
    }

    /// Merges the callers listed in `path` into this allowlist. A missing
    /// file is an error, so a mistyped path never leaves the allowlist open.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let file = load_caller_allowlist(path)?;
        self.callers.extend(
            file.callers
                .into_iter()
                .map(|caller| caller.trim().to_string())
                .filter(|caller| !caller.is_empty()),
        );
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.callers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }
}

impl CallerAuthorizer for AllowlistAuthorizer {
    fn authorize(&self, caller_id: &str) -> AccessDecision {
        if self.is_open() {
            return AccessDecision::Allow {
                reason_code: ALLOW_OPEN_MODE,
            };
        }
        let caller_id = caller_id.trim();
        if caller_id.is_empty() {
            tracing::warn!("rejected command without caller id");
            return AccessDecision::Deny {
                reason_code: DENY_CALLER_ID_MISSING,
            };
        }
        if self.callers.contains(caller_id) {
            AccessDecision::Allow {
                reason_code: ALLOW_ALLOWLISTED,
            }
        } else {
            tracing::warn!(caller = caller_id, "rejected caller outside allowlist");
            AccessDecision::Deny {
                reason_code: DENY_CALLER_NOT_ALLOWLISTED,
            }
        }
    }
}

pub fn load_caller_allowlist(path: &Path) -> Result<CallerAllowlistFile> {
    if !path.exists() {
        bail!("caller allowlist {} does not exist", path.display());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read caller allowlist {}", path.display()))?;
    let parsed = serde_json::from_str::<CallerAllowlistFile>(&raw)
        .with_context(|| format!("failed to parse caller allowlist {}", path.display()))?;
    if parsed.schema_version != CALLER_ALLOWLIST_SCHEMA_VERSION {
        bail!(
            "unsupported caller allowlist schema_version {} in {} (expected {})",
            parsed.schema_version,
            path.display(),
            CALLER_ALLOWLIST_SCHEMA_VERSION
        );
    }
    Ok(parsed)
}
