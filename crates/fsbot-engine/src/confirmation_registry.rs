//! Two-phase confirmation for destructive actions.
//!
//! A destructive command registers a typed [`PendingAction`] and hands the
//! caller an opaque token. A later `resolve(token, accepted)` removes the
//! entry under the registry lock, so exactly one resolution per token can
//! win; every other attempt observes `UnknownConfirmation`. Entries expire
//! after a TTL and the table is capped at `max_pending` entries.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fsbot_core::{current_unix_timestamp_ms, is_older_than_ms};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::engine_error::{EngineError, EngineResult};
use crate::process_control::ProcessControl;

pub const DEFAULT_CONFIRMATION_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_PENDING_CONFIRMATIONS: usize = 256;

const TOKEN_HEX_LEN: usize = 24;

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    DeleteItem { path: PathBuf },
    KillProcess { pid: u32 },
}

impl PendingAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DeleteItem { .. } => "delete",
            Self::KillProcess { .. } => "terminate",
        }
    }

    pub fn target(&self) -> String {
        match self {
            Self::DeleteItem { path } => path.display().to_string(),
            Self::KillProcess { pid } => format!("pid {pid}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingConfirmation {
    pub token: String,
    pub action: PendingAction,
    pub requested_by: String,
    pub created_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    Accepted { action: PendingAction },
    Rejected { action: PendingAction },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLimits {
    pub ttl: Duration,
    pub max_pending: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CONFIRMATION_TTL,
            max_pending: DEFAULT_MAX_PENDING_CONFIRMATIONS,
        }
    }
}

pub struct ConfirmationRegistry {
    pending: Mutex<HashMap<String, PendingConfirmation>>,
    limits: RegistryLimits,
    process_control: Arc<dyn ProcessControl>,
}

impl ConfirmationRegistry {
    pub fn new(limits: RegistryLimits, process_control: Arc<dyn ProcessControl>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            limits,
            process_control,
        }
    }

    pub fn process_control(&self) -> &dyn ProcessControl {
        self.process_control.as_ref()
    }

    pub fn register(&self, action: PendingAction, requested_by: &str) -> PendingConfirmation {
        self.register_at(action, requested_by, current_unix_timestamp_ms())
    }

    pub fn resolve(&self, token: &str, accepted: bool) -> EngineResult<ConfirmationOutcome> {
        self.resolve_at(token, accepted, current_unix_timestamp_ms())
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingConfirmation>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ttl_ms(&self) -> u64 {
        self.limits.ttl.as_millis().try_into().unwrap_or(u64::MAX)
    }

    fn evict_expired(&self, pending: &mut HashMap<String, PendingConfirmation>, now_unix_ms: u64) {
        let ttl_ms = self.ttl_ms();
        let before = pending.len();
        pending.retain(|_, entry| !is_older_than_ms(entry.created_unix_ms, ttl_ms, now_unix_ms));
        let evicted = before - pending.len();
        if evicted > 0 {
            tracing::debug!(evicted, "expired confirmations evicted");
        }
    }

    pub(crate) fn register_at(
        &self,
        action: PendingAction,
        requested_by: &str,
        now_unix_ms: u64,
    ) -> PendingConfirmation {
        let mut pending = self.lock();
        self.evict_expired(&mut pending, now_unix_ms);
        while pending.len() >= self.limits.max_pending.max(1) {
            let oldest = pending
                .values()
                .min_by_key(|entry| entry.created_unix_ms)
                .map(|entry| entry.token.clone());
            match oldest {
                Some(token) => {
                    pending.remove(&token);
                    tracing::debug!(%token, "confirmation evicted at capacity");
                }
                None => break,
            }
        }

        let mut token = generate_token(&action, now_unix_ms);
        while pending.contains_key(&token) {
            token = generate_token(&action, now_unix_ms);
        }
        let entry = PendingConfirmation {
            token: token.clone(),
            action,
            requested_by: requested_by.to_string(),
            created_unix_ms: now_unix_ms,
        };
        pending.insert(token, entry.clone());
        tracing::info!(
            token = %entry.token,
            action = entry.action.label(),
            target = %entry.action.target(),
            "confirmation registered"
        );
        entry
    }

    pub(crate) fn resolve_at(
        &self,
        token: &str,
        accepted: bool,
        now_unix_ms: u64,
    ) -> EngineResult<ConfirmationOutcome> {
        let entry = {
            let mut pending = self.lock();
            self.evict_expired(&mut pending, now_unix_ms);
            pending.remove(token)
        };
        let Some(entry) = entry else {
            tracing::warn!(token, "confirmation token unknown or already resolved");
            return Err(EngineError::UnknownConfirmation(token.to_string()));
        };

        if !accepted {
            tracing::info!(token, action = entry.action.label(), "confirmation rejected");
            return Ok(ConfirmationOutcome::Rejected {
                action: entry.action,
            });
        }

        self.execute(&entry.action)?;
        tracing::info!(
            token,
            action = entry.action.label(),
            target = %entry.action.target(),
            "confirmed action completed"
        );
        Ok(ConfirmationOutcome::Accepted {
            action: entry.action,
        })
    }

    fn execute(&self, action: &PendingAction) -> EngineResult<()> {
        let result = match action {
            PendingAction::DeleteItem { path } => match fs::symlink_metadata(path) {
                Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
                Ok(_) => fs::remove_file(path),
                Err(error) => Err(error),
            },
            PendingAction::KillProcess { pid } => self.process_control.terminate(*pid),
        };
        result.map_err(|error| {
            tracing::warn!(action = action.label(), target = %action.target(), %error, "confirmed action failed");
            EngineError::ActionFailed {
                action: action.label(),
                target: action.target(),
                reason: error.to_string(),
            }
        })
    }
}

fn generate_token(action: &PendingAction, now_unix_ms: u64) -> String {
    let counter = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let mut hasher = Sha256::new();
    hasher.update(counter.to_le_bytes());
    hasher.update(now_unix_ms.to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(action.target().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..TOKEN_HEX_LEN].to_string()
}
