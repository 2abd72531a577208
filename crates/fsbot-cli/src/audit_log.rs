use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fsbot_core::{append_line_with_rotation, LogRotationPolicy};
use fsbot_engine::ErrorKind;
use serde::Serialize;

pub const AUDIT_LOG_FILE_NAME: &str = "commands.jsonl";

/// One dispatched command, as written to `commands.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub caller: String,
    pub verb: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl AuditRecord {
    pub fn new(caller: &str, verb: &str, error_kind: Option<ErrorKind>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            caller: caller.to_string(),
            verb: verb.to_string(),
            ok: error_kind.is_none(),
            error_kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    policy: LogRotationPolicy,
}

impl AuditLog {
    pub fn new(log_dir: &Path, policy: LogRotationPolicy) -> Self {
        Self {
            path: log_dir.join(AUDIT_LOG_FILE_NAME),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("failed to encode audit record")?;
        append_line_with_rotation(&self.path, &line, self.policy)
            .with_context(|| format!("failed to append audit log {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn functional_audit_records_append_as_ndjson() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = AuditLog::new(&temp.path().join("logs"), LogRotationPolicy::default());
        log.append(&AuditRecord::new("alice", "ls", None))
            .expect("append ok");
        log.append(&AuditRecord::new("mallory", "rm", Some(ErrorKind::Unauthorized)))
            .expect("append denied");

        let raw = std::fs::read_to_string(log.path()).expect("read");
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["ok"], true);
        assert!(lines[0].get("error_kind").is_none());
        assert_eq!(lines[1]["caller"], "mallory");
        assert_eq!(lines[1]["error_kind"], "unauthorized");
    }
}
