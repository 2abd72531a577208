use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fsbot_engine::{
    EngineConfig, DEFAULT_MAX_DOWNLOAD_BYTES, DEFAULT_MAX_PENDING_CONFIRMATIONS,
};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "fsbot",
    about = "Chat-style remote filesystem session over a line-oriented console",
    version
)]
pub struct Cli {
    #[arg(
        long = "start-dir",
        env = "FSBOT_START_DIR",
        help = "Working directory the session starts in. Defaults to the process working directory."
    )]
    pub start_dir: Option<PathBuf>,

    #[arg(
        long = "allowed-callers",
        env = "FSBOT_ALLOWED_CALLERS",
        value_delimiter = ',',
        help = "Caller ids allowed to run commands. Empty together with --allowlist-path admits everyone."
    )]
    pub allowed_callers: Vec<String>,

    #[arg(
        long = "allowlist-path",
        env = "FSBOT_ALLOWLIST_PATH",
        help = "Optional JSON caller allowlist merged with --allowed-callers"
    )]
    pub allowlist_path: Option<PathBuf>,

    #[arg(
        long = "state-dir",
        env = "FSBOT_STATE_DIR",
        default_value = ".fsbot",
        help = "Directory for persisted bookmarks and delivered downloads"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long = "log-dir",
        env = "FSBOT_LOG_DIR",
        help = "Audit log directory, also packaged by /logs. Defaults to <state-dir>/logs."
    )]
    pub log_dir: Option<PathBuf>,

    #[arg(
        long = "confirmation-ttl-secs",
        env = "FSBOT_CONFIRMATION_TTL_SECS",
        default_value_t = 600,
        value_parser = parse_positive_u64,
        help = "Seconds a pending rm/kill confirmation stays valid"
    )]
    pub confirmation_ttl_secs: u64,

    #[arg(
        long = "max-pending-confirmations",
        env = "FSBOT_MAX_PENDING_CONFIRMATIONS",
        default_value_t = DEFAULT_MAX_PENDING_CONFIRMATIONS,
        value_parser = parse_positive_usize,
        help = "Upper bound on outstanding confirmations; the oldest is evicted first"
    )]
    pub max_pending_confirmations: usize,

    #[arg(
        long = "max-download-bytes",
        env = "FSBOT_MAX_DOWNLOAD_BYTES",
        default_value_t = DEFAULT_MAX_DOWNLOAD_BYTES,
        value_parser = parse_positive_u64,
        help = "Largest file /get hands off directly"
    )]
    pub max_download_bytes: u64,

    #[arg(
        long,
        env = "FSBOT_CALLER",
        default_value = "console",
        help = "Caller id the console transport presents to authorization"
    )]
    pub caller: String,
}

impl Cli {
    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.state_dir.join("logs"))
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.state_dir.join("downloads")
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            confirmation_ttl: Duration::from_secs(self.confirmation_ttl_secs),
            max_pending_confirmations: self.max_pending_confirmations,
            max_download_bytes: self.max_download_bytes,
            scratch_dir: std::env::temp_dir(),
            log_dir: Some(self.resolved_log_dir()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_defaults_match_engine_defaults() {
        let cli = Cli::try_parse_from(["fsbot"]).expect("parse");
        assert_eq!(cli.state_dir, PathBuf::from(".fsbot"));
        assert_eq!(cli.resolved_log_dir(), PathBuf::from(".fsbot/logs"));
        assert_eq!(cli.caller, "console");

        let config = cli.engine_config();
        let defaults = EngineConfig::default();
        assert_eq!(config.confirmation_ttl, defaults.confirmation_ttl);
        assert_eq!(config.max_download_bytes, defaults.max_download_bytes);
        assert_eq!(
            config.max_pending_confirmations,
            defaults.max_pending_confirmations
        );
    }

    #[test]
    fn functional_allowed_callers_split_on_commas() {
        let cli = Cli::try_parse_from(["fsbot", "--allowed-callers", "alice,bob", "--caller", "bob"])
            .expect("parse");
        assert_eq!(cli.allowed_callers, vec!["alice", "bob"]);
        assert_eq!(cli.caller, "bob");
    }

    #[test]
    fn regression_zero_limits_are_rejected() {
        assert!(Cli::try_parse_from(["fsbot", "--confirmation-ttl-secs", "0"]).is_err());
        assert!(Cli::try_parse_from(["fsbot", "--max-pending-confirmations", "0"]).is_err());
        assert!(Cli::try_parse_from(["fsbot", "--max-download-bytes", "abc"]).is_err());
        assert_eq!(parse_positive_u64("5"), Ok(5));
    }
}
