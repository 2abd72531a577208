use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use fsbot_access::AllowlistAuthorizer;
use fsbot_engine::{CommandEngine, HostProcessControl, JsonFileStore, SessionState};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli_args::Cli;

pub fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

pub fn build_authorizer(cli: &Cli) -> Result<AllowlistAuthorizer> {
    let mut authorizer = AllowlistAuthorizer::new(&cli.allowed_callers);
    if let Some(path) = cli.allowlist_path.as_deref() {
        authorizer
            .extend_from_file(path)
            .with_context(|| format!("failed to load caller allowlist {}", path.display()))?;
    }
    if authorizer.is_open() {
        tracing::warn!("no caller allowlist configured; every caller may run commands");
    }
    Ok(authorizer)
}

pub fn resolve_start_dir(cli: &Cli) -> Result<PathBuf> {
    let start = match cli.start_dir.clone() {
        Some(start) => start,
        None => std::env::current_dir().context("failed to read process working directory")?,
    };
    std::fs::canonicalize(&start)
        .with_context(|| format!("start directory {} is not accessible", start.display()))
}

pub fn build_engine(cli: &Cli) -> Result<CommandEngine> {
    let authorizer = build_authorizer(cli)?;
    let start_dir = resolve_start_dir(cli)?;
    let store = Arc::new(JsonFileStore::new(cli.state_dir.clone()));
    let session = SessionState::open(&start_dir, store).context("failed to open session")?;
    tracing::info!(
        start_dir = %start_dir.display(),
        state_dir = %cli.state_dir.display(),
        "session opened"
    );
    Ok(CommandEngine::new(
        cli.engine_config(),
        Arc::new(authorizer),
        session,
        Arc::new(HostProcessControl),
    ))
}
