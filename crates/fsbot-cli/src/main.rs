use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use fsbot_cli::audit_log::AuditLog;
use fsbot_cli::bootstrap_helpers::{build_engine, init_tracing};
use fsbot_cli::console_transport::ConsoleTransport;
use fsbot_cli::Cli;
use fsbot_core::LogRotationPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let engine = Arc::new(build_engine(&cli)?);
    let audit = AuditLog::new(&cli.resolved_log_dir(), LogRotationPolicy::from_env());
    let transport = Arc::new(ConsoleTransport::new(
        engine,
        cli.caller.clone(),
        audit,
        cli.downloads_dir(),
    ));
    transport.run().await
}
