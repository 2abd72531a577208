//! Console front end for the fsbot engine.

pub mod audit_log;
pub mod bootstrap_helpers;
pub mod cli_args;
pub mod command_text;
pub mod console_transport;
pub mod render;

pub use cli_args::Cli;
