//! Caller authorization for fsbot command dispatch.
//!
//! The engine only asks "may this caller run commands"; this crate answers it
//! from an allowlist assembled from configuration and an optional JSON file.

pub mod caller_allowlist;

pub use caller_allowlist::*;
