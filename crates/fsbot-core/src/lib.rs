//! Low-level utilities shared across fsbot crates.
//!
//! Atomic text persistence for named string mappings, unix clock helpers used
//! by confirmation expiry, and size-bounded audit log appends.

pub mod atomic_io;
pub mod log_rotation;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use log_rotation::{append_line_with_rotation, LogRotationPolicy};
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, is_older_than_ms};
