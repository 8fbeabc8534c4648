//! Foundational low-level utilities shared across Atelier crates.
//!
//! Provides atomic state-file writes and time utilities used by config and
//! order-state persistence.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::{write_json_atomic, write_text_atomic};
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms};
