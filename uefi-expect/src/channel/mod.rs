//! Channel layer for pattern matching and PTY operations.
//!
//! This module handles the child process and its terminal, and the
//! buffering and pattern search applied to its output.

mod buffer;
mod patterns;
mod pty;

pub use buffer::PatternBuffer;
pub use patterns::{Found, PatternSet};
pub use pty::{PtyConfig, PtyProcess};
