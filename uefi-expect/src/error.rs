//! Error types for uefi-expect.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::firmware::Arch;

/// Main error type for uefi-expect operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The child process could not be started
    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Firmware selection or vars store errors
    #[error("Firmware error: {0}")]
    Firmware(#[from] FirmwareError),
}

/// Errors raised while starting a child on a pseudo-terminal.
#[derive(Error, Debug)]
pub enum SpawnError {
    /// No program was given
    #[error("Empty command line")]
    EmptyCommand,

    /// Failed to allocate or configure the pseudo-terminal
    #[error("Failed to allocate PTY: {0}")]
    Pty(#[from] nix::Error),

    /// The executable could not be started
    #[error("Failed to execute '{program}': {source}")]
    Exec {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Channel layer errors (pattern matching, PTY I/O).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// I/O error on the terminal
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Pattern matching timed out
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),

    /// Child closed its output before a pattern matched
    #[error("Channel closed")]
    Closed,
}

/// Firmware table and vars store errors.
#[derive(Error, Debug)]
pub enum FirmwareError {
    /// Only 2 MB and 4 MB OVMF images are packaged
    #[error("Invalid flash size {0} MB")]
    UnsupportedFlashSize(u32),

    /// Combination of options not built for this architecture
    #[error("{arch} does not support {detail}")]
    Unsupported { arch: Arch, detail: String },

    /// Failed to create the per-run copy of the vars template
    #[error("Failed to prepare vars store from '{}': {source}", path.display())]
    VarsStore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to remove the per-run copy once the run finished
    #[error("Failed to remove vars store '{}': {source}", path.display())]
    VarsCleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type alias using uefi-expect's Error.
pub type Result<T> = std::result::Result<T, Error>;
