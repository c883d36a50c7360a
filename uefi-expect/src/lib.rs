//! # uefi-expect
//!
//! Expect-style console automation for testing UEFI firmware images
//! (OVMF / AAVMF) under QEMU.
//!
//! The emulator runs on a pseudo-terminal; its serial console is matched
//! against ordered sets of regular expressions and answered with scripted
//! input until the firmware reaches a known state.
//!
//! ## Features
//!
//! - Async PTY sessions on tokio
//! - Ordered pattern sets (first pattern in the set wins)
//! - ANSI escape stripping that survives split reads
//! - Shell-boot and secure-boot protocols built on one state machine
//! - Firmware image table with per-run vars store copies
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use uefi_expect::channel::PatternSet;
//! use uefi_expect::driver::{MatchResult, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), uefi_expect::Error> {
//!     let mut session = SessionBuilder::new(["qemu-system-x86_64", "-serial", "stdio"])
//!         .spawn()?;
//!
//!     let prompts = PatternSet::compile([r"Press .* or any other key", r"Shell> "])
//!         .map_err(uefi_expect::error::ChannelError::from)?;
//!     loop {
//!         match session.expect(&prompts, Duration::from_secs(60)).await? {
//!             MatchResult::Matched(m) if m.index == 0 => session.send_line("\x1b").await?,
//!             MatchResult::Matched(_) => session.send_line("reset -s").await?,
//!             _ => break,
//!         }
//!     }
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod firmware;
pub mod runner;
pub mod script;

// Re-export main types for convenience
pub use channel::{PatternSet, PtyProcess};
pub use driver::{Match, MatchResult, Session, SessionBuilder};
pub use error::Error;
pub use firmware::{Arch, FirmwareProfile};
pub use runner::BootRun;
pub use script::{BootScript, Outcome, ScriptDefinition};
