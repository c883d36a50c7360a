//! Expect engine and session construction.
//!
//! A [`Session`] waits for one of several patterns in a child's output and
//! writes scripted input back; [`SessionBuilder`] spawns the child on a PTY.

mod builder;
pub(crate) mod response;
mod session;

pub use builder::SessionBuilder;
pub use response::{Match, MatchResult};
pub use session::{Session, SessionConfig};
