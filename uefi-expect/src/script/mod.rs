//! Boot protocols driven over a console session.
//!
//! A protocol is a prompt table ([`ScriptDefinition`]) plus a state machine
//! ([`ScriptState`]) that decides what to send for each recognised prompt.
//! [`BootScript`] ties them to a [`Session`](crate::driver::Session) and
//! loops until the run reaches an [`Outcome`].

mod boot;
mod definition;
mod outcome;
mod state;

pub use boot::BootScript;
pub use definition::ScriptDefinition;
pub use outcome::{FailureReason, Outcome};
pub use state::{Phase, Prompt, Protocol, ScriptState, Step};
