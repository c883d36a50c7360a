//! Drives a session through a boot protocol.

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use super::definition::ScriptDefinition;
use super::outcome::Outcome;
use super::state::{Prompt, ScriptState, Step};
use crate::channel::PatternSet;
use crate::driver::{MatchResult, Session};
use crate::error::Result;

/// A boot protocol bound to its prompt table.
#[derive(Debug)]
pub struct BootScript {
    definition: ScriptDefinition,
    patterns: PatternSet,
    prompts: Vec<Prompt>,
    state: ScriptState,
}

impl BootScript {
    pub fn new(definition: ScriptDefinition) -> Self {
        let (patterns, prompts) = definition.pattern_set();
        let state = ScriptState::new(definition.protocol);
        Self {
            definition,
            patterns,
            prompts,
            state,
        }
    }

    pub fn definition(&self) -> &ScriptDefinition {
        &self.definition
    }

    pub fn state(&self) -> &ScriptState {
        &self.state
    }

    /// Run the protocol until it reaches a terminal state.
    ///
    /// Timeouts and end-of-stream are reported through the returned
    /// [`Outcome`]; only I/O failures are errors. The session is left open
    /// for the caller to close.
    pub async fn run<T>(&mut self, session: &mut Session<T>) -> Result<Outcome>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        info!("Running {:?} protocol", self.state.protocol());

        loop {
            let timeout = if self.state.awaiting_exit() {
                self.definition.reset_timeout
            } else {
                self.definition.prompt_timeout
            };

            let m = match session.expect(&self.patterns, timeout).await? {
                MatchResult::Matched(m) => m,
                MatchResult::Eof { remaining } => {
                    let outcome = self.state.on_eof(remaining);
                    info!("Console closed: {}", outcome);
                    return Ok(outcome);
                }
                MatchResult::Timeout { remaining } => {
                    let outcome = self.state.on_timeout(timeout, remaining);
                    warn!("Console timed out: {}", outcome);
                    return Ok(outcome);
                }
            };

            let prompt = self.prompts[m.index];
            let step = self.state.advance(prompt);
            debug!("{:?} {:?} -> {:?} ({:?})", prompt, m.text, step, self.state.phase());

            match step {
                Step::Dismiss => session.send_line(&self.definition.escape).await?,
                Step::ChangeFilesystem => {
                    session.send_line(&self.definition.filesystem_command).await?
                }
                Step::ExecBootloader => {
                    session.send_line(&self.definition.bootloader_path).await?
                }
                Step::Reset => session.send_line(&self.definition.reset_command).await?,
                Step::Halt => session.send_line(&self.definition.halt_command).await?,
                Step::Ignore => {}
                Step::Finish => {
                    warn!("{:?} prompt seen after reset; treating the run as complete", prompt);
                    return Ok(self.state.on_finish());
                }
            }
        }
    }
}
