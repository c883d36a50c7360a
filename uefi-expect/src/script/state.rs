//! Console protocol state machine.
//!
//! Both boot protocols share one transition function: given the prompt that
//! was just recognised, decide what to send next. Keeping it free of I/O
//! makes every transition testable on its own.

use std::time::Duration;

use super::outcome::{FailureReason, Outcome};

/// Which interactive protocol is being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Reach the UEFI Shell and reset.
    ShellBoot,

    /// Run the removable-media bootloader and record whether secure boot
    /// accepted it.
    SecureBoot,
}

/// Console prompts the protocols react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prompt {
    /// Boot menu countdown ("Press ESC ... or any other key to continue").
    Menu,
    /// UEFI Shell prompt before a filesystem is selected.
    Shell,
    /// Shell prompt on the removable-media filesystem.
    Filesystem,
    /// Prompt of a chain-loaded bootloader.
    Bootloader,
    /// Secure boot rejected the image.
    AccessDenied,
}

/// Position of the secure-boot protocol relative to the bootloader launch.
///
/// The filesystem prompt shows up both before and after the bootloader has
/// been started; the phase decides which response it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    PreExec,
    PostExec,
}

/// What the driver sends in response to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Send the escape key to skip the boot menu.
    Dismiss,
    /// Switch the shell to the removable-media filesystem.
    ChangeFilesystem,
    /// Launch the bootloader.
    ExecBootloader,
    /// Reset the machine; the child is expected to exit.
    Reset,
    /// Halt from the bootloader; the child is expected to exit.
    Halt,
    /// Nothing to send.
    Ignore,
    /// The protocol is complete.
    Finish,
}

/// Tracks a protocol run across successive `expect` calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptState {
    protocol: Protocol,
    phase: Phase,
    verified: Option<bool>,
    awaiting_exit: bool,
}

impl ScriptState {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            phase: Phase::PreExec,
            verified: None,
            awaiting_exit: false,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Secure-boot verdict seen so far, if any.
    pub fn verified(&self) -> Option<bool> {
        self.verified
    }

    /// True once a reset or halt was sent and only the child's exit remains.
    pub fn awaiting_exit(&self) -> bool {
        self.awaiting_exit
    }

    /// Apply a recognised prompt and return the response to send.
    pub fn advance(&mut self, prompt: Prompt) -> Step {
        match self.protocol {
            Protocol::ShellBoot => self.advance_shell_boot(prompt),
            Protocol::SecureBoot => self.advance_secure_boot(prompt),
        }
    }

    fn advance_shell_boot(&mut self, prompt: Prompt) -> Step {
        if self.awaiting_exit {
            // One more prompt after the reset is tolerated.
            return Step::Finish;
        }

        match prompt {
            Prompt::Menu => Step::Dismiss,
            Prompt::Shell => {
                self.awaiting_exit = true;
                Step::Reset
            }
            _ => Step::Ignore,
        }
    }

    fn advance_secure_boot(&mut self, prompt: Prompt) -> Step {
        match prompt {
            Prompt::Menu => Step::Dismiss,
            Prompt::Shell => Step::ChangeFilesystem,
            Prompt::Filesystem => match self.phase {
                Phase::PreExec => {
                    self.phase = Phase::PostExec;
                    Step::ExecBootloader
                }
                Phase::PostExec => {
                    self.awaiting_exit = true;
                    Step::Reset
                }
            },
            Prompt::Bootloader => {
                self.verified = Some(true);
                self.awaiting_exit = true;
                Step::Halt
            }
            Prompt::AccessDenied => {
                self.verified = Some(false);
                Step::Ignore
            }
        }
    }

    /// Outcome when the protocol completed on its own.
    pub fn on_finish(&self) -> Outcome {
        match (self.protocol, self.verified) {
            (Protocol::SecureBoot, Some(verified)) => Outcome::Verified(verified),
            (Protocol::SecureBoot, None) => Outcome::Failure(FailureReason::NoVerdict),
            (Protocol::ShellBoot, _) => Outcome::Success,
        }
    }

    /// Outcome when the child closed its output.
    pub fn on_eof(&self, remaining: String) -> Outcome {
        match self.protocol {
            Protocol::ShellBoot if !self.awaiting_exit => {
                Outcome::Failure(FailureReason::StreamEnded { remaining })
            }
            _ => self.on_finish(),
        }
    }

    /// Outcome when no prompt matched within `after`.
    pub fn on_timeout(&self, after: Duration, remaining: String) -> Outcome {
        if self.protocol == Protocol::ShellBoot && self.awaiting_exit {
            Outcome::Failure(FailureReason::NoExitAfterReset(after))
        } else {
            Outcome::Failure(FailureReason::Timeout { after, remaining })
        }
    }
}
