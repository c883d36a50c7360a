//! Result of driving a boot protocol to completion.

use std::fmt;
use std::time::Duration;

/// What a protocol run concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The shell was reached and the child exited after the reset.
    Success,

    /// The run did not reach its terminal state.
    Failure(FailureReason),

    /// Secure-boot verdict: `true` if the bootloader ran, `false` if the
    /// firmware denied access to it.
    Verified(bool),
}

impl Outcome {
    /// Check the outcome against the expected secure-boot verdict.
    ///
    /// With `expected == None` only [`Outcome::Success`] passes; otherwise
    /// only a matching [`Outcome::Verified`] does.
    pub fn passes(&self, expected: Option<bool>) -> bool {
        match (self, expected) {
            (Outcome::Success, None) => true,
            (Outcome::Verified(verified), Some(expected)) => *verified == expected,
            _ => false,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure(reason) => write!(f, "failure: {}", reason),
            Outcome::Verified(true) => write!(f, "verified: image accepted"),
            Outcome::Verified(false) => write!(f, "verified: image rejected"),
        }
    }
}

/// Why a protocol run failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No prompt matched within the deadline.
    Timeout { after: Duration, remaining: String },

    /// The reset was sent but the child kept running.
    NoExitAfterReset(Duration),

    /// The child closed its output before reaching the shell.
    StreamEnded { remaining: String },

    /// The child exited without a secure-boot verdict.
    NoVerdict,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout { after, remaining } => {
                write!(f, "timed out after {:?}; unmatched output: {:?}", after, remaining)
            }
            FailureReason::NoExitAfterReset(after) => {
                write!(f, "child still running {:?} after reset", after)
            }
            FailureReason::StreamEnded { remaining } => {
                write!(f, "output ended before the shell; unmatched output: {:?}", remaining)
            }
            FailureReason::NoVerdict => write!(f, "exited without a secure boot verdict"),
        }
    }
}
