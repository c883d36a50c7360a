//! Result of a single `expect` call.

use std::ops::Range;
use std::time::Duration;

use crate::error::ChannelError;

/// A successful pattern match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Index of the matched pattern in the set passed to `expect`.
    pub index: usize,

    /// The matched text.
    pub text: String,

    /// Output that preceded the match since the previous match.
    pub before: String,

    /// Span of the match, as absolute offsets into the session's output
    /// stream since the session started.
    pub span: Range<usize>,

    /// Time spent waiting for the match.
    pub elapsed: Duration,
}

/// Outcome of an `expect` call. Exactly one of these is returned per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// A pattern matched.
    Matched(Match),

    /// The child closed its output before any pattern matched.
    Eof {
        /// Unmatched output left in the buffer.
        remaining: String,
    },

    /// The deadline passed before any pattern matched.
    Timeout {
        /// Unmatched output left in the buffer.
        remaining: String,
    },
}

impl MatchResult {
    /// Index of the matched pattern, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            MatchResult::Matched(m) => Some(m.index),
            _ => None,
        }
    }

    /// Check if the call ended at end-of-stream.
    pub fn is_eof(&self) -> bool {
        matches!(self, MatchResult::Eof { .. })
    }

    /// Check if the call timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MatchResult::Timeout { .. })
    }

    /// Convert into the match, treating end-of-stream and timeout as errors.
    ///
    /// `timeout` is the budget the call was given, used for the error.
    pub fn into_match(self, timeout: Duration) -> Result<Match, ChannelError> {
        match self {
            MatchResult::Matched(m) => Ok(m),
            MatchResult::Eof { .. } => Err(ChannelError::Closed),
            MatchResult::Timeout { .. } => Err(ChannelError::PatternTimeout(timeout)),
        }
    }
}
