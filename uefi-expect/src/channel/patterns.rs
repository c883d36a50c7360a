//! Ordered pattern sets for prompt detection.

use std::ops::Range;

use regex::bytes::Regex;

/// An ordered set of patterns used by a single `expect` call.
///
/// Patterns are unanchored and tried in the order they were added. When more
/// than one pattern matches the buffered output, the one added first wins,
/// regardless of where in the buffer each match starts. Callers rely on this
/// to check a specific prompt before a more generic one.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

/// A pattern hit inside a haystack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    /// Index of the winning pattern in its set.
    pub index: usize,

    /// Byte span of the match within the searched haystack.
    pub span: Range<usize>,
}

impl PatternSet {
    /// Compile a pattern set from pattern strings, keeping their order.
    pub fn compile<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Find the first pattern, in set order, that matches anywhere in `haystack`.
    pub fn find(&self, haystack: &[u8]) -> Option<Found> {
        self.patterns.iter().enumerate().find_map(|(index, pattern)| {
            pattern.find(haystack).map(|m| Found {
                index,
                span: m.range(),
            })
        })
    }

    /// Number of patterns in the set.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if the set has no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl FromIterator<Regex> for PatternSet {
    fn from_iter<I: IntoIterator<Item = Regex>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}
