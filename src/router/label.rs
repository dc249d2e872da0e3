//! Route component labels.
//!
//! A label is the unit of comparison inside a key: either a literal token
//! or a glob pattern matching exactly one token. A label whose text is two
//! or more asterisks and nothing else is a *wildcards* label, which is
//! handled at key level (it absorbs whole token runs, see
//! [`Key`](super::key::Key)) and never consults its compiled matcher.

use std::cmp::Ordering;
use std::fmt;

use globset::{Glob, GlobMatcher};

use crate::error::RouterError;

/// A single route token pattern.
#[derive(Clone)]
pub struct Label {
    text: String,
    matcher: Option<GlobMatcher>,
    wildcards: bool,
}

impl Label {
    /// Creates a literal label. The text is never interpreted, even if it
    /// contains glob metacharacters.
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            matcher: None,
            wildcards: false,
        }
    }

    /// Creates a label from pattern text, compiling it when it contains
    /// glob metacharacters.
    pub fn pattern(text: impl Into<String>) -> Result<Self, RouterError> {
        let text = text.into();
        if is_literal_text(&text) {
            return Ok(Self::literal(text));
        }

        let wildcards = text.len() > 1 && text.bytes().all(|b| b == b'*');
        let matcher = Glob::new(&text)
            .map_err(|source| RouterError::InvalidPattern {
                pattern: text.clone(),
                source,
            })?
            .compile_matcher();

        Ok(Self {
            text,
            matcher: Some(matcher),
            wildcards,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether this label compares by text equality only.
    pub fn is_literal(&self) -> bool {
        self.matcher.is_none()
    }

    /// Whether this label absorbs any number of whole tokens.
    pub fn is_wildcards(&self) -> bool {
        self.wildcards
    }

    /// Matches a single token against this label.
    pub fn matches(&self, token: &str) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(token),
            None => self.text == token,
        }
    }
}

/// Pattern text containing none of these is stored as a literal.
fn is_literal_text(s: &str) -> bool {
    !s.contains(['*', '?', '[', ']', '{', '}'])
}

/// Labels compare equal by text; two keys are equal iff their label
/// texts agree pairwise.
impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Label {}

impl Label {
    /// Edge sort order: literals before patterns so exact matches are
    /// probed first, then by text within each group. Deliberately not
    /// `Ord` — key equality ignores the literal/pattern distinction.
    pub fn edge_order(&self, other: &Self) -> Ordering {
        self.is_literal()
            .cmp(&other.is_literal())
            .reverse()
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_literal() {
            write!(f, "Label({:?})", self.text)
        } else {
            write!(f, "Label(glob {:?})", self.text)
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
