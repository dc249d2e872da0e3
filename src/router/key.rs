//! Keys: the matching unit for one routing dimension.
//!
//! A key is an ordered sequence of [`Label`]s. Wildcards labels (`**`)
//! absorb whole token runs, so matching a pattern key against a literal
//! key works like glob matching lifted from characters to tokens: the key
//! splits into runs of non-wildcards labels which must appear in order,
//! with the first and last runs anchored unless the key starts or ends
//! with a wildcards label.

use std::fmt;

use crate::error::RouterError;
use crate::router::label::Label;

/// An ordered, non-empty sequence of labels.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Key(Vec<Label>);

impl Key {
    pub fn new(labels: Vec<Label>) -> Self {
        Self(labels)
    }

    /// Builds a literal key by splitting `s` on `separator`.
    pub fn literal(s: &str, separator: char) -> Self {
        Self(s.split(separator).map(Label::literal).collect())
    }

    /// Builds a literal key from pre-split tokens.
    pub fn literal_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Label::literal).collect())
    }

    /// Builds a pattern key by splitting `s` on `separator`, compiling
    /// each token that contains glob metacharacters.
    pub fn pattern(s: &str, separator: char) -> Result<Self, RouterError> {
        s.split(separator).map(Label::pattern).collect::<Result<_, _>>().map(Self)
    }

    /// Builds a pattern key from pre-split tokens.
    pub fn pattern_tokens<I, S>(tokens: I) -> Result<Self, RouterError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tokens.into_iter().map(Label::pattern).collect::<Result<_, _>>().map(Self)
    }

    pub fn labels(&self) -> &[Label] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every label of this key is a wildcards label.
    pub fn is_wildcards(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(Label::is_wildcards)
    }

    /// Matches this (possibly patterned) key against a literal key.
    pub fn matches(&self, x: &Key) -> bool {
        self.assign(x).is_some()
    }

    /// Returns the tokens absorbed by each non-literal label, in label
    /// order: a glob label captures the one token it matched, a wildcards
    /// label the whole run it absorbed (possibly empty). Returns no
    /// captures when the key does not match.
    pub fn capture(&self, x: &Key) -> Vec<Vec<String>> {
        let Some(spans) = self.assign(x) else {
            return Vec::new();
        };

        self.0
            .iter()
            .zip(spans)
            .filter(|(label, _)| !label.is_literal())
            .map(|(_, (start, end))| {
                x.0[start..end].iter().map(|l| l.text().to_string()).collect()
            })
            .collect()
    }

    /// Computes, for each label of this key, the token span of `x` it
    /// consumes. Wildcards runs are resolved greedily left to right: each
    /// inner run of plain labels matches at its first possible position,
    /// the trailing run is anchored at the end.
    fn assign(&self, x: &Key) -> Option<Vec<(usize, usize)>> {
        let pattern = &self.0;
        if pattern.is_empty() {
            return x.0.is_empty().then(Vec::new);
        }

        let mut spans = vec![(0, 0); pattern.len()];

        // Fast path: no wildcards means position-by-position matching.
        if !pattern.iter().any(Label::is_wildcards) {
            if pattern.len() != x.0.len() {
                return None;
            }
            for (i, label) in pattern.iter().enumerate() {
                if !label.matches(x.0[i].text()) {
                    return None;
                }
                spans[i] = (i, i + 1);
            }
            return Some(spans);
        }

        let runs = split_runs(pattern);
        let leading = pattern[0].is_wildcards();
        let trailing = pattern[pattern.len() - 1].is_wildcards();

        let mut pos = 0;
        for (i, run) in runs.iter().enumerate() {
            let last = i == runs.len() - 1 && !trailing;
            let at = if i == 0 && !leading {
                // Anchored head run.
                run_matches_at(pattern, run, x, 0).then_some(0)?
            } else if last {
                // Anchored tail run.
                let n = run.end - run.start;
                let at = x.0.len().checked_sub(n)?;
                if at < pos || !run_matches_at(pattern, run, x, at) {
                    return None;
                }
                at
            } else {
                find_run(pattern, run, x, pos)?
            };

            for (j, p) in (run.start..run.end).enumerate() {
                spans[p] = (at + j, at + j + 1);
            }
            pos = at + (run.end - run.start);
        }

        // Wildcards labels absorb the gaps between the runs they separate.
        let mut consumed = 0;
        for (i, label) in pattern.iter().enumerate() {
            if label.is_wildcards() {
                let until = pattern[i + 1..]
                    .iter()
                    .position(|l| !l.is_wildcards())
                    .map(|off| spans[i + 1 + off].0)
                    .unwrap_or(x.0.len());
                spans[i] = (consumed, until);
                consumed = until;
            } else {
                consumed = spans[i].1;
            }
        }

        Some(spans)
    }

    /// Joins the label texts with a separator.
    pub fn join(&self, separator: &str) -> String {
        self.0
            .iter()
            .map(Label::text)
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn tokens(&self) -> Vec<&str> {
        self.0.iter().map(Label::text).collect()
    }
}

/// Half-open ranges of consecutive non-wildcards labels.
#[derive(Clone, Copy)]
struct Run {
    start: usize,
    end: usize,
}

fn split_runs(pattern: &[Label]) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, label) in pattern.iter().enumerate() {
        if label.is_wildcards() {
            if let Some(s) = start.take() {
                runs.push(Run { start: s, end: i });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        runs.push(Run {
            start: s,
            end: pattern.len(),
        });
    }
    runs
}

fn run_matches_at(pattern: &[Label], run: &Run, x: &Key, at: usize) -> bool {
    let n = run.end - run.start;
    if at + n > x.0.len() {
        return false;
    }
    (0..n).all(|j| pattern[run.start + j].matches(x.0[at + j].text()))
}

fn find_run(pattern: &[Label], run: &Run, x: &Key, from: usize) -> Option<usize> {
    let n = run.end - run.start;
    (from..=x.0.len().checked_sub(n)?).find(|&at| run_matches_at(pattern, run, x, at))
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(label.text())?;
        }
        Ok(())
    }
}
