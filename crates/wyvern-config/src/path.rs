//! Hierarchical Path Addressing
//!
//! A [`Trie`] names a configuration key such as `package/name` or
//! `dependencies/json`. A [`Filter`] selects a set of keys using two
//! wildcards that only ever occupy a whole segment:
//!
//! - `*` matches exactly one segment
//! - `**` matches a run of zero or more segments

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between path segments
pub const SEPARATOR: char = '/';

/// Path parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Empty segment in path '{0}'")]
    EmptySegment(String),

    #[error("Wildcard in concrete key '{0}'")]
    Wildcard(String),

    #[error("Partial wildcard segment '{segment}' in filter '{filter}'")]
    PartialWildcard { filter: String, segment: String },
}

/// A concrete hierarchical key
///
/// Keys compare and hash by their full segment sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trie {
    segments: Vec<String>,
}

impl Trie {
    /// The empty key (no segments)
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/` separated key
    ///
    /// The empty string is the root. No escaping is supported, so a segment
    /// can never contain the separator.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in input.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(input.to_string()));
            }
            if segment.contains('*') {
                return Err(PathError::Wildcard(input.to_string()));
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    /// Build a key from already split segments (taken as-is)
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Return a new key with `segment` appended
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Append a segment in place
    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    /// The key with its last segment removed, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.segments.split_last()?;
        Some(Self {
            segments: parent.to_vec(),
        })
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The segments in `range`, or `None` when it is out of bounds
    pub fn subpath(&self, range: std::ops::Range<usize>) -> Option<Trie> {
        self.segments.get(range).map(|segments| Self {
            segments: segments.to_vec(),
        })
    }

    /// Check whether `prefix` is a leading run of this key's segments
    pub fn starts_with(&self, prefix: &Trie) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Remove a leading `prefix`, returning the remainder
    pub fn strip_prefix(&self, prefix: &Trie) -> Option<Trie> {
        self.segments
            .strip_prefix(prefix.segments.as_slice())
            .map(|rest| Self {
                segments: rest.to_vec(),
            })
    }
}

impl fmt::Display for Trie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for Trie {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One segment of a [`Filter`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterSegment {
    /// Matches a segment equal to this string
    Literal(String),
    /// `*`: exactly one segment
    One,
    /// `**`: zero or more segments
    Any,
}

impl FilterSegment {
    pub fn literal(segment: impl Into<String>) -> Self {
        Self::Literal(segment.into())
    }
}

impl fmt::Display for FilterSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSegment::Literal(s) => write!(f, "{}", s),
            FilterSegment::One => write!(f, "*"),
            FilterSegment::Any => write!(f, "**"),
        }
    }
}

/// A key pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    segments: Vec<FilterSegment>,
}

impl Filter {
    pub fn new(segments: Vec<FilterSegment>) -> Self {
        Self { segments }
    }

    /// Parse a `/` separated pattern
    ///
    /// `*` and `**` are recognised only as complete segments; anything like
    /// `foo*` is rejected rather than silently treated as a literal.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Ok(Self::new(Vec::new()));
        }

        let mut segments = Vec::new();
        for segment in input.split(SEPARATOR) {
            let parsed = match segment {
                "" => return Err(PathError::EmptySegment(input.to_string())),
                "*" => FilterSegment::One,
                "**" => FilterSegment::Any,
                s if s.contains('*') => {
                    return Err(PathError::PartialWildcard {
                        filter: input.to_string(),
                        segment: s.to_string(),
                    })
                }
                s => FilterSegment::literal(s),
            };
            segments.push(parsed);
        }

        Ok(Self { segments })
    }

    /// A filter made only of literal segments
    pub fn literal<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(FilterSegment::literal).collect(),
        }
    }

    /// A filter matching exactly `key`
    pub fn exact(key: &Trie) -> Self {
        Self::literal(key.segments().iter().cloned())
    }

    /// `**/*`: every key with at least one segment
    pub fn all() -> Self {
        Self::new(vec![FilterSegment::Any, FilterSegment::One])
    }

    /// Extend with a `*` segment
    pub fn then_one(mut self) -> Self {
        self.segments.push(FilterSegment::One);
        self
    }

    /// Extend with a `**` segment
    pub fn then_any(mut self) -> Self {
        self.segments.push(FilterSegment::Any);
        self
    }

    pub fn segments(&self) -> &[FilterSegment] {
        &self.segments
    }

    /// True when the filter contains no wildcards
    pub fn is_exact(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, FilterSegment::Literal(_)))
    }

    /// The single key this filter matches, if it has no wildcards
    pub fn as_key(&self) -> Option<Trie> {
        self.segments
            .iter()
            .map(|s| match s {
                FilterSegment::Literal(lit) => Some(lit.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(|segments| Trie { segments })
    }

    pub fn matches(&self, key: &Trie) -> bool {
        matches_segments(&self.segments, key.segments())
    }
}

fn matches_segments(filter: &[FilterSegment], key: &[String]) -> bool {
    match filter.split_first() {
        None => key.is_empty(),
        Some((FilterSegment::Any, rest)) => {
            // Longest run first, backtracking until the remainder matches
            (0..=key.len())
                .rev()
                .any(|taken| matches_segments(rest, &key[taken..]))
        }
        Some((FilterSegment::One, rest)) => !key.is_empty() && matches_segments(rest, &key[1..]),
        Some((FilterSegment::Literal(lit), rest)) => match key.split_first() {
            Some((first, tail)) => first == lit && matches_segments(rest, tail),
            None => false,
        },
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("/"))
    }
}

impl FromStr for Filter {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&Trie> for Filter {
    fn from(key: &Trie) -> Self {
        Self::exact(key)
    }
}
