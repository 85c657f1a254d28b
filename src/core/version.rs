//! Recipe versions and version-range guards
//!
//! Recipe version tags are not semver: they can be dotted release numbers
//! (`1.65.1`), dates (`20170709`, `2017.12.06`) or branch names (`master`).
//! Tags compare segment by segment, numerically where both segments are
//! numbers.
//!
//! Ranges use the `lo:hi` form, both ends inclusive and either end optional.
//! An upper bound matches every version it is a prefix of, so `:1.58`
//! includes `1.58.0`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One dot/dash/underscore separated component of a version tag
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Word(String),
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Word(a), Self::Word(b)) => a.cmp(b),
            // Named versions sort below numbered releases
            (Self::Word(_), Self::Number(_)) => Ordering::Less,
            (Self::Number(_), Self::Word(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A recipe version tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RecipeVersion {
    tag: String,
    segments: Vec<Segment>,
}

impl RecipeVersion {
    /// Parse a version tag
    pub fn new(tag: &str) -> Self {
        let segments = tag
            .split(['.', '-', '_'])
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<u64>() {
                Ok(n) => Segment::Number(n),
                Err(_) => Segment::Word(s.to_string()),
            })
            .collect();
        Self {
            tag: tag.to_string(),
            segments,
        }
    }

    /// The tag as written
    pub fn as_str(&self) -> &str {
        &self.tag
    }

    /// Tag with components joined by dots (`1.65.1`)
    pub fn dotted(&self) -> String {
        self.tag.replace(['-', '_'], ".")
    }

    /// Tag with components joined by underscores (`1_65_1`)
    pub fn underscored(&self) -> String {
        self.tag.replace(['.', '-'], "_")
    }

    /// Whether every segment is numeric
    pub fn is_numeric(&self) -> bool {
        !self.segments.is_empty() && self.segments.iter().all(|s| matches!(s, Segment::Number(_)))
    }

    /// Whether `self` starts with all of `other`'s segments
    fn has_prefix(&self, other: &Self) -> bool {
        other.segments.len() <= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }
}

impl PartialEq for RecipeVersion {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for RecipeVersion {}

impl Ord for RecipeVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl PartialOrd for RecipeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RecipeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

impl From<String> for RecipeVersion {
    fn from(tag: String) -> Self {
        Self::new(&tag)
    }
}

impl From<&str> for RecipeVersion {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<RecipeVersion> for String {
    fn from(v: RecipeVersion) -> Self {
        v.tag
    }
}

/// Inclusive version range, `lo:hi`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    lo: Option<RecipeVersion>,
    hi: Option<RecipeVersion>,
}

impl VersionRange {
    /// `lo:` - everything from `lo` upwards
    pub fn at_least(lo: &str) -> Self {
        Self {
            lo: Some(RecipeVersion::new(lo)),
            hi: None,
        }
    }

    /// `:hi` - everything up to and including `hi.*`
    pub fn at_most(hi: &str) -> Self {
        Self {
            lo: None,
            hi: Some(RecipeVersion::new(hi)),
        }
    }

    /// `lo:hi`
    pub fn between(lo: &str, hi: &str) -> Self {
        Self {
            lo: Some(RecipeVersion::new(lo)),
            hi: Some(RecipeVersion::new(hi)),
        }
    }

    /// A single version (`tag`, i.e. `tag:tag`)
    pub fn exactly(tag: &str) -> Self {
        Self::between(tag, tag)
    }

    /// Parse `lo:hi`, `lo:`, `:hi` or a bare tag
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((lo, hi)) => Self {
                lo: (!lo.is_empty()).then(|| RecipeVersion::new(lo)),
                hi: (!hi.is_empty()).then(|| RecipeVersion::new(hi)),
            },
            None => Self::exactly(s),
        }
    }

    /// Check whether a version falls inside the range
    pub fn contains(&self, version: &RecipeVersion) -> bool {
        let above_lo = self.lo.as_ref().map_or(true, |lo| version >= lo);
        let below_hi = self
            .hi
            .as_ref()
            .map_or(true, |hi| version <= hi || version.has_prefix(hi));
        above_lo && below_hi
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lo, &self.hi) {
            (Some(lo), Some(hi)) if lo == hi => write!(f, "{lo}"),
            (lo, hi) => write!(
                f,
                "{}:{}",
                lo.as_ref().map(ToString::to_string).unwrap_or_default(),
                hi.as_ref().map(ToString::to_string).unwrap_or_default()
            ),
        }
    }
}
