//! Dotted metric path types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A dotted hierarchical metric name such as `servers.web01.cpu`.
///
/// Stored as its segments; the empty path is the root of the namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetricPath {
    segments: Vec<String>,
}

impl MetricPath {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a dotted path. Empty segments (`a..b`, trailing dots) are rejected.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let segments: Vec<String> = s.split('.').map(str::to_string).collect();
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(Error::invalid_path(format!("empty segment in '{}'", s)));
        }

        Ok(Self { segments })
    }

    /// Builds a path from segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<MetricPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> MetricPath {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }
}

impl fmt::Display for MetricPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for MetricPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MetricPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<MetricPath> for String {
    fn from(path: MetricPath) -> Self {
        path.to_string()
    }
}

/// A path-store entry: a path and whether it names an actual series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathEntry {
    pub path: MetricPath,
    pub leaf: bool,
}

impl PathEntry {
    pub fn new(path: MetricPath, leaf: bool) -> Self {
        Self { path, leaf }
    }

    pub fn leaf(path: MetricPath) -> Self {
        Self::new(path, true)
    }

    pub fn branch(path: MetricPath) -> Self {
        Self::new(path, false)
    }
}

impl fmt::Display for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}
