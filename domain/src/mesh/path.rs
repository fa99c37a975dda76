//! Mesh path value type
//!
//! The replication substrate addresses values by slash-separated paths that
//! are traditionally built one `get(key)` at a time. Here a path is an
//! immutable list of segments; extending it never touches the network and
//! the string form is produced once, at the point of use.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable, path-addressable location in the mesh.
///
/// # Example
///
/// ```
/// use quorum_domain::mesh::MeshPath;
///
/// let root = MeshPath::parse("vh/public");
/// let child = root.child("x");
/// assert_eq!(child.render(), "vh/public/x/");
/// assert_eq!(root.render(), "vh/public/"); // parent untouched
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshPath {
    segments: Vec<String>,
}

impl MeshPath {
    /// The empty root path
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-separated path. Empty segments are ignored, so
    /// `"vh//public/"` and `"vh/public"` are the same path.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: split_segments(path).map(str::to_string).collect(),
        }
    }

    /// Build a path from individual segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self::root();
        for segment in segments {
            path.push(segment.as_ref());
        }
        path
    }

    /// Return a new path one level below this one.
    ///
    /// A key containing `/` descends several levels at once.
    pub fn child(&self, key: impl AsRef<str>) -> Self {
        let mut next = self.clone();
        next.push(key.as_ref());
        next
    }

    fn push(&mut self, key: &str) {
        self.segments
            .extend(split_segments(key).map(str::to_string));
    }

    /// Path segments, outermost first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The last segment, if any
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The enclosing path, or `None` at the root
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `self` equals `other` or lies below it
    pub fn starts_with(&self, other: &MeshPath) -> bool {
        self.segments.starts_with(&other.segments)
    }

    /// Serialize to the substrate's string form: every segment followed by `/`.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.segments.iter().map(|s| s.len() + 1).sum());
        for segment in &self.segments {
            out.push_str(segment);
            out.push('/');
        }
        out
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl fmt::Display for MeshPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for MeshPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}
