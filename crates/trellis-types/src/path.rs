//! Hierarchical node paths.
//!
//! A [`Path`] is an absolute sequence of [`Segment`]s starting at the root of
//! a workspace. Each segment carries a 1-based same-name-sibling index so that
//! `/a/b[2]` addresses the second child named `b` under `/a`. The index is
//! omitted from the string form when it is 1.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::name::Name;

/// One step in a [`Path`]: a child name plus its same-name-sibling index.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Segment {
    name: Name,
    index: u32,
}

impl Segment {
    /// A segment with the default index of 1.
    pub fn new(name: Name) -> Self {
        Self { name, index: 1 }
    }

    /// A segment with an explicit same-name-sibling index (1-based).
    pub fn with_index(name: Name, index: u32) -> Result<Self, TypeError> {
        if index == 0 {
            return Err(TypeError::InvalidIndex(index));
        }
        Ok(Self { name, index })
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns `true` if the segment carries an index other than 1.
    pub fn has_index(&self) -> bool {
        self.index != 1
    }

    fn parse(raw: &str, whole: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidPath {
            path: whole.to_string(),
            reason: reason.to_string(),
        };
        let (name, index) = match raw.find('[') {
            Some(open) => {
                let close = raw
                    .strip_suffix(']')
                    .ok_or_else(|| invalid("unterminated index"))?;
                let digits = &close[open + 1..];
                let index: u32 = digits
                    .parse()
                    .map_err(|_| invalid("index is not a number"))?;
                (&raw[..open], index)
            }
            None => (raw, 1),
        };
        let name = Name::new(name).map_err(|_| invalid("empty or malformed segment"))?;
        Self::with_index(name, index)
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Segment({self})")
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_index() {
            write!(f, "{}[{}]", self.name, self.index)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// An absolute path from the root of a workspace.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The root path (`/`).
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path directly from segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Parse an absolute path such as `/a/b[2]/c`.
    ///
    /// A trailing slash is tolerated; empty interior segments are not.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let rest = value.strip_prefix('/').ok_or_else(|| TypeError::InvalidPath {
            path: value.to_string(),
            reason: "path must be absolute".into(),
        })?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let segments = rest
            .split('/')
            .map(|raw| Segment::parse(raw, value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments; the root has depth 0.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The last segment, or `None` for the root.
    pub fn last_segment(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The ancestor at the given depth (0 is the root).
    pub fn ancestor_at_depth(&self, depth: usize) -> Option<Path> {
        if depth > self.depth() {
            return None;
        }
        Some(Self {
            segments: self.segments[..depth].to_vec(),
        })
    }

    /// Append a segment with index 1.
    pub fn child(&self, name: Name) -> Path {
        self.child_segment(Segment::new(name))
    }

    /// Append an explicit segment.
    pub fn child_segment(&self, segment: Segment) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Replace the last segment, e.g. for a rename.
    pub fn with_last_segment(&self, segment: Segment) -> Result<Path, TypeError> {
        let parent = self.parent().ok_or(TypeError::RootPath("last segment"))?;
        Ok(parent.child_segment(segment))
    }

    /// Returns `true` if this path equals `other` or lies underneath it.
    pub fn is_at_or_below(&self, other: &Path) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// Returns `true` if this path lies strictly underneath `other`.
    pub fn is_descendant_of(&self, other: &Path) -> bool {
        self.segments.len() > other.segments.len() && self.is_at_or_below(other)
    }

    /// Rewrite this path so that the `from` prefix is replaced by `to`.
    ///
    /// Returns `None` if this path is not at or below `from`.
    pub fn relocate(&self, from: &Path, to: &Path) -> Option<Path> {
        if !self.is_at_or_below(from) {
            return None;
        }
        let mut segments = to.segments.clone();
        segments.extend_from_slice(&self.segments[from.segments.len()..]);
        Some(Self { segments })
    }
}

impl FromStr for Path {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
