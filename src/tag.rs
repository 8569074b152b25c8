//! Causal tags
//!
//! A tag is the structural position of a communication inside the
//! choreography: one counter per nesting depth. Every participant replays the
//! same control flow, so every participant computes the same tag for the same
//! logical step without exchanging anything. Transports pair a send with its
//! receive by `(sender, tag)` alone.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::{ChoreographyError, Result};

/// Causal path identifier. The path is never empty; its last slot is the
/// counter of the innermost active sub-choreography.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct Tag {
    path: Vec<u32>,
}

impl Tag {
    /// The tag a projection starts from.
    pub fn root() -> Self {
        Tag { path: vec![0] }
    }

    /// Advance the innermost counter. Called before every point-to-point,
    /// multicast and broadcast operation.
    ///
    /// A counter never wraps: once it reaches `u32::MAX` the tag is exhausted
    /// and further steps at that depth fail.
    pub fn comm(&mut self) -> Result<()> {
        let next = match self.path.last() {
            Some(counter) => counter
                .checked_add(1)
                .ok_or_else(|| ChoreographyError::TagExhausted(self.to_string()))?,
            None => return Ok(()),
        };
        if let Some(counter) = self.path.last_mut() {
            *counter = next;
        }
        Ok(())
    }

    /// Advance the innermost counter, then return a child tag one level
    /// deeper. Called before entering any sub-choreography.
    pub fn call(&mut self) -> Result<Tag> {
        self.comm()?;
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(&self.path);
        path.push(0);
        Ok(Tag { path })
    }

    pub fn path(&self) -> &[u32] {
        &self.path
    }

    /// Nesting depth, 1 for the root.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Whether `other` was forked (directly or transitively) from a tag whose
    /// path equals this one.
    pub fn is_ancestor_of(&self, other: &Tag) -> bool {
        other.path.len() > self.path.len() && other.path.starts_with(&self.path)
    }

    /// JSON array form used inside wire envelopes.
    pub fn to_wire(&self) -> String {
        let parts: Vec<String> = self.path.iter().map(u32::to_string).collect();
        format!("[{}]", parts.join(","))
    }

    pub fn from_wire(s: &str) -> Result<Tag> {
        Ok(serde_json::from_str(s)?)
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::root()
    }
}

impl TryFrom<Vec<u32>> for Tag {
    type Error = ChoreographyError;

    fn try_from(path: Vec<u32>) -> Result<Self> {
        if path.is_empty() {
            return Err(ChoreographyError::Serialization(
                "tag path must not be empty".into(),
            ));
        }
        Ok(Tag { path })
    }
}

impl From<Tag> for Vec<u32> {
    fn from(tag: Tag) -> Self {
        tag.path
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for counter in &self.path {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{counter}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Tag {
    type Err = ChoreographyError;

    fn from_str(s: &str) -> Result<Self> {
        let path = s
            .split('.')
            .map(|part| {
                part.parse::<u32>().map_err(|e| {
                    ChoreographyError::Serialization(format!("invalid tag segment {part:?}: {e}"))
                })
            })
            .collect::<Result<Vec<u32>>>()?;
        Tag::try_from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comm_bumps_innermost_counter() {
        let mut tag = Tag::root();
        tag.comm().unwrap();
        tag.comm().unwrap();
        assert_eq!(tag.path(), &[2]);
    }

    #[test]
    fn call_forks_one_level_deeper() {
        let mut parent = Tag::root();
        let mut child = parent.call().unwrap();
        assert_eq!(parent.path(), &[1]);
        assert_eq!(child.path(), &[1, 0]);

        child.comm().unwrap();
        let grandchild = child.call().unwrap();
        assert_eq!(grandchild.path(), &[1, 2, 0]);
        assert!(parent.is_ancestor_of(&grandchild));
        assert!(!grandchild.is_ancestor_of(&parent));
    }

    #[test]
    fn sibling_forks_never_collide() {
        let mut parent = Tag::root();
        let a = parent.call().unwrap();
        let b = parent.call().unwrap();
        assert_ne!(a, b);
        assert!(!a.is_ancestor_of(&b));
    }

    #[test]
    fn display_and_parse() {
        let mut tag = Tag::root();
        tag.comm().unwrap();
        let child = tag.call().unwrap();
        assert_eq!(child.to_string(), "2.0");
        assert_eq!("2.0".parse::<Tag>().ok(), Some(child));
        assert!("".parse::<Tag>().is_err());
        assert!("1.x".parse::<Tag>().is_err());
    }

    #[test]
    fn wire_form_is_a_json_array() {
        let mut tag = Tag::root();
        let child = tag.call().unwrap();
        assert_eq!(child.to_wire(), "[1,0]");
        assert_eq!(serde_json::to_string(&child).ok().as_deref(), Some("[1,0]"));
        assert_eq!(Tag::from_wire("[1,0]").ok(), Some(child));
        assert!(Tag::from_wire("[]").is_err());
    }

    #[test]
    fn exhausted_counter_fails_instead_of_wrapping() {
        let mut tag = Tag::try_from(vec![3, u32::MAX]).unwrap();
        let err = tag.comm().unwrap_err();
        assert!(matches!(err, ChoreographyError::TagExhausted(_)));
        assert!(err.is_fatal());
        assert!(tag.call().is_err());
        assert_eq!(tag.path(), &[3, u32::MAX]);
    }
}
