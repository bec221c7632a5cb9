use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::job::ParseEnumError;

/// Namespace classification of a reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Branch,
    Remote,
    Tag,
    Note,
}

impl RefKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Branch => "branch",
            Self::Remote => "remote",
            Self::Tag => "tag",
            Self::Note => "note",
        }
    }
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "branch" => Ok(Self::Branch),
            "remote" => Ok(Self::Remote),
            "tag" => Ok(Self::Tag),
            "note" => Ok(Self::Note),
            other => Err(ParseEnumError {
                kind: "ref type",
                value: other.to_string(),
            }),
        }
    }
}

/// A single reference extracted from a repository snapshot.
///
/// Optional attributes are `None` when they do not apply; an empty string is
/// a real (if unusual) value and is stored as such.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitRef {
    /// e.g. `refs/heads/main`. Unique within one extraction.
    pub full_name: String,
    /// Short form, e.g. `main`, `origin/main`, `v1.0`.
    pub name: String,
    /// Object the ref points to directly. `None` for symbolic refs.
    pub hash: Option<String>,
    /// Remote name for remote-tracking refs.
    pub remote: Option<String>,
    /// Full name of the ref a symbolic ref points to.
    pub target: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<RefKind>,
    /// For tags: the commit reached by peeling the tag, or `hash` when no
    /// commit could be reached.
    pub tag_commit_hash: Option<String>,
}

impl GitRef {
    pub fn is_symbolic(&self) -> bool {
        self.target.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn absent_fields_serialize_as_null() {
        let r = testing::branch("main", "abc123");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "branch");
        assert!(json["remote"].is_null());
        assert!(json["target"].is_null());
        assert!(json["tag_commit_hash"].is_null());
    }

    #[test]
    fn symbolic_refs_have_no_hash() {
        let r = testing::symbolic(
            "refs/remotes/origin/HEAD",
            "origin/HEAD",
            "refs/remotes/origin/main",
        );
        assert!(r.is_symbolic());
        assert_eq!(r.hash, None);
    }

    #[test]
    fn ref_kind_labels() {
        for kind in [RefKind::Branch, RefKind::Remote, RefKind::Tag, RefKind::Note] {
            assert_eq!(kind.as_str().parse::<RefKind>().unwrap(), kind);
        }
        assert!("stash".parse::<RefKind>().is_err());
    }
}
