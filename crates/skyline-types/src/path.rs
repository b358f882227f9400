use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::Did;

/// Location of a record inside a repository: `<collection>/<rkey>`.
///
/// The collection is a namespaced schema identifier (e.g.
/// `app.bsky.feed.post`) and the record key is unique within it. The joined
/// form is also the key under which the record sits in the repository's
/// Merkle Search Tree.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordPath {
    collection: String,
    rkey: String,
}

impl RecordPath {
    pub const MAX_RKEY_LEN: usize = 512;

    pub fn new(collection: impl Into<String>, rkey: impl Into<String>) -> Result<Self, TypeError> {
        let collection = collection.into();
        let rkey = rkey.into();
        if !is_valid_collection(&collection) {
            return Err(TypeError::InvalidPath(format!("bad collection {collection:?}")));
        }
        if !is_valid_rkey(&rkey) {
            return Err(TypeError::InvalidPath(format!("bad record key {rkey:?}")));
        }
        Ok(Self { collection, rkey })
    }

    /// Parse `collection/rkey`. Exactly one separator is allowed.
    pub fn parse(path: &str) -> Result<Self, TypeError> {
        let Some((collection, rkey)) = path.split_once('/') else {
            return Err(TypeError::InvalidPath(path.to_string()));
        };
        if rkey.contains('/') {
            return Err(TypeError::InvalidPath(path.to_string()));
        }
        Self::new(collection, rkey)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn rkey(&self) -> &str {
        &self.rkey
    }

    /// The MST key for this record.
    pub fn to_key(&self) -> String {
        format!("{}/{}", self.collection, self.rkey)
    }
}

fn is_valid_collection(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 317
        && s.contains('.')
        && s.split('.').all(|seg| {
            !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}

fn is_valid_rkey(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= RecordPath::MAX_RKEY_LEN
        && s != "."
        && s != ".."
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b':' | b'~'))
}

impl fmt::Debug for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordPath({}/{})", self.collection, self.rkey)
    }
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.rkey)
    }
}

impl FromStr for RecordPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecordPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecordPath> for String {
    fn from(path: RecordPath) -> Self {
        path.to_key()
    }
}

/// Canonical identifier of a record: `at://<did>/<collection>/<rkey>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtUri {
    repo: Did,
    path: RecordPath,
}

impl AtUri {
    pub const SCHEME: &'static str = "at://";

    pub fn new(repo: Did, path: RecordPath) -> Self {
        Self { repo, path }
    }

    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let rest = s
            .strip_prefix(Self::SCHEME)
            .ok_or_else(|| TypeError::InvalidUri(s.to_string()))?;
        let (authority, path) = rest
            .split_once('/')
            .ok_or_else(|| TypeError::InvalidUri(s.to_string()))?;
        let repo = Did::new(authority).map_err(|_| TypeError::InvalidUri(s.to_string()))?;
        let path = RecordPath::parse(path).map_err(|_| TypeError::InvalidUri(s.to_string()))?;
        Ok(Self { repo, path })
    }

    pub fn repo(&self) -> &Did {
        &self.repo
    }

    pub fn path(&self) -> &RecordPath {
        &self.path
    }
}

impl fmt::Debug for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtUri({self})")
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", Self::SCHEME, self.repo, self.path)
    }
}

impl FromStr for AtUri {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AtUri {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AtUri> for String {
    fn from(uri: AtUri) -> Self {
        uri.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_parse_and_key() {
        let path = RecordPath::parse("app.bsky.feed.post/3k2yihcrp6f2c").unwrap();
        assert_eq!(path.collection(), "app.bsky.feed.post");
        assert_eq!(path.rkey(), "3k2yihcrp6f2c");
        assert_eq!(path.to_key(), "app.bsky.feed.post/3k2yihcrp6f2c");
        assert_eq!(path.to_string(), path.to_key());
    }

    #[test]
    fn path_rejects_malformed() {
        for bad in [
            "",
            "app.bsky.feed.post",
            "app.bsky.feed.post/",
            "/abc",
            "app.bsky.feed.post/a/b",
            "nodots/abc",
            "app.bsky.feed.post/..",
            "app.bsky.feed.post/a b",
        ] {
            assert!(RecordPath::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn uri_joins_repo_and_path() {
        let uri = AtUri::new(
            Did::new("did:plc:xyz").unwrap(),
            RecordPath::parse("app.bsky.feed.post/abc123").unwrap(),
        );
        assert_eq!(uri.to_string(), "at://did:plc:xyz/app.bsky.feed.post/abc123");
    }

    #[test]
    fn uri_parse_matches_display() {
        let s = "at://did:web:example.com/app.bsky.feed.like/3jzfcijpj2z2a";
        let uri = AtUri::parse(s).unwrap();
        assert_eq!(uri.repo().method(), "web");
        assert_eq!(uri.path().collection(), "app.bsky.feed.like");
        assert_eq!(uri.to_string(), s);
    }

    #[test]
    fn uri_rejects_missing_scheme_or_path() {
        assert!(AtUri::parse("did:plc:xyz/app.bsky.feed.post/abc").is_err());
        assert!(AtUri::parse("at://did:plc:xyz").is_err());
        assert!(AtUri::parse("at://handle.example/app.bsky.feed.post/abc").is_err());
    }
}
