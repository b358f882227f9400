use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use skyline_lexicon::Post;
use skyline_types::{normalize_datetime, AtUri, Cid};
use tracing::warn;

use crate::error::IndexError;

/// One row of the `posts` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRow {
    pub uri: String,
    pub cid: String,
    pub reply_parent: Option<String>,
    pub reply_root: Option<String>,
    pub indexed_at: String,
    pub text: String,
    pub created_at: Option<String>,
}

impl PostRow {
    /// Build the row for a post observed at `uri` with content hash `cid`.
    ///
    /// `createdAt` is normalized to UTC with millisecond precision. A value
    /// that does not parse is dropped with a warning; the post is still
    /// indexed.
    pub fn from_post(uri: &AtUri, cid: &Cid, post: &Post, indexed_at: impl Into<String>) -> Self {
        let (reply_parent, reply_root) = reply_uris(post);
        let created_at = match post.created_at.as_deref().map(normalize_datetime) {
            Some(Ok(ts)) => Some(ts),
            Some(Err(e)) => {
                warn!(%uri, error = %e, "dropping unparseable createdAt");
                None
            }
            None => {
                warn!(%uri, "post has no createdAt");
                None
            }
        };
        Self {
            uri: uri.to_string(),
            cid: cid.to_string(),
            reply_parent,
            reply_root,
            indexed_at: indexed_at.into(),
            text: post.text.clone(),
            created_at,
        }
    }

    /// Cursor pointing just past this row in `latest` order.
    pub fn cursor(&self) -> FeedCursor {
        FeedCursor {
            indexed_at: self.indexed_at.clone(),
            uri: self.uri.clone(),
        }
    }
}

/// `(replyParent, replyRoot)` for a post.
///
/// A reply that lacks either ref is treated as no reply at all.
pub fn reply_uris(post: &Post) -> (Option<String>, Option<String>) {
    match &post.reply {
        Some(reply) => match (&reply.parent, &reply.root) {
            (Some(parent), Some(root)) => (Some(parent.uri.clone()), Some(root.uri.clone())),
            _ => (None, None),
        },
        None => (None, None),
    }
}

/// Position in `indexedAt DESC, uri DESC` order.
///
/// Serialized as `<indexedAt>::<uri>`; both parts are needed because several
/// posts can share an `indexedAt` millisecond.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedCursor {
    pub indexed_at: String,
    pub uri: String,
}

const CURSOR_SEP: &str = "::";

impl fmt::Display for FeedCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{CURSOR_SEP}{}", self.indexed_at, self.uri)
    }
}

impl FromStr for FeedCursor {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (indexed_at, uri) = s
            .split_once(CURSOR_SEP)
            .ok_or_else(|| IndexError::InvalidCursor(s.to_string()))?;
        if indexed_at.is_empty() || !uri.starts_with("at://") {
            return Err(IndexError::InvalidCursor(s.to_string()));
        }
        Ok(Self {
            indexed_at: indexed_at.to_string(),
            uri: uri.to_string(),
        })
    }
}

/// Result of an insert-if-absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyIndexed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyline_lexicon::StrongRef;
    use skyline_types::{dag_cbor_cid, Did, RecordPath};

    fn uri() -> AtUri {
        AtUri::new(
            Did::new("did:plc:xyz").unwrap(),
            RecordPath::new("app.bsky.feed.post", "abc123").unwrap(),
        )
    }

    fn strong(rkey: &str) -> Option<StrongRef> {
        Some(StrongRef {
            uri: format!("at://did:plc:other/app.bsky.feed.post/{rkey}"),
            cid: "bafy".into(),
        })
    }

    #[test]
    fn plain_post_has_no_reply_fields() {
        let post = Post::new("hello world", "2024-01-01T00:00:00Z");
        let row = PostRow::from_post(&uri(), &dag_cbor_cid(b"p"), &post, "2024-01-01T00:00:01.000Z");
        assert_eq!(row.uri, "at://did:plc:xyz/app.bsky.feed.post/abc123");
        assert_eq!(row.text, "hello world");
        assert_eq!(row.reply_parent, None);
        assert_eq!(row.reply_root, None);
        assert_eq!(row.created_at.as_deref(), Some("2024-01-01T00:00:00.000Z"));
    }

    #[test]
    fn reply_needs_both_refs() {
        let root_only = Post::new("r", "2024-01-01T00:00:00Z").with_reply(strong("root"), None);
        assert_eq!(reply_uris(&root_only), (None, None));

        let parent_only = Post::new("p", "2024-01-01T00:00:00Z").with_reply(None, strong("parent"));
        assert_eq!(reply_uris(&parent_only), (None, None));

        let both = Post::new("b", "2024-01-01T00:00:00Z").with_reply(strong("root"), strong("parent"));
        assert_eq!(
            reply_uris(&both),
            (
                Some("at://did:plc:other/app.bsky.feed.post/parent".into()),
                Some("at://did:plc:other/app.bsky.feed.post/root".into())
            )
        );
    }

    #[test]
    fn bad_created_at_is_dropped() {
        let post = Post::new("x", "last tuesday");
        let row = PostRow::from_post(&uri(), &dag_cbor_cid(b"p"), &post, "2024-01-01T00:00:01.000Z");
        assert_eq!(row.created_at, None);

        let post = Post {
            created_at: None,
            ..Post::new("x", "")
        };
        let row = PostRow::from_post(&uri(), &dag_cbor_cid(b"p"), &post, "2024-01-01T00:00:01.000Z");
        assert_eq!(row.created_at, None);
    }

    #[test]
    fn created_at_offset_is_normalized() {
        let post = Post::new("x", "2024-03-10T12:30:00.5+05:30");
        let row = PostRow::from_post(&uri(), &dag_cbor_cid(b"p"), &post, "now");
        assert_eq!(row.created_at.as_deref(), Some("2024-03-10T07:00:00.500Z"));
    }

    #[test]
    fn cursor_roundtrip() {
        let cursor = FeedCursor {
            indexed_at: "2024-01-01T00:00:01.000Z".into(),
            uri: uri().to_string(),
        };
        let parsed: FeedCursor = cursor.to_string().parse().unwrap();
        assert_eq!(parsed, cursor);
        assert!("garbage".parse::<FeedCursor>().is_err());
        assert!("2024::not-a-uri".parse::<FeedCursor>().is_err());
    }

    #[test]
    fn row_serializes_camel_case() {
        let post = Post::new("hello", "2024-01-01T00:00:00Z");
        let row = PostRow::from_post(&uri(), &dag_cbor_cid(b"p"), &post, "2024-01-01T00:00:01.000Z");
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("replyParent").is_some());
        assert!(json.get("indexedAt").is_some());
    }
}
