use serde::{Deserialize, Serialize};

/// XRPC method identifiers used by Skyline.
pub mod nsid {
    pub const SUBSCRIBE_REPOS: &str = "com.atproto.sync.subscribeRepos";
    pub const CREATE_SESSION: &str = "com.atproto.server.createSession";
    pub const GET_FEED_SKELETON: &str = "app.bsky.feed.getFeedSkeleton";
    pub const DESCRIBE_FEED_GENERATOR: &str = "app.bsky.feed.describeFeedGenerator";
}

/// HTTP paths served by the feed server.
pub mod endpoints {
    pub const GET_FEED_SKELETON: &str = "/xrpc/app.bsky.feed.getFeedSkeleton";
    pub const DESCRIBE_FEED_GENERATOR: &str = "/xrpc/app.bsky.feed.describeFeedGenerator";
    pub const HEALTH: &str = "/health";
}

/// `<base>/xrpc/<nsid>`.
pub fn xrpc_url(base: &str, nsid: &str) -> String {
    format!("{}/xrpc/{nsid}", base.trim_end_matches('/'))
}

/// Subscription URL for `subscribeRepos`, resuming after `cursor`.
///
/// `relay` is either a bare host URL (`wss://bsky.network`) or a full
/// `subscribeRepos` URL.
pub fn subscribe_url(relay: &str, cursor: Option<i64>) -> String {
    let base = if relay.contains("/xrpc/") {
        relay.to_string()
    } else {
        xrpc_url(relay, nsid::SUBSCRIBE_REPOS)
    };
    match cursor {
        Some(cursor) => {
            let sep = if base.contains('?') { '&' } else { '?' };
            format!("{base}{sep}cursor={cursor}")
        }
        None => base,
    }
}

/// Query parameters of `getFeedSkeleton`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FeedSkeletonParams {
    pub feed: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

/// Response body of `getFeedSkeleton`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSkeleton {
    pub feed: Vec<SkeletonPost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonPost {
    pub post: String,
}

/// Response body of `describeFeedGenerator`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedGeneratorDescription {
    pub did: String,
    pub feeds: Vec<FeedDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    pub uri: String,
}

/// Error body returned by XRPC endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct XrpcError {
    pub error: String,
    pub message: String,
}

impl XrpcError {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub indexed_posts: Option<u64>,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            indexed_posts: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_url_from_host() {
        assert_eq!(
            subscribe_url("wss://bsky.network/", None),
            "wss://bsky.network/xrpc/com.atproto.sync.subscribeRepos"
        );
        assert_eq!(
            subscribe_url("wss://bsky.network", Some(1234)),
            "wss://bsky.network/xrpc/com.atproto.sync.subscribeRepos?cursor=1234"
        );
    }

    #[test]
    fn subscribe_url_keeps_full_url() {
        let full = "wss://relay.example/xrpc/com.atproto.sync.subscribeRepos";
        assert_eq!(subscribe_url(full, None), full);
        assert_eq!(
            subscribe_url(&format!("{full}?compress=false"), Some(9)),
            format!("{full}?compress=false&cursor=9")
        );
    }

    #[test]
    fn skeleton_omits_missing_cursor() {
        let body = FeedSkeleton {
            feed: vec![SkeletonPost {
                post: "at://did:plc:xyz/app.bsky.feed.post/abc123".into(),
            }],
            cursor: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(
            json,
            r#"{"feed":[{"post":"at://did:plc:xyz/app.bsky.feed.post/abc123"}]}"#
        );
    }

    #[test]
    fn health_response_defaults() {
        let h = HealthResponse::default();
        assert_eq!(h.status, "ok");
        assert!(h.indexed_posts.is_none());
    }

    #[test]
    fn endpoint_paths_match_nsids() {
        assert_eq!(endpoints::GET_FEED_SKELETON, format!("/xrpc/{}", nsid::GET_FEED_SKELETON));
        assert_eq!(
            endpoints::DESCRIBE_FEED_GENERATOR,
            format!("/xrpc/{}", nsid::DESCRIBE_FEED_GENERATOR)
        );
        assert_eq!(
            xrpc_url("https://bsky.social", nsid::CREATE_SESSION),
            "https://bsky.social/xrpc/com.atproto.server.createSession"
        );
    }
}
