//! HTTP server for Skyline.
//!
//! Serves the feed skeleton (`app.bsky.feed.getFeedSkeleton`) straight from
//! the post index, newest first, along with `describeFeedGenerator` and a
//! health check. Storage reads run on the blocking pool; a storage failure
//! is reported as an XRPC error, never as an empty feed.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::{BoundFeedServer, FeedServer};

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use skyline_index::{
        FeedCursor, IndexError, IndexResult, InMemoryPostIndex, InsertOutcome, PostIndex, PostRow,
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn row(rkey: &str, indexed_at: &str) -> PostRow {
        PostRow {
            uri: format!("at://did:plc:xyz/app.bsky.feed.post/{rkey}"),
            cid: "bafy".into(),
            reply_parent: None,
            reply_root: None,
            indexed_at: indexed_at.into(),
            text: rkey.into(),
            created_at: None,
        }
    }

    fn app_with(index: Arc<dyn PostIndex>, config: ServerConfig) -> Router {
        build_router(AppState::new(index, config))
    }

    fn seeded() -> Arc<InMemoryPostIndex> {
        let index = Arc::new(InMemoryPostIndex::new());
        for (rkey, at) in [
            ("a", "2024-01-01T00:00:01.000Z"),
            ("b", "2024-01-01T00:00:02.000Z"),
            ("c", "2024-01-01T00:00:03.000Z"),
        ] {
            index.insert_if_absent(&row(rkey, at)).unwrap();
        }
        index
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn uris(body: &Value) -> Vec<&str> {
        body["feed"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["post"].as_str().unwrap())
            .collect()
    }

    /// Every read fails, as if the database went away.
    struct BrokenIndex;

    impl PostIndex for BrokenIndex {
        fn migrate(&self) -> IndexResult<()> {
            Err(IndexError::Poisoned)
        }
        fn insert_if_absent(&self, _row: &PostRow) -> IndexResult<InsertOutcome> {
            Err(IndexError::Poisoned)
        }
        fn get(&self, _uri: &str) -> IndexResult<Option<PostRow>> {
            Err(IndexError::Poisoned)
        }
        fn latest(&self, _limit: usize, _before: Option<&FeedCursor>) -> IndexResult<Vec<PostRow>> {
            Err(IndexError::Poisoned)
        }
        fn count(&self) -> IndexResult<u64> {
            Err(IndexError::Poisoned)
        }
    }

    #[tokio::test]
    async fn feed_skeleton_newest_first() {
        let (status, body) = get(
            app_with(seeded(), ServerConfig::default()),
            "/xrpc/app.bsky.feed.getFeedSkeleton?feed=anything",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            uris(&body),
            [
                "at://did:plc:xyz/app.bsky.feed.post/c",
                "at://did:plc:xyz/app.bsky.feed.post/b",
                "at://did:plc:xyz/app.bsky.feed.post/a",
            ]
        );
        assert!(body.get("cursor").is_none());
    }

    #[tokio::test]
    async fn feed_skeleton_paginates_with_cursor() {
        let index = seeded();
        let (_, first) = get(
            app_with(index.clone(), ServerConfig::default()),
            "/xrpc/app.bsky.feed.getFeedSkeleton?limit=2",
        )
        .await;
        assert_eq!(uris(&first).len(), 2);
        let cursor = first["cursor"].as_str().unwrap().to_string();
        assert_eq!(
            cursor,
            "2024-01-01T00:00:02.000Z::at://did:plc:xyz/app.bsky.feed.post/b"
        );

        let (status, second) = get(
            app_with(index, ServerConfig::default()),
            &format!("/xrpc/app.bsky.feed.getFeedSkeleton?limit=2&cursor={cursor}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(uris(&second), ["at://did:plc:xyz/app.bsky.feed.post/a"]);
        assert!(second.get("cursor").is_none());
    }

    #[tokio::test]
    async fn limit_is_clamped_to_config() {
        let config = ServerConfig {
            max_limit: 1,
            ..ServerConfig::default()
        };
        let (_, body) = get(
            app_with(seeded(), config),
            "/xrpc/app.bsky.feed.getFeedSkeleton?limit=500",
        )
        .await;
        assert_eq!(uris(&body), ["at://did:plc:xyz/app.bsky.feed.post/c"]);
    }

    #[tokio::test]
    async fn malformed_cursor_is_bad_request() {
        let (status, body) = get(
            app_with(seeded(), ServerConfig::default()),
            "/xrpc/app.bsky.feed.getFeedSkeleton?cursor=nope",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidRequest");
    }

    #[tokio::test]
    async fn non_numeric_limit_is_xrpc_error() {
        let (status, body) = get(
            app_with(seeded(), ServerConfig::default()),
            "/xrpc/app.bsky.feed.getFeedSkeleton?limit=lots",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidRequest");
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_feed_is_rejected_when_configured() {
        let config = ServerConfig {
            feed_uri: Some("at://did:web:localhost/app.bsky.feed.generator/recent".into()),
            ..ServerConfig::default()
        };
        let (status, body) = get(
            app_with(seeded(), config),
            "/xrpc/app.bsky.feed.getFeedSkeleton?feed=at://did:plc:other/app.bsky.feed.generator/x",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "UnknownFeed");
    }

    #[tokio::test]
    async fn storage_failure_is_server_error() {
        let (status, body) = get(
            app_with(Arc::new(BrokenIndex), ServerConfig::default()),
            "/xrpc/app.bsky.feed.getFeedSkeleton",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "InternalServerError");
        assert!(body.get("feed").is_none());
    }

    #[tokio::test]
    async fn describe_lists_configured_feed() {
        let config = ServerConfig {
            service_did: "did:web:feeds.example".into(),
            feed_uri: Some("at://did:web:feeds.example/app.bsky.feed.generator/recent".into()),
            ..ServerConfig::default()
        };
        let (status, body) = get(
            app_with(seeded(), config),
            "/xrpc/app.bsky.feed.describeFeedGenerator",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["did"], "did:web:feeds.example");
        assert_eq!(
            body["feeds"][0]["uri"],
            "at://did:web:feeds.example/app.bsky.feed.generator/recent"
        );
    }

    #[tokio::test]
    async fn health_reports_post_count() {
        let (status, body) = get(app_with(seeded(), ServerConfig::default()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["indexed_posts"], 3);

        let (status, body) = get(
            app_with(Arc::new(BrokenIndex), ServerConfig::default()),
            "/health",
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unavailable");
    }
}
