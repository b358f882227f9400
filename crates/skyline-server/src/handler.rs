use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use skyline_index::{FeedCursor, IndexResult, PostIndex};
use skyline_protocol::{
    FeedDescriptor, FeedGeneratorDescription, FeedSkeleton, FeedSkeletonParams, HealthResponse,
    SkeletonPost,
};
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<dyn PostIndex>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(index: Arc<dyn PostIndex>, config: ServerConfig) -> Self {
        Self {
            index,
            config: Arc::new(config),
        }
    }

    /// Run a storage read on the blocking pool.
    async fn read<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PostIndex) -> IndexResult<T> + Send + 'static,
    {
        let index = Arc::clone(&self.index);
        tokio::task::spawn_blocking(move || f(index.as_ref()))
            .await
            .map_err(|e| ApiError::internal(format!("read task failed: {e}")))?
            .map_err(ApiError::from)
    }
}

/// `GET /xrpc/app.bsky.feed.getFeedSkeleton`
///
/// Most recently indexed posts first. The returned cursor is present only
/// when the page is full.
pub async fn get_feed_skeleton(
    State(state): State<AppState>,
    params: Result<Query<FeedSkeletonParams>, QueryRejection>,
) -> Result<Json<FeedSkeleton>, ApiError> {
    let Query(params) = params?;
    if let (Some(served), Some(requested)) = (&state.config.feed_uri, &params.feed) {
        if served != requested {
            return Err(ApiError::bad_request(
                "UnknownFeed",
                format!("this generator does not serve {requested}"),
            ));
        }
    }
    let limit = state.config.page_size(params.limit);
    let before = params
        .cursor
        .as_deref()
        .map(str::parse::<FeedCursor>)
        .transpose()?;
    debug!(limit, cursor = ?params.cursor, "feed skeleton request");

    let rows = state
        .read(move |index| index.latest(limit, before.as_ref()))
        .await?;
    let cursor = if rows.len() == limit {
        rows.last().map(|row| row.cursor().to_string())
    } else {
        None
    };
    Ok(Json(FeedSkeleton {
        feed: rows
            .into_iter()
            .map(|row| SkeletonPost { post: row.uri })
            .collect(),
        cursor,
    }))
}

/// `GET /xrpc/app.bsky.feed.describeFeedGenerator`
pub async fn describe_feed_generator(State(state): State<AppState>) -> Json<FeedGeneratorDescription> {
    Json(FeedGeneratorDescription {
        did: state.config.service_did.clone(),
        feeds: state
            .config
            .feed_uri
            .iter()
            .map(|uri| FeedDescriptor { uri: uri.clone() })
            .collect(),
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.read(|index| index.count()).await {
        Ok(count) => (
            StatusCode::OK,
            Json(HealthResponse {
                indexed_posts: Some(count),
                ..HealthResponse::default()
            }),
        ),
        Err(e) => {
            warn!(status = %e.status(), "health check could not reach the index");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable".into(),
                    ..HealthResponse::default()
                }),
            )
        }
    }
}
