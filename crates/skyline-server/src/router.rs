use axum::routing::get;
use axum::Router;
use skyline_protocol::endpoints;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with every Skyline endpoint.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::GET_FEED_SKELETON, get(handler::get_feed_skeleton))
        .route(
            endpoints::DESCRIBE_FEED_GENERATOR,
            get(handler::describe_feed_generator),
        )
        .route(endpoints::HEALTH, get(handler::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
