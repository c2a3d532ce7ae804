//! Webhook HTTP shell.
//!
//! Not present in the teacher (an event-listener daemon with no
//! inbound HTTP surface) — built in the idiom of `axum` as used by
//! the closest HTTP-service pattern in the retrieval pack
//! (`Router::new().route(...).with_state(...)`, `tower_http::cors`).

mod routes;

pub use routes::AppState;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the webhook router: `GET /` health, `POST /` webhook. Any
/// other method on `/` falls through to axum's built-in 405 for a
/// matched path with no matching method.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(routes::health).post(routes::webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
