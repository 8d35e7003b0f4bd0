//! Route definitions for the Nimbus HTTP API.
//!
//! Share endpoints live under the files_sharing OCS prefix, account
//! administration under the cloud prefix.

use axum::http::StatusCode;
use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::ocs::Ocs;
use crate::state::AppState;

pub const SHARES_PREFIX: &str = "/ocs/v2.php/apps/files_sharing/api/v1";
pub const CLOUD_PREFIX: &str = "/ocs/v2.php/cloud";

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest(SHARES_PREFIX, share_routes())
        .nest(CLOUD_PREFIX, cloud_routes())
        .route("/health", get(handlers::health::health))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

fn share_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/shares",
            get(handlers::share::list_shares).post(handlers::share::create_share),
        )
        .route("/shares/pending", get(handlers::share::pending_shares))
        .route("/shares/pending/{id}", post(handlers::share::accept_share))
        .route(
            "/shares/{id}",
            get(handlers::share::get_share)
                .put(handlers::share::update_share)
                .delete(handlers::share::delete_share),
        )
}

fn cloud_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            get(handlers::admin::list_users).post(handlers::admin::create_user),
        )
        .route(
            "/users/{uid}",
            get(handlers::admin::get_user).delete(handlers::admin::delete_user),
        )
        .route(
            "/users/{uid}/groups",
            get(handlers::admin::list_user_groups).post(handlers::admin::add_to_group),
        )
        .route(
            "/users/{uid}/groups/{gid}",
            delete(handlers::admin::remove_from_group),
        )
        .route("/groups", post(handlers::admin::create_group))
        .route("/groups/{gid}", delete(handlers::admin::delete_group))
}

async fn not_found() -> Ocs<Value> {
    Ocs::failure(StatusCode::NOT_FOUND, "Not found")
}
