//! HTTP routes definition

use axum::{routing::get, Router};

use super::handlers;

/// Key-value API routes
///
/// - GET  /              - Landing page (no token)
/// - POST /              - Create a bucket
/// - GET  /_buckets      - List the token's buckets
/// - GET  /:bucket       - List keys in a bucket
/// - GET  /:bucket/:key  - Read a value
/// - POST /:bucket/:key  - Write a value
pub fn api_routes() -> Router {
    Router::new()
        .route("/", get(handlers::landing_page).post(handlers::create_bucket))
        .route("/_buckets", get(handlers::list_buckets))
        .route("/:bucket", get(handlers::list_values))
        .route("/:bucket/:key", get(handlers::get_value).post(handlers::set_value))
}

/// Health check routes (no token)
pub fn health_routes() -> Router {
    Router::new()
        .route("/_health", get(handlers::health_check))
        .route("/_metrics", get(handlers::metrics))
}
