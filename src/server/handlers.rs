//! HTTP route handlers
//!
//! Storage calls are synchronous, so every handler hands its work to the
//! blocking pool. The token extractor runs before path and body extraction:
//! a request with a bad token never reaches storage.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Extension, Path},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::auth::Token;
use crate::bucket::BucketId;
use crate::error::{Error, Result};
use crate::keys::ItemKey;
use crate::server::error::ApiError;
use crate::server::AppState;

/// Text served at `GET /`.
pub const LANDING_PAGE: &str = "kvbucket - bucketed key-value store";

/// Run a storage operation on the blocking pool.
async fn blocking<T, F>(f: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("storage task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn parse_bucket(raw: &str) -> std::result::Result<BucketId, ApiError> {
    BucketId::parse(raw).map_err(ApiError::from)
}

fn parse_key(raw: &str) -> std::result::Result<ItemKey, ApiError> {
    ItemKey::parse(raw).map_err(ApiError::from)
}

/// One line per entry, each terminated by `\n`.
fn lines<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().fold(String::new(), |mut out, item| {
        out.push_str(item.as_ref());
        out.push('\n');
        out
    })
}

/// GET /
pub async fn landing_page() -> &'static str {
    LANDING_PAGE
}

/// POST / - create a bucket, respond with its identifier
#[instrument(skip_all)]
pub async fn create_bucket(
    Extension(state): Extension<Arc<AppState>>,
    token: Token,
) -> std::result::Result<String, ApiError> {
    let bucket = blocking(move || state.buckets.create_bucket(&token)).await?;
    info!(bucket = %bucket, "Bucket created");
    Ok(bucket.to_string())
}

/// GET /_buckets - bucket identifiers owned by the token
#[instrument(skip_all)]
pub async fn list_buckets(
    Extension(state): Extension<Arc<AppState>>,
    token: Token,
) -> std::result::Result<String, ApiError> {
    let buckets = blocking(move || state.values.list_buckets(&token)).await?;
    Ok(lines(buckets.iter().map(BucketId::as_str)))
}

/// GET /:bucket/:key
#[instrument(skip(state, token))]
pub async fn get_value(
    Extension(state): Extension<Arc<AppState>>,
    token: Token,
    Path((bucket, key)): Path<(String, String)>,
) -> std::result::Result<Bytes, ApiError> {
    let bucket_id = parse_bucket(&bucket)?;
    let item = parse_key(&key)?;

    let value = blocking(move || state.values.get_value(&token, &bucket_id, &item)).await?;
    value.ok_or_else(|| ApiError(Error::NotFound(format!("{}/{}", bucket, key))))
}

/// POST /:bucket/:key - body is stored verbatim
#[instrument(skip(state, token, body))]
pub async fn set_value(
    Extension(state): Extension<Arc<AppState>>,
    token: Token,
    Path((bucket, key)): Path<(String, String)>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> std::result::Result<(), ApiError> {
    let bucket_id = parse_bucket(&bucket)?;
    let item = parse_key(&key)?;
    let value = body.map_err(|e| {
        Error::BodyRead(format!("error reading body to set {}/{}: {}", bucket, key, e.body_text()))
    })?;

    blocking(move || state.values.set_value(&token, &bucket_id, &item, &value)).await
}

/// GET /:bucket - keys of the bucket
#[instrument(skip(state, token))]
pub async fn list_values(
    Extension(state): Extension<Arc<AppState>>,
    token: Token,
    Path(bucket): Path<String>,
) -> std::result::Result<String, ApiError> {
    let bucket_id = parse_bucket(&bucket)?;

    let listing = blocking(move || state.values.list_values(&token, &bucket_id)).await?;
    Ok(lines(listing.map(|entry| entry.key)))
}

/// Health check
pub async fn health_check() -> Response {
    Json(serde_json::json!({
        "status": "healthy",
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics(Extension(state): Extension<Arc<AppState>>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
