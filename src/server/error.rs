//! HTTP error types for the server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use crate::error::Error;

/// Body sent with every 401.
pub const UNAUTHORIZED_BODY: &str = "Unknown user";

/// Error wrapper for converting kvbucket errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::BucketCollision(_)
            | Error::Storage(_)
            | Error::BodyRead(_)
            | Error::Config(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self.0 {
            Error::NotFound(what) => debug!(what = %what, "Not found"),
            Error::Storage(_) => {
                metrics::counter!("kvbucket_storage_errors_total").increment(1);
                error!(error = %self.0, "Storage failure");
            }
            _ => warn!(status = status.as_u16(), error = %self.0, "Request failed"),
        }

        let body = match self.0 {
            Error::Unauthorized(_) => UNAUTHORIZED_BODY.to_string(),
            other => other.to_string(),
        };

        (status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}
