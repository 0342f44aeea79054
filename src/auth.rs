//! Access boundary
//!
//! A token is a fixed-length shared secret sent verbatim in the
//! `Authorization` header. It is a shape check only: any well-formed token is
//! accepted and becomes its own tenant partition.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::fmt;
use tracing::warn;

use crate::error::{Error, Result};
use crate::keys::SEPARATOR;
use crate::server::error::ApiError;

/// Required token length in bytes.
pub const TOKEN_LEN: usize = 6;

/// A validated caller token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Validate the raw header value.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != TOKEN_LEN {
            return Err(Error::Unauthorized(format!(
                "token must be {} bytes, got {}",
                TOKEN_LEN,
                raw.len()
            )));
        }
        if raw.contains(SEPARATOR) {
            return Err(Error::Unauthorized(format!(
                "token must not contain '{}'",
                SEPARATOR
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are secrets; keep them out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(******)")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Token
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| Error::Unauthorized("missing Authorization header".to_string()))?;

        let raw = header
            .to_str()
            .map_err(|_| Error::Unauthorized("Authorization header is not ASCII".to_string()))?;

        Token::parse(raw).map_err(|e| {
            warn!(path = %parts.uri.path(), error = %e, "Rejected request token");
            ApiError::from(e)
        })
    }
}
