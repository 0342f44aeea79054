//! Composite storage keys
//!
//! Every entry lives in one flat, byte-ordered key space. Tenancy and
//! namespacing come entirely from how keys are composed:
//!
//! ```text
//! {token}/{bucket}          → bucket marker ("bucket")
//! {token}/{bucket}/{item}   → item value (raw bytes)
//! ```
//!
//! Components are validated before they get here, so none of them contains
//! [`SEPARATOR`]. Scan prefixes always end with the separator: the prefix for
//! token `abc123` is `abc123/`, which can never match keys of `abc1234`.

use std::fmt;

use crate::auth::Token;
use crate::bucket::BucketId;
use crate::error::{Error, Result};

/// Separator between key components.
pub const SEPARATOR: char = '/';

/// Value stored under a bucket marker key.
pub const BUCKET_MARKER: &[u8] = b"bucket";

/// A caller-supplied item key, guaranteed not to contain the separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(String);

impl ItemKey {
    /// Validate a raw item key.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::InvalidArgument("item key must not be empty".to_string()));
        }
        if raw.contains(SEPARATOR) {
            return Err(Error::InvalidArgument(format!(
                "item key must not contain '{}': {}",
                SEPARATOR, raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `{token}/{bucket}/{item}`
pub fn item_key(token: &Token, bucket: &BucketId, item: &ItemKey) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        token.as_str(),
        bucket.as_str(),
        item.as_str(),
        sep = SEPARATOR
    )
}

/// `{token}/{bucket}`
pub fn bucket_marker_key(token: &Token, bucket: &BucketId) -> String {
    format!("{}{}{}", token.as_str(), SEPARATOR, bucket.as_str())
}

/// `{token}/{bucket}/` - matches every item of one bucket and nothing else.
pub fn bucket_scan_prefix(token: &Token, bucket: &BucketId) -> String {
    let mut prefix = bucket_marker_key(token, bucket);
    prefix.push(SEPARATOR);
    prefix
}

/// `{token}/` - matches every marker and item owned by one token.
pub fn token_scan_prefix(token: &Token) -> String {
    format!("{}{}", token.as_str(), SEPARATOR)
}

/// Strip a scan prefix from a composite key, returning the remaining suffix.
///
/// Returns `None` when `key` does not start with `prefix`.
pub fn strip_prefix<'a>(prefix: &str, key: &'a [u8]) -> Option<&'a [u8]> {
    key.strip_prefix(prefix.as_bytes())
}

/// Decode the suffix left after stripping a scan prefix.
pub fn decode_suffix(suffix: &[u8]) -> Result<String> {
    String::from_utf8(suffix.to_vec())
        .map_err(|e| Error::Storage(format!("Invalid UTF-8 key: {}", e)))
}

/// True when a suffix under [`token_scan_prefix`] names a bucket marker
/// rather than an item (`{bucket}` vs `{bucket}/{item}`).
pub fn is_marker_suffix(suffix: &[u8]) -> bool {
    !suffix.contains(&(SEPARATOR as u8))
}
