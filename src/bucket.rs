//! Bucket allocation
//!
//! Buckets are namespaces inside a token's key space. Their identifiers are
//! 20 random bytes rendered as 40 lowercase hex characters. Creation writes a
//! marker entry at `{token}/{bucket}`; the existence check and the marker
//! write happen in one write transaction, so two concurrent creators can
//! never both claim the same identifier.

use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::auth::Token;
use crate::error::{Error, Result};
use crate::keys::{self, BUCKET_MARKER};
use crate::storage::Storage;

/// Number of random bytes in a bucket identifier.
pub const BUCKET_ID_BYTES: usize = 20;

/// A bucket identifier: `2 * BUCKET_ID_BYTES` lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketId(String);

impl BucketId {
    /// Validate an identifier received from a caller.
    pub fn parse(raw: &str) -> Result<Self> {
        let well_formed = raw.len() == BUCKET_ID_BYTES * 2
            && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));

        if !well_formed {
            return Err(Error::InvalidArgument(format!(
                "bucket must be {} lowercase hex characters: {}",
                BUCKET_ID_BYTES * 2,
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    fn from_bytes(bytes: &[u8; BUCKET_ID_BYTES]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of random bytes for new bucket identifiers.
pub trait IdSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl IdSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| Error::Internal(format!("error creating bucket name: {}", e)))
    }
}

/// Deterministic generator, for reproducible identifiers in tests and tooling.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IdSource for SeededRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        self.rng.lock().fill_bytes(buf);
        Ok(())
    }
}

/// Allocates bucket identifiers that are unique within a token.
pub struct BucketManager {
    storage: Arc<Storage>,
    ids: Box<dyn IdSource>,
}

impl fmt::Debug for BucketManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketManager").finish()
    }
}

impl BucketManager {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self::with_source(storage, Box::new(OsRandom))
    }

    pub fn with_source(storage: Arc<Storage>, ids: Box<dyn IdSource>) -> Self {
        Self { storage, ids }
    }

    /// Create a new bucket under `token`.
    ///
    /// Fails with [`Error::BucketCollision`] if the drawn identifier already
    /// exists. There is no internal retry; the caller may simply try again.
    #[instrument(skip(self))]
    pub fn create_bucket(&self, token: &Token) -> Result<BucketId> {
        let mut bytes = [0u8; BUCKET_ID_BYTES];
        self.ids.fill(&mut bytes)?;
        let bucket = BucketId::from_bytes(&bytes);

        let marker = keys::bucket_marker_key(token, &bucket);
        self.storage.write(|txn| {
            if txn.get(marker.as_bytes())?.is_some() {
                return Err(Error::BucketCollision(bucket.to_string()));
            }
            txn.put(marker.as_bytes(), BUCKET_MARKER)
        })
        .map_err(|e| {
            warn!(bucket = %bucket, error = %e, "Failed to create bucket");
            e
        })?;

        metrics::counter!("kvbucket_buckets_created_total").increment(1);
        info!(bucket = %bucket, "Created bucket");
        Ok(bucket)
    }

    /// Whether a bucket marker exists for `token`.
    pub fn bucket_exists(&self, token: &Token, bucket: &BucketId) -> Result<bool> {
        let marker = keys::bucket_marker_key(token, bucket);
        Ok(self.storage.get(marker.as_bytes())?.is_some())
    }
}
