//! Item storage scoped to (token, bucket)
//!
//! Items are written without any existence check and overwrite in place.
//! Listing runs one prefix scan inside a single snapshot and hands the
//! result back as a one-shot iterator.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::auth::Token;
use crate::bucket::BucketId;
use crate::error::Result;
use crate::keys::{self, ItemKey};
use crate::storage::Storage;

/// One `(key, value)` pair of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: Bytes,
}

/// Entries of one bucket in ascending key order, consumed once.
#[derive(Debug)]
pub struct Listing {
    entries: std::vec::IntoIter<Entry>,
}

impl Iterator for Listing {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Listing {}

/// Get / set / list of items.
#[derive(Debug, Clone)]
pub struct ValueStore {
    storage: Arc<Storage>,
}

impl ValueStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Write `value` under `key`, replacing any previous value.
    #[instrument(skip(self, value), fields(value_len = value.len()))]
    pub fn set_value(&self, token: &Token, bucket: &BucketId, key: &ItemKey, value: &[u8]) -> Result<()> {
        let composed = keys::item_key(token, bucket, key);
        self.storage.write(|txn| txn.put(composed.as_bytes(), value))?;

        metrics::counter!("kvbucket_values_written_total").increment(1);
        debug!("Stored value");
        Ok(())
    }

    /// Read the value stored under `key`. `None` means the key was never set.
    #[instrument(skip(self))]
    pub fn get_value(&self, token: &Token, bucket: &BucketId, key: &ItemKey) -> Result<Option<Bytes>> {
        let composed = keys::item_key(token, bucket, key);
        let value = self.storage.read(|txn| txn.get(composed.as_bytes()))?;

        if value.is_none() {
            debug!("Value not found");
        }
        Ok(value.map(Bytes::from))
    }

    /// All items of a bucket with their values, in ascending key order.
    #[instrument(skip(self))]
    pub fn list_values(&self, token: &Token, bucket: &BucketId) -> Result<Listing> {
        let prefix = keys::bucket_scan_prefix(token, bucket);

        let entries = self.storage.read(|txn| {
            let mut entries = Vec::new();
            txn.scan_prefix(prefix.as_bytes(), &mut |key, value| {
                if let Some(suffix) = keys::strip_prefix(&prefix, key) {
                    entries.push(Entry {
                        key: keys::decode_suffix(suffix)?,
                        value: Bytes::copy_from_slice(value),
                    });
                }
                Ok(())
            })?;
            Ok(entries)
        })?;

        debug!(count = entries.len(), "Listed bucket");
        Ok(Listing {
            entries: entries.into_iter(),
        })
    }

    /// Identifiers of every bucket created under `token`, in ascending order.
    ///
    /// Only bucket markers are returned; item entries sharing the token
    /// prefix are skipped.
    #[instrument(skip(self))]
    pub fn list_buckets(&self, token: &Token) -> Result<Vec<BucketId>> {
        let prefix = keys::token_scan_prefix(token);

        self.storage.read(|txn| {
            let mut buckets = Vec::new();
            txn.scan_prefix(prefix.as_bytes(), &mut |key, _value| {
                match keys::strip_prefix(&prefix, key) {
                    Some(suffix) if keys::is_marker_suffix(suffix) => {
                        buckets.push(BucketId::parse(&keys::decode_suffix(suffix)?)?);
                    }
                    _ => {}
                }
                Ok(())
            })?;
            Ok(buckets)
        })
    }
}
