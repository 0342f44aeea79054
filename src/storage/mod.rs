//! Storage layer
//!
//! # Architecture
//!
//! The service consumes an ordered key-value engine through a small
//! capability interface:
//!
//! ```text
//! Storage (typed helpers: read / write / get / put / scan_prefix)
//!   └─→ dyn StorageEngine
//!        ├─→ read_txn   (snapshot, ReadTxn: get + scan_prefix)
//!        └─→ write_txn  (atomic, WriteTxn: get + scan_prefix + put)
//! ```
//!
//! ## Implementations
//!
//! - **redb** ([`RedbStorage`]) - on-disk or in-memory, the default engine
//! - **Mock** ([`MockStorage`]) - `BTreeMap` behind a lock, with failure injection

pub mod engine;
pub mod mock;
pub mod redb_storage;

// Default storage engine
pub use redb_storage::RedbStorage as DefaultStorageEngine;

pub use engine::{ReadTxn, Storage, StorageEngine, WriteTxn};
pub use mock::MockStorage;
pub use redb_storage::RedbStorage;
