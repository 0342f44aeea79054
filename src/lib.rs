// kvbucket - bucketed key-value store over HTTP
// Tenants are identified by a bearer token; buckets are namespaces inside a token.

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod bucket;
pub mod config;
pub mod keys;
pub mod server;
pub mod storage;
pub mod values;

// Re-exports for convenience
pub use auth::Token;
pub use bucket::{BucketId, BucketManager};
pub use storage::{Storage, StorageEngine};
pub use values::ValueStore;

/// kvbucket error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Storage error: {0}")]
        Storage(String),

        #[error("Not found: {0}")]
        NotFound(String),

        #[error("error bucket name collision: {0}")]
        BucketCollision(String),

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Unauthorized: {0}")]
        Unauthorized(String),

        #[error("error reading body: {0}")]
        BodyRead(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Internal error: {0}")]
        Internal(String),
    }

    impl Error {
        /// True for failures raised by the storage engine itself.
        pub fn is_storage(&self) -> bool {
            matches!(self, Error::Storage(_))
        }
    }

    impl From<redb::Error> for Error {
        fn from(err: redb::Error) -> Self {
            Error::Storage(err.to_string())
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::error::Error;

    #[test]
    fn test_storage_errors_are_classified() {
        assert!(Error::Storage("disk".into()).is_storage());
        assert!(!Error::NotFound("k".into()).is_storage());
        assert_eq!(
            Error::BucketCollision("abc".into()).to_string(),
            "error bucket name collision: abc"
        );
    }
}
