//! Cache generation store.
//!
//! Named, versioned buckets of request → response snapshots persisted in
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Bucket creation, enumeration (creation order) and deletion
//! - Request matching by method + URL with `Vary` header disambiguation
//! - Atomic batch writes for pre-population
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod buckets;
pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;

use async_trait::async_trait;

pub use crate::Error;
use crate::{Request, Response};

pub use connection::CacheDb;

/// Storage capability the lifecycle manager and policy engine run against.
///
/// Writes to different keys are independent; writes to the same key are
/// last-write-wins. No cross-key transactions are offered beyond `put_all`.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open `bucket`, creating it if absent.
    async fn open(&self, bucket: &str) -> Result<(), Error>;

    /// Bucket names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete `bucket` and its entries. Returns false if it did not exist.
    async fn delete(&self, bucket: &str) -> Result<bool, Error>;

    /// Look up `request` in every bucket, oldest bucket first.
    async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error>;

    /// Look up `request` in one bucket.
    async fn match_in(&self, bucket: &str, request: &Request) -> Result<Option<Response>, Error>;

    /// Store one snapshot.
    async fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<(), Error>;

    /// Store a batch; nothing is written if any entry is rejected.
    async fn put_all(&self, bucket: &str, entries: Vec<(Request, Response)>) -> Result<(), Error>;
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, bucket: &str) -> Result<(), Error> {
        self.open_bucket(bucket).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.bucket_names().await
    }

    async fn delete(&self, bucket: &str) -> Result<bool, Error> {
        self.delete_bucket(bucket).await
    }

    async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        self.match_request(None, request).await
    }

    async fn match_in(&self, bucket: &str, request: &Request) -> Result<Option<Response>, Error> {
        self.match_request(Some(bucket), request).await
    }

    async fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<(), Error> {
        self.put_entry(bucket, request, response).await
    }

    async fn put_all(&self, bucket: &str, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        self.put_entries(bucket, entries).await
    }
}
