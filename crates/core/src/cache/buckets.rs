//! Bucket operations: open, enumerate, delete.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use tokio_rusqlite::params;

/// Create `name` if it does not exist and return its row id.
pub(crate) fn ensure_bucket(conn: &rusqlite::Connection, name: &str) -> Result<i64, Error> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("bucket name must not be empty".into()));
    }
    conn.execute(
        "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    let id = conn.query_row("SELECT id FROM buckets WHERE name = ?1", params![name], |row| row.get(0))?;
    Ok(id)
}

impl CacheDb {
    /// Open a bucket, creating it if absent.
    pub async fn open_bucket(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_bucket(conn, &name)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn
                    .query_row("SELECT 1 FROM buckets WHERE name = ?1", params![name], |_| Ok(()))
                    .optional()?
                    .is_some();
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Bucket names in creation order.
    pub async fn bucket_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a bucket and every entry in it.
    ///
    /// Returns false if no bucket had that name.
    pub async fn delete_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_bucket("static-v1").await.unwrap();
        db.open_bucket("static-v1").await.unwrap();
        assert_eq!(db.bucket_names().await.unwrap(), vec!["static-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_names_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["runtime-v1", "static-v1", "old-v0"] {
            db.open_bucket(name).await.unwrap();
        }
        assert_eq!(db.bucket_names().await.unwrap(), vec!["runtime-v1", "static-v1", "old-v0"]);
    }

    #[tokio::test]
    async fn test_delete_bucket() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_bucket("old-v0").await.unwrap();

        assert!(db.has_bucket("old-v0").await.unwrap());
        assert!(db.delete_bucket("old-v0").await.unwrap());
        assert!(!db.has_bucket("old-v0").await.unwrap());
        assert!(!db.delete_bucket("old-v0").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.open_bucket(" ").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
