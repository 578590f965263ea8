//! Response snapshot storage and request matching.
//!
//! An entry is keyed by [`compute_cache_key`] (method + URL). When the stored
//! response carries a `Vary` header, the values of the varied request headers
//! are recorded with the entry and must match on lookup.

use std::collections::BTreeMap;

use super::buckets::ensure_bucket;
use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::{Error, Request, Response, ResponseType};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

type VaryValues = BTreeMap<String, Option<String>>;

/// A stored entry as read back from the database.
struct EntryRow {
    id: i64,
    vary: VaryValues,
    response: Response,
}

impl EntryRow {
    fn matches(&self, request: &Request) -> bool {
        self.vary
            .iter()
            .all(|(name, value)| request.header(name) == value.as_deref())
    }
}

fn vary_values(request: &Request, response: &Response) -> Result<VaryValues, Error> {
    let names = response.vary();
    if names.iter().any(|n| n == "*") {
        return Err(Error::InvalidInput("responses with Vary: * cannot be stored".into()));
    }
    Ok(names
        .into_iter()
        .map(|name| {
            let value = request.header(&name).map(str::to_string);
            (name, value)
        })
        .collect())
}

/// Candidate rows for `key`, optionally restricted to one bucket, in bucket creation order.
fn candidates(conn: &rusqlite::Connection, key: &str, bucket: Option<&str>) -> Result<Vec<EntryRow>, Error> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.vary_json, e.response_url, e.status, e.status_text,
                e.response_type, e.headers_json, e.body
         FROM entries e JOIN buckets b ON b.id = e.bucket_id
         WHERE e.request_key = ?1 AND (?2 IS NULL OR b.name = ?2)
         ORDER BY b.id ASC, e.id ASC",
    )?;

    let raw = stmt
        .query_map(params![key, bucket], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u16>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Vec<u8>>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, vary_json, url, status, status_text, ty, headers_json, body)| {
            let response_type =
                ResponseType::parse(&ty).ok_or_else(|| Error::CorruptEntry(format!("response type {ty}")))?;
            Ok(EntryRow {
                id,
                vary: serde_json::from_str(&vary_json)?,
                response: Response {
                    url,
                    status,
                    status_text,
                    response_type,
                    headers: serde_json::from_str(&headers_json)?,
                    body: Bytes::from(body),
                },
            })
        })
        .collect()
}

/// Replace every entry in the bucket matched by `request`, then insert the new snapshot.
fn put_entry(
    conn: &rusqlite::Connection, bucket: &str, bucket_id: i64, request: &Request, response: &Response,
) -> Result<(), Error> {
    if !request.is_get() {
        return Err(Error::UnsupportedMethod(request.method.clone()));
    }
    let vary = vary_values(request, response)?;
    let key = compute_cache_key(&request.method, &request.url);

    for row in candidates(conn, &key, Some(bucket))? {
        if row.matches(request) {
            conn.execute("DELETE FROM entries WHERE id = ?1", params![row.id])?;
        }
    }

    conn.execute(
        "INSERT INTO entries (
            bucket_id, request_key, request_url, vary_json, response_url, status,
            status_text, response_type, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            bucket_id,
            &key,
            request.url.as_str(),
            serde_json::to_string(&vary)?,
            &response.url,
            response.status,
            &response.status_text,
            response.response_type.as_str(),
            serde_json::to_string(&response.headers)?,
            response.body.as_ref(),
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Find the first stored response matching `request`.
    ///
    /// With `bucket = None` every bucket is searched in creation order.
    /// Non-GET requests never match.
    pub async fn match_request(&self, bucket: Option<&str>, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        let key = compute_cache_key(&request.method, &request.url);
        let bucket = bucket.map(str::to_string);
        let request = request.clone();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let found = candidates(conn, &key, bucket.as_deref())?
                    .into_iter()
                    .find(|row| row.matches(&request))
                    .map(|row| row.response);
                Ok(found)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a snapshot, creating the bucket if needed. Last write wins.
    pub async fn put_entry(&self, bucket: &str, request: &Request, response: &Response) -> Result<(), Error> {
        self.put_entries(bucket, vec![(request.clone(), response.clone())]).await
    }

    /// Store several snapshots in one transaction; either all are written or none.
    pub async fn put_entries(&self, bucket: &str, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let bucket_id = ensure_bucket(&tx, &bucket)?;
                for (request, response) in &entries {
                    put_entry(&tx, &bucket, bucket_id, request, response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Request URLs stored in `bucket`, in insertion order.
    pub async fn request_urls(&self, bucket: &str) -> Result<Vec<String>, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.request_url FROM entries e JOIN buckets b ON b.id = e.bucket_id
                     WHERE b.name = ?1 ORDER BY e.id ASC",
                )?;
                let urls = stmt
                    .query_map(params![bucket], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_request(url: &str) -> Request {
        Request::parse(url).unwrap().with_header("accept", "text/html")
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = Request::parse("https://app.test/app.js").unwrap();
        let resp = Response::new("https://app.test/app.js", 200, "console.log(1)")
            .with_header("content-type", "text/javascript");

        db.put_entry("runtime-v1", &req, &resp).await.unwrap();

        let found = db.match_request(None, &req).await.unwrap().unwrap();
        assert_eq!(found, resp);
        let scoped = db.match_request(Some("runtime-v1"), &req).await.unwrap();
        assert!(scoped.is_some());
        let other = db.match_request(Some("static-v1"), &req).await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_match_ignores_headers_without_vary() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stored = Request::parse("https://app.test/index.html").unwrap();
        db.put_entry("static-v1", &stored, &Response::new("https://app.test/index.html", 200, "<html>"))
            .await
            .unwrap();

        let found = db.match_request(None, &html_request("https://app.test/index.html")).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_match_respects_vary() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = html_request("https://app.test/page");
        let resp = Response::new("https://app.test/page", 200, "<html>").with_header("vary", "Accept");
        db.put_entry("runtime-v1", &req, &resp).await.unwrap();

        assert!(db.match_request(None, &req).await.unwrap().is_some());
        let json = Request::parse("https://app.test/page").unwrap().with_header("accept", "application/json");
        assert!(db.match_request(None, &json).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_matching_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = Request::parse("https://app.test/app.js").unwrap();
        db.put_entry("runtime-v1", &req, &Response::new("", 200, "v1")).await.unwrap();
        db.put_entry("runtime-v1", &req, &Response::new("", 200, "v2")).await.unwrap();

        let found = db.match_request(None, &req).await.unwrap().unwrap();
        assert_eq!(&found.body[..], b"v2");
        assert_eq!(db.request_urls("runtime-v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_match_searches_buckets_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = Request::parse("https://app.test/logo.svg").unwrap();
        db.put_entry("static-v1", &req, &Response::new("", 200, "static")).await.unwrap();
        db.put_entry("runtime-v1", &req, &Response::new("", 200, "runtime")).await.unwrap();

        let found = db.match_request(None, &req).await.unwrap().unwrap();
        assert_eq!(&found.body[..], b"static");
    }

    #[tokio::test]
    async fn test_non_get_rejected_and_never_matched() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let post = Request::parse("https://app.test/api").unwrap().with_method("post");
        let result = db.put_entry("runtime-v1", &post, &Response::new("", 200, "")).await;
        assert!(matches!(result, Err(Error::UnsupportedMethod(_))));
        assert!(db.match_request(None, &post).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_entries_is_atomic() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entries = vec![
            (Request::parse("https://app.test/").unwrap(), Response::new("", 200, "root")),
            (Request::parse("https://app.test/x").unwrap().with_method("PUT"), Response::new("", 200, "x")),
        ];
        assert!(db.put_entries("static-v1", entries).await.is_err());
        assert!(db.request_urls("static-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_bucket_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = Request::parse("https://app.test/old.css").unwrap();
        db.put_entry("static-v0", &req, &Response::new("", 200, "old")).await.unwrap();
        db.delete_bucket("static-v0").await.unwrap();
        assert!(db.match_request(None, &req).await.unwrap().is_none());
    }
}
