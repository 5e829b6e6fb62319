use crate::crawler::models::ListingRecord;
use crate::errors::{CrawlResult, CrawlerError};
use crate::index::IndexSink;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Local index backed by a single SQLite table. Each document is stored as
/// JSON text under `(index_name, id)`.
pub struct SqliteIndex {
    conn: Connection,
    index: String,
}

impl SqliteIndex {
    pub fn open(path: &Path, index: &str) -> CrawlResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CrawlerError::Index(format!("Open DB failed: {e}")))?;
        Self::init(conn, index)
    }

    fn init(conn: Connection, index: &str) -> CrawlResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| CrawlerError::Index(format!("Failed to apply schema: {e}")))?;
        Ok(Self {
            conn,
            index: index.to_string(),
        })
    }

    /// Provides the connection to the closure, mapping SQLite errors.
    fn with_conn<F, T>(&self, f: F) -> CrawlResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        f(&self.conn).map_err(|e| CrawlerError::Index(e.to_string()))
    }
}

#[cfg(test)]
impl SqliteIndex {
    pub fn open_in_memory(index: &str) -> CrawlResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CrawlerError::Index(format!("Open DB failed: {e}")))?;
        Self::init(conn, index)
    }

    pub fn get(&self, id: &str) -> CrawlResult<Option<serde_json::Value>> {
        use rusqlite::OptionalExtension;

        let body: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "select body from documents where index_name = ?1 and id = ?2",
                params![self.index, id],
                |row| row.get(0),
            )
            .optional()
        })?;

        body.map(|b| serde_json::from_str(&b).map_err(|e| CrawlerError::Index(e.to_string())))
            .transpose()
    }

    pub fn count(&self) -> CrawlResult<i64> {
        self.with_conn(|conn| {
            conn.query_row(
                "select count(*) from documents where index_name = ?1",
                params![self.index],
                |row| row.get(0),
            )
        })
    }
}

impl IndexSink for SqliteIndex {
    fn upsert(&mut self, id: &str, record: &ListingRecord) -> CrawlResult<()> {
        let body = serde_json::to_string(record).map_err(|e| CrawlerError::Index(e.to_string()))?;
        let now = Utc::now().naive_utc();

        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO documents (index_name, id, body, indexed_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(index_name, id) DO UPDATE SET
                    body = excluded.body,
                    indexed_at = excluded.indexed_at
                "#,
                params![self.index, id, body, now],
            )
        })?;

        debug!(id, index = %self.index, "document indexed");
        Ok(())
    }

    fn clear(&mut self) -> CrawlResult<()> {
        let removed = self.with_conn(|conn| {
            conn.execute(
                "delete from documents where index_name = ?1",
                params![self.index],
            )
        })?;
        info!(index = %self.index, removed, "index cleared");
        Ok(())
    }
}
