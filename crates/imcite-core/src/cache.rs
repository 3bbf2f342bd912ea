//! SQLite query cache: a rebuildable projection of the reference log
//!
//! The cache is a local performance artifact, never authoritative. It is
//! repopulated wholesale from the ledger; a stale or missing cache is
//! repaired only by an explicit rebuild, never by silently falling back to
//! the ledger per-query.

use std::path::Path;

use imcite_domain::{join_authors, Reference};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::info;

use crate::ledger::{self, Ledger, LedgerError};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Field-restricted search targets for [`QueryCache::search_field`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Author,
}

/// SQLite-backed projection of the reference log.
pub struct QueryCache {
    conn: Connection,
}

impl QueryCache {
    /// Open (or create) a cache database at the given path.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let conn =
            Connection::open(path).map_err(|e| CacheError::Storage(format!("open: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory cache (for testing).
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CacheError::Storage(format!("open_in_memory: {}", e)))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self, CacheError> {
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS papers (
                pos INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                abstract_text TEXT,
                venue TEXT,
                year INTEGER,
                authors TEXT NOT NULL DEFAULT '',
                doi TEXT,
                payload TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_papers_doi ON papers(doi);
            ",
        )
        .map_err(|e| CacheError::Storage(format!("init_schema: {}", e)))?;
        Ok(())
    }

    /// Drop and repopulate the cache from a reference log.
    ///
    /// Deterministic and idempotent: row order is ledger order, and running
    /// it twice over the same log yields the same cache.
    pub fn rebuild_from_jsonl(&mut self, references_path: &Path) -> Result<usize, CacheError> {
        let references: Vec<Reference> = ledger::read_jsonl(references_path)?;

        let tx = self
            .conn
            .transaction()
            .map_err(|e| CacheError::Storage(format!("begin tx: {}", e)))?;
        tx.execute("DELETE FROM papers", [])
            .map_err(|e| CacheError::Storage(format!("clear: {}", e)))?;

        for (pos, reference) in references.iter().enumerate() {
            let payload = serde_json::to_string(reference)
                .map_err(|e| CacheError::Storage(format!("encode payload: {}", e)))?;
            tx.execute(
                "INSERT INTO papers (pos, id, title, abstract_text, venue, year, authors, doi, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    pos as i64,
                    reference.id,
                    reference.title,
                    reference.abstract_text,
                    reference.venue,
                    reference.year(),
                    join_authors(&reference.authors),
                    reference.normalized_doi(),
                    payload,
                ],
            )
            .map_err(|e| CacheError::Storage(format!("insert: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| CacheError::Storage(format!("commit: {}", e)))?;

        info!(count = references.len(), "rebuilt query cache");
        Ok(references.len())
    }

    /// Convenience wrapper over [`QueryCache::rebuild_from_jsonl`].
    pub fn rebuild_from_ledger(&mut self, ledger: &Ledger) -> Result<usize, CacheError> {
        self.rebuild_from_jsonl(ledger.references_path())
    }

    /// All cached records in ledger order. `limit == 0` means no limit.
    pub fn list_all(&self, limit: usize) -> Result<Vec<Reference>, CacheError> {
        self.query_references(
            "SELECT payload FROM papers ORDER BY pos LIMIT ?1",
            params![sql_limit(limit)],
        )
    }

    pub fn count(&self) -> Result<usize, CacheError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))
            .map_err(|e| CacheError::Storage(format!("count: {}", e)))?;
        Ok(count as usize)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Reference>, CacheError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM papers WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CacheError::Storage(format!("get: {}", e)))?;
        payload.map(|json| decode_payload(&json)).transpose()
    }

    /// Case-insensitive substring search over title, abstract, and authors.
    ///
    /// Results come back in ledger order; no relevance signal is defined, so
    /// ties (and everything else) are deterministic.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Reference>, CacheError> {
        let pattern = like_pattern(query);
        self.query_references(
            "SELECT payload FROM papers
             WHERE title LIKE ?1 ESCAPE '\\'
                OR abstract_text LIKE ?1 ESCAPE '\\'
                OR authors LIKE ?1 ESCAPE '\\'
             ORDER BY pos LIMIT ?2",
            params![pattern, sql_limit(limit)],
        )
    }

    /// Substring search restricted to a single field.
    pub fn search_field(
        &self,
        field: SearchField,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Reference>, CacheError> {
        let pattern = like_pattern(value);
        let sql = match field {
            SearchField::Title => {
                "SELECT payload FROM papers WHERE title LIKE ?1 ESCAPE '\\' ORDER BY pos LIMIT ?2"
            }
            SearchField::Author => {
                "SELECT payload FROM papers WHERE authors LIKE ?1 ESCAPE '\\' ORDER BY pos LIMIT ?2"
            }
        };
        self.query_references(sql, params![pattern, sql_limit(limit)])
    }

    /// Number of records whose abstract has at least `min_len` characters.
    pub fn count_with_abstract(&self, min_len: usize) -> Result<usize, CacheError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM papers
                 WHERE abstract_text IS NOT NULL AND length(abstract_text) >= ?1",
                params![min_len as i64],
                |row| row.get(0),
            )
            .map_err(|e| CacheError::Storage(format!("count_with_abstract: {}", e)))?;
        Ok(count as usize)
    }

    /// Ids of records whose abstract has at least `min_len` characters, in
    /// ledger order.
    pub fn ids_with_abstract(&self, min_len: usize) -> Result<Vec<String>, CacheError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id FROM papers
                 WHERE abstract_text IS NOT NULL AND length(abstract_text) >= ?1
                 ORDER BY pos",
            )
            .map_err(|e| CacheError::Storage(format!("prepare ids: {}", e)))?;
        let ids = stmt
            .query_map(params![min_len as i64], |row| row.get(0))
            .map_err(|e| CacheError::Storage(format!("query ids: {}", e)))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| CacheError::Storage(format!("collect ids: {}", e)))?;
        Ok(ids)
    }

    fn query_references(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Reference>, CacheError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| CacheError::Storage(format!("prepare: {}", e)))?;
        let payloads = stmt
            .query_map(params, |row| row.get::<_, String>(0))
            .map_err(|e| CacheError::Storage(format!("query: {}", e)))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| CacheError::Storage(format!("collect: {}", e)))?;
        payloads.iter().map(|json| decode_payload(json)).collect()
    }
}

fn decode_payload(json: &str) -> Result<Reference, CacheError> {
    serde_json::from_str(json).map_err(|e| CacheError::Storage(format!("parse payload: {}", e)))
}

fn sql_limit(limit: usize) -> i64 {
    if limit == 0 {
        -1
    } else {
        limit as i64
    }
}

/// Escape LIKE wildcards in user input and wrap in `%`.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
