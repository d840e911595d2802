//! Persistent catalog storage over the `caps` table.
//!
//! [`CatalogStore`] owns the SQLite connection. Every mutating operation marks the
//! shared [`IndexCache`] stale after it commits; nothing is rebuilt eagerly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::index::IndexCache;
use super::types::{CatalogItem, CatalogStats};
use crate::db::migrations;
use crate::embedding::codec::BYTES_PER_DIM;
use crate::error::{CapError, Result};

// Existing embeddings survive an upsert that does not supply a new one.
const UPSERT_SQL: &str = "INSERT INTO caps (id, brand, cap_type, image_ref, embedding) \
     VALUES (?1, ?2, ?3, ?4, ?5) \
     ON CONFLICT(id) DO UPDATE SET \
         brand = excluded.brand, \
         cap_type = excluded.cap_type, \
         image_ref = excluded.image_ref, \
         embedding = COALESCE(excluded.embedding, caps.embedding)";

pub struct CatalogStore {
    conn: Mutex<Connection>,
    index: Arc<IndexCache>,
}

impl CatalogStore {
    pub fn new(conn: Connection, index: Arc<IndexCache>) -> Self {
        Self {
            conn: Mutex::new(conn),
            index,
        }
    }

    pub fn index(&self) -> &Arc<IndexCache> {
        &self.index
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CapError::LockPoisoned)
    }

    /// Insert or replace the row for `item.id`.
    ///
    /// `Some(bytes)` replaces the stored embedding; `None` keeps whatever embedding the
    /// row already had (or leaves it empty for a new row).
    pub fn upsert(&self, item: &CatalogItem, embedding: Option<&[u8]>) -> Result<()> {
        {
            let conn = self.conn()?;
            conn.execute(
                UPSERT_SQL,
                params![item.id, item.brand, item.cap_type, item.image_ref, embedding],
            )?;
        }
        self.index.invalidate();
        tracing::debug!(id = item.id, with_embedding = embedding.is_some(), "upserted item");
        Ok(())
    }

    /// Upsert a batch of rows in one transaction. Invalidates the index once.
    pub fn upsert_many(&self, rows: &[(CatalogItem, Option<Vec<u8>>)]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
                for (item, embedding) in rows {
                    stmt.execute(params![
                        item.id,
                        item.brand,
                        item.cap_type,
                        item.image_ref,
                        embedding.as_deref()
                    ])?;
                }
            }
            tx.commit()?;
        }
        self.index.invalidate();
        tracing::debug!(rows = rows.len(), "upserted batch");
        Ok(rows.len())
    }

    pub fn get(&self, id: i64) -> Result<Option<CatalogItem>> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                "SELECT id, brand, cap_type, image_ref FROM caps WHERE id = ?1",
                params![id],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    /// Every item, ordered by id ascending.
    pub fn get_all(&self) -> Result<Vec<CatalogItem>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, brand, cap_type, image_ref FROM caps ORDER BY id")?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Items whose brand contains `text`, case-insensitively, ordered by id.
    ///
    /// Folding happens in Rust rather than SQLite's ASCII-only `LOWER`, so accented
    /// brands match too. Rejecting empty text is the caller's job.
    pub fn find_by_brand_substring(&self, text: &str) -> Result<Vec<CatalogItem>> {
        let needle = text.to_lowercase();
        let items = self
            .get_all()?
            .into_iter()
            .filter(|item| item.brand.to_lowercase().contains(&needle))
            .collect();
        Ok(items)
    }

    /// Items that carry an embedding, paired with the raw blob, ordered by id.
    pub fn rows_with_embeddings(&self) -> Result<Vec<(CatalogItem, Vec<u8>)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, brand, cap_type, image_ref, embedding FROM caps \
             WHERE embedding IS NOT NULL ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row_to_item(row)?, row.get::<_, Vec<u8>>(4)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Stored embedding per image ref, for rows whose blob has the expected length.
    ///
    /// When several rows share an image, the lowest id's blob wins.
    pub fn embeddings_by_image_ref(&self, dimensions: usize) -> Result<HashMap<String, Vec<u8>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT image_ref, embedding FROM caps \
             WHERE embedding IS NOT NULL AND LENGTH(embedding) = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![(dimensions * BYTES_PER_DIM) as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut by_ref = HashMap::new();
        for row in rows {
            let (image_ref, blob) = row?;
            by_ref.entry(image_ref).or_insert(blob);
        }
        Ok(by_ref)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM caps", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Row counts, treating blobs that are not `2 * dimensions` bytes as corrupt.
    pub fn stats(&self, dimensions: usize) -> Result<CatalogStats> {
        let conn = self.conn()?;
        let expected = (dimensions * BYTES_PER_DIM) as i64;
        let (total, embedded, corrupt): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), \
                    COUNT(embedding), \
                    COALESCE(SUM(embedding IS NOT NULL AND LENGTH(embedding) != ?1), 0) \
             FROM caps",
            params![expected],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(CatalogStats {
            total: total as u64,
            embedded: embedded as u64,
            missing_embedding: (total - embedded) as u64,
            corrupt_embedding: corrupt as u64,
        })
    }

    /// Delete every row. Returns the number of rows removed.
    pub fn reset(&self) -> Result<usize> {
        let removed = {
            let conn = self.conn()?;
            conn.execute("DELETE FROM caps", [])?
        };
        self.index.invalidate();
        tracing::info!(removed, "catalog reset");
        Ok(removed)
    }

    pub fn schema_version(&self) -> Result<u32> {
        Ok(migrations::get_schema_version(&*self.conn()?)?)
    }

    pub fn embedding_model(&self) -> Result<Option<String>> {
        Ok(migrations::get_embedding_model(&*self.conn()?)?)
    }

    pub fn set_embedding_model(&self, model: &str) -> Result<()> {
        Ok(migrations::set_embedding_model(&*self.conn()?, model)?)
    }
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<CatalogItem> {
    Ok(CatalogItem {
        id: row.get(0)?,
        brand: row.get(1)?,
        cap_type: row.get(2)?,
        image_ref: row.get(3)?,
    })
}
