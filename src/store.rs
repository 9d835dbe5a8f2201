//! `TermFrequencyStore` and the concrete SQLite-backed backing store that
//! also carries the `ConceptIndex` on-disk schema — both live in the same
//! backing-store file, so one connection type owns all four tables
//! (`doc_term_freq`, `term`, `term_idf`, `term_wordmap`).

use crate::error::EsaResult;
use crate::token::WordMap;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// External ordered key-value store over `(term_id, doc_id, weight)`. Any
/// engine providing these four operations is acceptable; only
/// the SQLite-backed `SqliteBackingStore` ships here.
pub trait TermFrequencyStore {
    /// Appends one `(term_id, doc_id, weight)` row. `weight` is already
    /// `tf = 1 + ln(raw_freq)` by the time it reaches the store.
    fn insert(&self, term_id: u32, doc_id: u32, weight: f32) -> EsaResult<()>;

    /// Creates the composite index the grouped scan depends on. Must run
    /// after bulk insert and before `scan_by_term`.
    fn create_index(&self) -> EsaResult<()>;

    /// Number of distinct documents with at least one stored term.
    fn distinct_docs_count(&self) -> EsaResult<u64>;

    /// `(term_id, df)` for every term that appears in the store.
    fn doc_frequency_per_term(&self) -> EsaResult<Vec<(u32, u64)>>;

    /// Rows with `weight > min_freq`, grouped and ordered by `term_id`
    /// ascending, and within each term by `weight` descending.
    fn scan_by_term(&self, min_freq: f32) -> EsaResult<Vec<(u32, u32, f32)>>;
}

/// One SQLite file holding the full backing-store schema.
pub struct SqliteBackingStore {
    conn: Connection,
}

impl SqliteBackingStore {
    /// Opens (or creates) the backing-store file. Does not touch the
    /// schema — call `prepare_schema` for a fresh build.
    pub fn open(path: &Path) -> EsaResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Ok(Self { conn })
    }

    /// In-memory store, used by tests and by library callers that want a
    /// scratch index without touching disk.
    pub fn open_in_memory() -> EsaResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Step 1 — drop any prior build's tables and recreate the schema.
    pub fn prepare_schema(&self) -> EsaResult<()> {
        self.conn.execute_batch(
            "DROP TABLE IF EXISTS doc_term_freq;
             DROP TABLE IF EXISTS term;
             DROP TABLE IF EXISTS term_idf;
             DROP TABLE IF EXISTS term_wordmap;
             CREATE TABLE doc_term_freq (term_id INTEGER, doc_id INTEGER, freq REAL);
             CREATE TABLE term (term_id INTEGER PRIMARY KEY, term_vector BLOB);
             CREATE TABLE term_idf (term_id INTEGER PRIMARY KEY, idf REAL);
             CREATE TABLE term_wordmap (term TEXT, term_id INTEGER);",
        )?;
        Ok(())
    }

    pub fn begin(&self) -> EsaResult<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    pub fn commit(&self) -> EsaResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Writes every `(term_id, freq)` pair of one document's term-frequency
    /// counter in a single prepared-statement batch (Step 2).
    pub fn insert_document_freqs(&self, doc_id: u32, freqs: &[(u32, f32)]) -> EsaResult<()> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO doc_term_freq (term_id, doc_id, freq) VALUES (?1, ?2, ?3)")?;
        for (term_id, freq) in freqs {
            stmt.execute(params![term_id, doc_id, freq])?;
        }
        Ok(())
    }

    /// Step 3 — dump the word map as `(surface, term_id)` pairs.
    pub fn save_wordmap(&self, wordmap: &WordMap) -> EsaResult<()> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO term_wordmap (term, term_id) VALUES (?1, ?2)")?;
        for (surface, term_id) in wordmap.iter() {
            stmt.execute(params![surface, term_id])?;
        }
        Ok(())
    }

    pub fn load_wordmap(&self) -> EsaResult<WordMap> {
        let mut stmt = self
            .conn
            .prepare("SELECT term, term_id FROM term_wordmap")?;
        let pairs = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WordMap::from_pairs(pairs))
    }

    /// Step 4 — persist one `(term_id, idf)` row.
    pub fn save_idf(&self, term_id: u32, idf: f32) -> EsaResult<()> {
        self.conn.execute(
            "INSERT INTO term_idf (term_id, idf) VALUES (?1, ?2)",
            params![term_id, idf],
        )?;
        Ok(())
    }

    pub fn load_idf(&self) -> EsaResult<Vec<(u32, f32)>> {
        let mut stmt = self.conn.prepare("SELECT term_id, idf FROM term_idf")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, f32>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Step 5(d) — write the encoded sparse vector blob for one term.
    pub fn save_term_vector(&self, term_id: u32, blob: &[u8]) -> EsaResult<()> {
        self.conn.execute(
            "INSERT INTO term (term_id, term_vector) VALUES (?1, ?2)",
            params![term_id, blob],
        )?;
        Ok(())
    }

    /// Joins `term_wordmap` with `term` to produce `(surface, blob)` pairs
    /// for `ConceptIndex::load`. A word with no stored vector (every
    /// document it appeared in was truncated away) is simply absent here;
    /// the caller treats that as an empty inner map.
    pub fn load_term_vectors(&self) -> EsaResult<Vec<(String, Vec<u8>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT wm.term, fv.term_vector
             FROM term_wordmap wm
             JOIN term fv ON fv.term_id = wm.term_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `None` if the term id was truncated away entirely (no survivor row).
    pub fn load_term_vector(&self, term_id: u32) -> EsaResult<Option<Vec<u8>>> {
        let blob = self
            .conn
            .query_row(
                "SELECT term_vector FROM term WHERE term_id = ?1",
                params![term_id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(blob)
    }
}

impl TermFrequencyStore for SqliteBackingStore {
    fn insert(&self, term_id: u32, doc_id: u32, weight: f32) -> EsaResult<()> {
        self.conn.execute(
            "INSERT INTO doc_term_freq (term_id, doc_id, freq) VALUES (?1, ?2, ?3)",
            params![term_id, doc_id, weight],
        )?;
        Ok(())
    }

    fn create_index(&self) -> EsaResult<()> {
        self.conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS ndx_doc_term_freq ON doc_term_freq (term_id, freq)",
        )?;
        Ok(())
    }

    fn distinct_docs_count(&self) -> EsaResult<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT count(*) FROM (SELECT doc_id FROM doc_term_freq GROUP BY doc_id)",
            [],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    fn doc_frequency_per_term(&self) -> EsaResult<Vec<(u32, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT term_id, count(doc_id) FROM doc_term_freq GROUP BY term_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn scan_by_term(&self, min_freq: f32) -> EsaResult<Vec<(u32, u32, f32)>> {
        let mut stmt = self.conn.prepare(
            "SELECT term_id, doc_id, freq FROM doc_term_freq
             WHERE freq > ?1
             ORDER BY term_id ASC, freq DESC",
        )?;
        let rows = stmt
            .query_map(params![min_freq], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, f32>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_term_doc_pairs_are_not_produced_when_aggregated() {
        let store = SqliteBackingStore::open_in_memory().unwrap();
        store.prepare_schema().unwrap();
        // One document's counter is aggregated before insertion, so a term
        // appears at most once per document.
        store.insert_document_freqs(1, &[(7, 1.5)]).unwrap();
        store.create_index().unwrap();
        let rows = store.scan_by_term(0.0).unwrap();
        assert_eq!(rows, vec![(7, 1, 1.5)]);
    }

    #[test]
    fn scan_orders_by_term_then_descending_weight() {
        let store = SqliteBackingStore::open_in_memory().unwrap();
        store.prepare_schema().unwrap();
        store.insert(1, 10, 0.5).unwrap();
        store.insert(1, 11, 0.9).unwrap();
        store.insert(0, 20, 1.2).unwrap();
        store.create_index().unwrap();
        let rows = store.scan_by_term(0.0).unwrap();
        assert_eq!(rows, vec![(0, 20, 1.2), (1, 11, 0.9), (1, 10, 0.5)]);
    }

    #[test]
    fn min_freq_filters_rows_at_or_below_threshold() {
        let store = SqliteBackingStore::open_in_memory().unwrap();
        store.prepare_schema().unwrap();
        store.insert(1, 10, 0.1).unwrap();
        store.insert(1, 11, 5.0).unwrap();
        store.create_index().unwrap();
        let rows = store.scan_by_term(1.0).unwrap();
        assert_eq!(rows, vec![(1, 11, 5.0)]);
    }

    #[test]
    fn distinct_docs_count_and_df_per_term() {
        let store = SqliteBackingStore::open_in_memory().unwrap();
        store.prepare_schema().unwrap();
        store.insert(0, 1, 1.0).unwrap();
        store.insert(0, 2, 1.0).unwrap();
        store.insert(1, 1, 1.0).unwrap();
        assert_eq!(store.distinct_docs_count().unwrap(), 2);
        let mut df = store.doc_frequency_per_term().unwrap();
        df.sort();
        assert_eq!(df, vec![(0, 2), (1, 1)]);
    }
}
