//! The SQLite-backed segment artifact: the on-disk format behind
//! [`crate::store::SegmentStore`].
//!
//! Schema (part of the external contract, see spec §6.5):
//! - `metadata(key TEXT PRIMARY KEY, value TEXT)`
//! - `documents(doc_id TEXT PRIMARY KEY, <stored field columns>)`
//! - `postings(field, term, doc_id, tf, doc_length, positions_blob)`,
//!   indexed on `(field, term)`
//! - `bloom_blocks(block_index INTEGER PRIMARY KEY, bits BLOB)`

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::bloom::BloomParams;
use crate::error::{Result, SearchError};
use crate::schema::Schema;

pub const DOCUMENT_COLUMNS: &[&str] = &[
    "url",
    "title",
    "body",
    "excerpt",
    "headings_h1",
    "headings_h2",
    "headings_h3_plus",
    "url_path",
    "path",
    "tags",
    "language",
    "timestamp",
];

const SCHEMA_SQL: &str = "
CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL);
CREATE TABLE documents (
    doc_id TEXT PRIMARY KEY,
    url TEXT,
    title TEXT,
    body TEXT,
    excerpt TEXT,
    headings_h1 TEXT,
    headings_h2 TEXT,
    headings_h3_plus TEXT,
    url_path TEXT,
    path TEXT,
    tags TEXT,
    language TEXT,
    timestamp INTEGER
);
CREATE TABLE postings (
    field TEXT NOT NULL,
    term TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    tf INTEGER NOT NULL,
    doc_length INTEGER NOT NULL,
    positions_blob BLOB NOT NULL
);
CREATE INDEX postings_field_term ON postings(field, term);
CREATE TABLE bloom_blocks (block_index INTEGER PRIMARY KEY, bits BLOB NOT NULL);
";

/// One document's stored-field projection, keyed by the same column names
/// as `DOCUMENT_COLUMNS`. Absent/empty fields are simply not inserted.
#[derive(Debug, Default, Clone)]
pub struct StoredDocument {
    pub doc_id: String,
    pub fields: HashMap<&'static str, String>,
    pub timestamp: Option<i64>,
}

/// One posting row ready for insertion: `(field, term, doc_id, tf,
/// doc_length, positions)`.
pub struct PostingRow<'a> {
    pub field: &'a str,
    pub term: &'a str,
    pub doc_id: &'a str,
    pub doc_length: u32,
    pub positions: &'a [u32],
}

pub struct SegmentWriteParams<'a> {
    pub schema: &'a Schema,
    pub bloom_params: BloomParams,
    pub doc_count: u64,
    pub field_total_terms: &'a HashMap<String, u64>,
}

/// Creates a brand-new segment artifact at `path` (must not already exist)
/// and populates all four tables inside one transaction.
pub fn create_segment(
    path: &Path,
    params: &SegmentWriteParams<'_>,
    documents: &[StoredDocument],
    postings: &[PostingRow<'_>],
    bloom_blocks: &[(u64, Vec<u8>)],
) -> Result<()> {
    let mut conn = Connection::open(path)
        .map_err(|e| SearchError::storage(format!("failed to create segment database: {e}")))?;
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| SearchError::storage(format!("failed to initialize segment schema: {e}")))?;

    let tx = conn
        .transaction()
        .map_err(|e| SearchError::storage(format!("failed to start segment write transaction: {e}")))?;

    {
        let schema_json = params.schema.to_canonical_json()?;
        let mut insert_meta = tx
            .prepare_cached("INSERT INTO metadata (key, value) VALUES (?1, ?2)")
            .map_err(|e| SearchError::storage(e.to_string()))?;
        let mut put = |key: &str, value: String| -> Result<()> {
            insert_meta
                .execute(params![key, value])
                .map_err(|e| SearchError::storage(e.to_string()))?;
            Ok(())
        };
        put("schema", schema_json)?;
        put("doc_count", params.doc_count.to_string())?;
        put("bloom_bit_size", params.bloom_params.bit_size.to_string())?;
        put("bloom_hash_count", params.bloom_params.hash_count.to_string())?;
        put("bloom_block_bits", params.bloom_params.block_bits.to_string())?;
        put(
            "segment_format_version",
            crate::knobs::SEGMENT_FORMAT_VERSION.to_string(),
        )?;
        for (field, total) in params.field_total_terms {
            put(&format!("{field}_total_terms"), total.to_string())?;
        }
    }

    {
        let column_list = DOCUMENT_COLUMNS.join(", ");
        let placeholders = (1..=DOCUMENT_COLUMNS.len() + 1)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO documents (doc_id, {column_list}) VALUES ({placeholders})");
        let mut insert_doc = tx.prepare_cached(&sql).map_err(|e| SearchError::storage(e.to_string()))?;
        for doc in documents {
            let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::with_capacity(DOCUMENT_COLUMNS.len() + 1);
            bound.push(Box::new(doc.doc_id.clone()));
            for column in DOCUMENT_COLUMNS {
                if *column == "timestamp" {
                    bound.push(Box::new(doc.timestamp));
                } else {
                    bound.push(Box::new(doc.fields.get(column).cloned()));
                }
            }
            let refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
            insert_doc
                .execute(refs.as_slice())
                .map_err(|e| SearchError::storage(format!("failed to insert document: {e}")))?;
        }
    }

    {
        let mut insert_posting = tx
            .prepare_cached(
                "INSERT INTO postings (field, term, doc_id, tf, doc_length, positions_blob) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(|e| SearchError::storage(e.to_string()))?;
        for posting in postings {
            let blob = encode_positions(posting.positions);
            insert_posting
                .execute(params![
                    posting.field,
                    posting.term,
                    posting.doc_id,
                    posting.positions.len() as i64,
                    posting.doc_length,
                    blob,
                ])
                .map_err(|e| SearchError::storage(format!("failed to insert posting: {e}")))?;
        }
    }

    {
        let mut insert_block = tx
            .prepare_cached("INSERT INTO bloom_blocks (block_index, bits) VALUES (?1, ?2)")
            .map_err(|e| SearchError::storage(e.to_string()))?;
        for (index, bits) in bloom_blocks {
            insert_block
                .execute(params![*index as i64, bits])
                .map_err(|e| SearchError::storage(format!("failed to insert bloom block: {e}")))?;
        }
    }

    tx.commit()
        .map_err(|e| SearchError::storage(format!("failed to commit segment write: {e}")))?;
    Ok(())
}

/// A read-only handle onto one segment artifact. Cheap to open per task;
/// segments are immutable so there is no writer-reader contention to manage.
pub struct SegmentReader {
    conn: Connection,
}

impl SegmentReader {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| SearchError::storage(format!("failed to open segment {}: {e}", path.display())))?;
        Ok(SegmentReader { conn })
    }

    fn metadata_str(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(|e| SearchError::storage(e.to_string()))
    }

    fn metadata_u64(&self, key: &str) -> Result<Option<u64>> {
        Ok(match self.metadata_str(key)? {
            Some(s) => Some(
                s.parse()
                    .map_err(|_| SearchError::index_version(format!("metadata key {key} is not a valid integer")))?,
            ),
            None => None,
        })
    }

    /// Loads the bloom parameters and corpus stats required before scoring.
    /// Per spec §7, missing keys mean the segment needs reindexing, not a
    /// silent fallback.
    pub fn corpus_stats(&self) -> Result<CorpusStats> {
        let doc_count = self
            .metadata_u64("doc_count")?
            .ok_or_else(|| SearchError::index_version("segment missing doc_count"))?;
        let bit_size = self
            .metadata_u64("bloom_bit_size")?
            .ok_or_else(|| SearchError::index_version("segment missing bloom_bit_size"))?;
        let hash_count = self
            .metadata_u64("bloom_hash_count")?
            .ok_or_else(|| SearchError::index_version("segment missing bloom_hash_count"))?;
        let block_bits = self
            .metadata_u64("bloom_block_bits")?
            .ok_or_else(|| SearchError::index_version("segment missing bloom_block_bits"))?;
        let format_version = self
            .metadata_u64("segment_format_version")?
            .ok_or_else(|| SearchError::index_version("segment missing segment_format_version"))?;
        if format_version != crate::knobs::SEGMENT_FORMAT_VERSION as u64 {
            return Err(SearchError::index_version(format!(
                "unknown segment_format_version {format_version}"
            )));
        }

        Ok(CorpusStats {
            doc_count,
            bloom: BloomParams {
                bit_size,
                hash_count: hash_count as u32,
                block_bits,
            },
        })
    }

    pub fn field_total_terms(&self, field: &str) -> Result<Option<u64>> {
        self.metadata_u64(&format!("{field}_total_terms"))
    }

    pub fn schema(&self) -> Result<Schema> {
        let json = self
            .metadata_str("schema")?
            .ok_or_else(|| SearchError::index_version("segment missing schema metadata"))?;
        Schema::from_canonical_json(&json)
    }

    pub fn bloom_blocks(&self, block_indices: &[u64]) -> Result<HashMap<u64, Vec<u8>>> {
        if block_indices.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = (0..block_indices.len()).map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT block_index, bits FROM bloom_blocks WHERE block_index IN ({placeholders})");
        let mut stmt = self.conn.prepare(&sql).map_err(|e| SearchError::storage(e.to_string()))?;
        let bound: Vec<i64> = block_indices.iter().map(|&b| b as i64).collect();
        let refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(refs.as_slice(), |row| {
                Ok((row.get::<_, i64>(0)? as u64, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(|e| SearchError::storage(e.to_string()))?;
        let mut out = HashMap::new();
        for row in rows {
            let (index, bits) = row.map_err(|e| SearchError::storage(e.to_string()))?;
            out.insert(index, bits);
        }
        Ok(out)
    }

    pub fn postings(&self, field: &str, term: &str) -> Result<Vec<PostingEntry>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT doc_id, tf, doc_length, positions_blob FROM postings WHERE field = ?1 AND term = ?2")
            .map_err(|e| SearchError::storage(e.to_string()))?;
        let rows = stmt
            .query_map(params![field, term], |row| {
                Ok(PostingEntry {
                    doc_id: row.get(0)?,
                    tf: row.get::<_, i64>(1)? as u32,
                    doc_length: row.get::<_, i64>(2)? as u32,
                    positions: decode_positions(&row.get::<_, Vec<u8>>(3)?),
                })
            })
            .map_err(|e| SearchError::storage(e.to_string()))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SearchError::storage(e.to_string()))
    }

    pub fn document(&self, doc_id: &str) -> Result<Option<HashMap<String, String>>> {
        let column_list = DOCUMENT_COLUMNS.join(", ");
        let sql = format!("SELECT {column_list} FROM documents WHERE doc_id = ?1");
        self.conn
            .query_row(&sql, params![doc_id], |row| Ok(row_to_fields(row)))
            .optional()
            .map_err(|e| SearchError::storage(e.to_string()))
    }

    pub fn documents(&self, doc_ids: &[String]) -> Result<HashMap<String, HashMap<String, String>>> {
        if doc_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let column_list = DOCUMENT_COLUMNS.join(", ");
        let placeholders = (0..doc_ids.len()).map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT doc_id, {column_list} FROM documents WHERE doc_id IN ({placeholders})");
        let mut stmt = self.conn.prepare(&sql).map_err(|e| SearchError::storage(e.to_string()))?;
        let refs: Vec<&dyn rusqlite::ToSql> = doc_ids.iter().map(|d| d as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(refs.as_slice(), |row| {
                let doc_id: String = row.get(0)?;
                Ok((doc_id, row_to_fields_offset(row, 1)))
            })
            .map_err(|e| SearchError::storage(e.to_string()))?;
        let mut out = HashMap::new();
        for row in rows {
            let (doc_id, fields) = row.map_err(|e| SearchError::storage(e.to_string()))?;
            out.insert(doc_id, fields);
        }
        Ok(out)
    }
}

pub struct CorpusStats {
    pub doc_count: u64,
    pub bloom: BloomParams,
}

pub struct PostingEntry {
    pub doc_id: String,
    pub tf: u32,
    pub doc_length: u32,
    pub positions: Vec<u32>,
}

fn row_to_fields(row: &rusqlite::Row<'_>) -> HashMap<String, String> {
    row_to_fields_offset(row, 0)
}

fn row_to_fields_offset(row: &rusqlite::Row<'_>, offset: usize) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for (i, column) in DOCUMENT_COLUMNS.iter().enumerate() {
        let value: Option<String> = row.get(i + offset).unwrap_or(None);
        if let Some(v) = value {
            if !v.is_empty() {
                fields.insert((*column).to_string(), v);
            }
        }
    }
    fields
}

fn encode_positions(positions: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(positions.len() * 4);
    for p in positions {
        bytes.extend_from_slice(&p.to_be_bytes());
    }
    bytes
}

fn decode_positions(blob: &[u8]) -> Vec<u32> {
    blob.chunks_exact(4)
        .map(|c| u32::from_be_bytes(c.try_into().expect("chunks_exact(4) yields 4 bytes")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::{BloomBuilder, BloomParams};
    use std::collections::HashMap as Map;

    #[test]
    fn round_trips_a_minimal_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg.sqlite3");
        let schema = Schema::documentation();
        let bloom_params = BloomParams::for_expected_items(1, 0.01, 512);
        let mut bloom = BloomBuilder::new(bloom_params);
        bloom.insert("install");

        let mut fields = Map::new();
        fields.insert("url", "https://ex.com/install".to_string());
        fields.insert("title", "Installation".to_string());
        fields.insert("body", "Install with pip install pkg".to_string());
        let doc = StoredDocument {
            doc_id: "docid1".to_string(),
            fields,
            timestamp: Some(1000),
        };

        let mut totals = Map::new();
        totals.insert("body".to_string(), 5u64);

        let write_params = SegmentWriteParams {
            schema: &schema,
            bloom_params,
            doc_count: 1,
            field_total_terms: &totals,
        };

        let postings = vec![PostingRow {
            field: "body",
            term: "install",
            doc_id: "docid1",
            doc_length: 5,
            positions: &[1, 3],
        }];

        create_segment(&path, &write_params, &[doc], &postings, &bloom.into_blocks()).unwrap();

        let reader = SegmentReader::open(&path).unwrap();
        let stats = reader.corpus_stats().unwrap();
        assert_eq!(stats.doc_count, 1);
        assert_eq!(stats.bloom, bloom_params);

        let fetched = reader.document("docid1").unwrap().unwrap();
        assert_eq!(fetched.get("title").unwrap(), "Installation");

        let entries = reader.postings("body", "install").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].positions, vec![1, 3]);
        assert_eq!(entries[0].tf, 2);
    }
}
