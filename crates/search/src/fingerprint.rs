//! Content-addressable segment fingerprinting.
//!
//! `segment_id = SHA256(version_tag || canonical_schema_json || sum of
//! sorted(doc_key, SHA256(canonical_record_json)))`. Given identical schema
//! and identical canonicalized document records, two builds must produce a
//! byte-identical fingerprint regardless of discovery order.

use sha2::{Digest, Sha256};

use crate::knobs::SEGMENT_FORMAT_VERSION;
use crate::schema::Schema;

/// A document record in the canonical shape that gets hashed into the
/// fingerprint. Only the fields that affect the index contribute; anything
/// purely cosmetic (e.g. a re-fetch timestamp bump with no content change)
/// should be excluded by the caller before calling [`fingerprint`].
pub struct CanonicalRecord<'a> {
    pub doc_key: &'a str,
    pub canonical_json: &'a str,
}

/// Computes the segment fingerprint over a schema and an unordered set of
/// document records. The records are sorted by `doc_key` internally, so
/// callers may pass them in any discovery order.
pub fn fingerprint(schema: &Schema, records: &[CanonicalRecord<'_>]) -> crate::error::Result<String> {
    if records.is_empty() {
        return Ok(String::new());
    }

    let schema_json = schema.to_canonical_json()?;

    let mut sorted: Vec<&CanonicalRecord<'_>> = records.iter().collect();
    sorted.sort_by(|a, b| a.doc_key.cmp(b.doc_key));

    let mut hasher = Sha256::new();
    hasher.update(SEGMENT_FORMAT_VERSION.to_be_bytes());
    hasher.update(schema_json.as_bytes());

    for record in sorted {
        let mut record_hasher = Sha256::new();
        record_hasher.update(record.canonical_json.as_bytes());
        let record_digest = record_hasher.finalize();

        hasher.update(record.doc_key.as_bytes());
        hasher.update(record_digest);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Derives the document key for a URL: the first 64 hex chars of a SHA-256
/// digest over a canonicalized URL. Since SHA-256 digests are already 64 hex
/// chars, this is the whole digest.
pub fn document_key(canonical_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Tiny hex-encoding helper so the crate doesn't need a dedicated `hex`
/// dependency for what's otherwise a one-line job.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(bytes.as_ref().len() * 2);
        for byte in bytes.as_ref() {
            write!(out, "{byte:02x}").expect("writing to a String never fails");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_corpus_has_empty_fingerprint() {
        let schema = Schema::documentation();
        let fp = fingerprint(&schema, &[]).unwrap();
        assert!(fp.is_empty());
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let schema = Schema::documentation();
        let records = vec![
            CanonicalRecord { doc_key: "b", canonical_json: "{\"url\":\"b\"}" },
            CanonicalRecord { doc_key: "a", canonical_json: "{\"url\":\"a\"}" },
        ];
        let reversed = vec![
            CanonicalRecord { doc_key: "a", canonical_json: "{\"url\":\"a\"}" },
            CanonicalRecord { doc_key: "b", canonical_json: "{\"url\":\"b\"}" },
        ];
        assert_eq!(
            fingerprint(&schema, &records).unwrap(),
            fingerprint(&schema, &reversed).unwrap()
        );
    }

    #[test]
    fn fingerprint_changes_with_document_content() {
        let schema = Schema::documentation();
        let records_a = vec![CanonicalRecord { doc_key: "a", canonical_json: "{\"body\":\"one\"}" }];
        let records_b = vec![CanonicalRecord { doc_key: "a", canonical_json: "{\"body\":\"two\"}" }];
        assert_ne!(
            fingerprint(&schema, &records_a).unwrap(),
            fingerprint(&schema, &records_b).unwrap()
        );
    }

    #[test]
    fn document_key_is_sha256_hex() {
        let key = document_key("https://ex.com/a");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
