//! Process-wide tunables for the search core. Every knob here is read once
//! from the environment via [`cmd_util::env::env_config`] and cached for the
//! life of the process.

use std::sync::LazyLock;

use cmd_util::env::env_config;

/// Maximum number of segments retained per tenant after a publish.
pub static MAX_SEGMENTS: LazyLock<usize> =
    LazyLock::new(|| env_config("SEARCH_MAX_SEGMENTS", 32usize));

/// Target false-positive rate for the bloom filter built during indexing.
pub static BLOOM_FALSE_POSITIVE_RATE: LazyLock<f64> =
    LazyLock::new(|| env_config("SEARCH_BLOOM_FALSE_POSITIVE_RATE", 0.01f64));

/// Size in bits of one on-disk bloom block (default: 4 KiB).
pub static BLOOM_BLOCK_BITS: LazyLock<u64> =
    LazyLock::new(|| env_config("SEARCH_BLOOM_BLOCK_BITS", 32_768u64));

/// BM25 term-frequency saturation constant.
pub static BM25_K1: LazyLock<f64> = LazyLock::new(|| env_config("SEARCH_BM25_K1", 1.2f64));

/// BM25 length-normalization constant.
pub static BM25_B: LazyLock<f64> = LazyLock::new(|| env_config("SEARCH_BM25_B", 0.75f64));

/// Default `max_results` when a query doesn't specify one.
pub static DEFAULT_MAX_RESULTS: LazyLock<usize> =
    LazyLock::new(|| env_config("SEARCH_DEFAULT_MAX_RESULTS", 10usize));

/// Hard cap on `max_results`, regardless of what a caller requests.
pub static MAX_MAX_RESULTS: LazyLock<usize> =
    LazyLock::new(|| env_config("SEARCH_MAX_MAX_RESULTS", 50usize));

/// Width in characters of a generated snippet window.
pub static SNIPPET_WINDOW_CHARS: LazyLock<usize> =
    LazyLock::new(|| env_config("SEARCH_SNIPPET_WINDOW_CHARS", 200usize));

/// Soft per-query deadline.
pub static QUERY_TIMEOUT_MS: LazyLock<u64> =
    LazyLock::new(|| env_config("SEARCH_QUERY_TIMEOUT_MS", 5_000u64));

/// How often the coordinator polls a tenant's manifest for changes.
pub static MANIFEST_POLL_INTERVAL_MS: LazyLock<u64> =
    LazyLock::new(|| env_config("SEARCH_MANIFEST_POLL_INTERVAL_MS", 5_000u64));

/// Flat bonus added to a document's score when all query terms appear in
/// order within `PHRASE_WINDOW` token positions of one another in a field.
pub static PHRASE_BONUS: LazyLock<f64> = LazyLock::new(|| env_config("SEARCH_PHRASE_BONUS", 0.5f64));

/// Maximum token-position span within which a phrase match is recognized.
pub static PHRASE_WINDOW: LazyLock<u32> =
    LazyLock::new(|| env_config("SEARCH_PHRASE_WINDOW", 8u32));

/// Current on-disk segment format version. Segments built with a different
/// version are treated as requiring a reindex.
pub const SEGMENT_FORMAT_VERSION: u32 = 1;

/// Stored-field allow-list and per-field truncation caps, carried over from
/// the original storage layer unchanged.
pub const STORED_FIELD_ALLOWLIST: &[&str] = &["url", "title", "body", "path", "excerpt", "language"];

pub fn stored_field_char_limit(field_name: &str) -> Option<usize> {
    match field_name {
        "body" => Some(4096),
        "excerpt" => Some(640),
        "title" => Some(512),
        "path" => Some(512),
        "url" => Some(2048),
        _ => None,
    }
}
