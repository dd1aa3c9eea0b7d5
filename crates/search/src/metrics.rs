//! Prometheus metrics for the search core: build duration, query latency,
//! and bloom-filter skip effectiveness.

use std::sync::LazyLock;

use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};

pub static SEGMENT_BUILD_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("search_segment_build_seconds", "Duration of a full segment build").expect("metric registration")
});

pub static SEGMENT_BUILD_DOCUMENTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("search_segment_build_documents_total", "Documents successfully indexed into a segment")
        .expect("metric registration")
});

pub static SEGMENT_BUILD_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("search_segment_build_errors_total", "Per-document errors encountered during a segment build")
        .expect("metric registration")
});

pub static QUERY_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("search_query_seconds", "Duration of a single query against a resident segment")
        .expect("metric registration")
});

pub static QUERY_TIMEOUTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("search_query_timeouts_total", "Queries that exceeded the soft deadline").expect("metric registration")
});

pub static BLOOM_TERMS_PROBED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("search_bloom_terms_probed_total", "Query terms probed against a segment's bloom filter")
        .expect("metric registration")
});

pub static BLOOM_TERMS_SKIPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "search_bloom_terms_skipped_total",
        "Query terms pruned before a postings fetch because the bloom filter proved them absent"
    )
    .expect("metric registration")
});

pub static MANIFEST_POLLS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("search_manifest_polls_total", "Manifest polls performed by tenant coordinators")
        .expect("metric registration")
});

pub static MANIFEST_SWAPS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "search_manifest_swaps_total",
        "Resident segment swaps triggered by a newer manifest pointer"
    )
    .expect("metric registration")
});

/// Call once at process startup (or lazily on first use) to ensure every
/// metric is registered even if the code path that would normally touch it
/// hasn't run yet; useful so `/metrics` never omits a known series.
pub fn register_all() {
    LazyLock::force(&SEGMENT_BUILD_SECONDS);
    LazyLock::force(&SEGMENT_BUILD_DOCUMENTS_TOTAL);
    LazyLock::force(&SEGMENT_BUILD_ERRORS_TOTAL);
    LazyLock::force(&QUERY_SECONDS);
    LazyLock::force(&QUERY_TIMEOUTS_TOTAL);
    LazyLock::force(&BLOOM_TERMS_PROBED_TOTAL);
    LazyLock::force(&BLOOM_TERMS_SKIPPED_TOTAL);
    LazyLock::force(&MANIFEST_POLLS_TOTAL);
    LazyLock::force(&MANIFEST_SWAPS_TOTAL);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_panicking() {
        register_all();
        SEGMENT_BUILD_DOCUMENTS_TOTAL.inc();
    }
}
