//! End-to-end scenarios against a filesystem corpus: build a segment, then
//! query the resident reader directly.

use tenant_search::builder::SourceType;
use tenant_search::query::QueryEngine;
use tenant_search::{QuerySpec, Schema, SegmentBuilder, SegmentStore};

fn write_doc(root: &std::path::Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn build_and_open(root: &std::path::Path) -> (SegmentStore, Option<tenant_search::SegmentReader>) {
    let store = SegmentStore::open(root).unwrap();
    let builder = SegmentBuilder::new(root, Schema::documentation(), SourceType::Filesystem);
    let result = builder.build(&store, None).unwrap();
    assert!(result.errors.is_empty(), "unexpected build errors: {:?}", result.errors);
    let reader = store.latest().unwrap();
    (store, reader)
}

#[test]
fn scenario_1_basic_indexing_and_search() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(
        dir.path(),
        "install.md",
        "---\nurl: https://ex.com/install\ntitle: Installation\n---\nInstall with pip install pkg\n",
    );

    let (_store, reader) = build_and_open(dir.path());
    let reader = reader.expect("segment should be resident after a non-empty build");

    let engine = QueryEngine::new(&reader);
    let outcome = engine.search(&QuerySpec { text: "install".to_string(), ..Default::default() }).unwrap();

    assert_eq!(outcome.results.len(), 1);
    let hit = &outcome.results[0];
    assert_eq!(hit.url, "https://ex.com/install");
    assert!(hit.snippet.to_lowercase().contains("install"));
    assert!(hit.score > 0.0);
}

#[test]
fn scenario_2_synonym_expansion() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(
        dir.path(),
        "io.md",
        "---\nurl: https://ex.com/io\ntitle: IO Model\n---\nThis runtime performs asynchronous IO under the hood.\n",
    );

    let (_store, reader) = build_and_open(dir.path());
    let reader = reader.unwrap();

    let engine = QueryEngine::new(&reader);
    let outcome = engine.search(&QuerySpec { text: "async".to_string(), ..Default::default() }).unwrap();

    assert_eq!(outcome.results.len(), 1);
    let expansion_trace = outcome
        .trace
        .iter()
        .find(|t| t.stage_name == "synonym_expansion")
        .expect("synonym_expansion stage should be recorded");
    assert!(expansion_trace.query_variant.contains("async"));
    assert!(expansion_trace.query_variant.contains("asynchronous"));
}

#[test]
fn scenario_3_bloom_filter_skip() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "a.md", "---\nurl: https://ex.com/a\ntitle: A\n---\nfirst document body\n");
    write_doc(dir.path(), "b.md", "---\nurl: https://ex.com/b\ntitle: B\n---\nsecond document body\n");

    let (_store, reader) = build_and_open(dir.path());
    let reader = reader.unwrap();

    let probed_before = tenant_search::metrics::BLOOM_TERMS_PROBED_TOTAL.get();
    let skipped_before = tenant_search::metrics::BLOOM_TERMS_SKIPPED_TOTAL.get();

    let engine = QueryEngine::new(&reader);
    let outcome = engine.search(&QuerySpec { text: "xyzzy".to_string(), ..Default::default() }).unwrap();

    assert!(outcome.results.is_empty());
    assert_eq!(tenant_search::metrics::BLOOM_TERMS_PROBED_TOTAL.get() - probed_before, 1);
    assert_eq!(tenant_search::metrics::BLOOM_TERMS_SKIPPED_TOTAL.get() - skipped_before, 1);
}

#[test]
fn scenario_4_bm25f_field_boost() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "a.md", "---\nurl: https://ex.com/a\ntitle: Cache\n---\nunrelated unrelated unrelated\n");
    write_doc(dir.path(), "b.md", "---\nurl: https://ex.com/b\ntitle: Unrelated\n---\ncache cache cache\n");

    let (_store, reader) = build_and_open(dir.path());
    let reader = reader.unwrap();

    let engine = QueryEngine::new(&reader);
    let outcome = engine.search(&QuerySpec { text: "cache".to_string(), ..Default::default() }).unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].url, "https://ex.com/a");
    assert!(outcome.results[0].score > outcome.results[1].score);
}

#[test]
fn front_matter_absent_document_still_indexes() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "plain-file-name.md", "# Getting Started\n\nRead this to get started.\n");

    let (_store, reader) = build_and_open(dir.path());
    let reader = reader.unwrap();

    let engine = QueryEngine::new(&reader);
    let outcome = engine.search(&QuerySpec { text: "started".to_string(), ..Default::default() }).unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].title, "Getting Started");
}
