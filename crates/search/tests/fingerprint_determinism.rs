//! Building the same corpus twice must produce the same segment id and
//! publish exactly one artifact, regardless of filesystem iteration order.

use tenant_search::builder::SourceType;
use tenant_search::{Schema, SegmentBuilder, SegmentStore};

fn write_doc(root: &std::path::Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
fn rebuild_over_same_corpus_reuses_segment_id() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "zzz-last.md", "---\nurl: https://ex.com/a\ntitle: A\n---\nfirst body\n");
    write_doc(dir.path(), "aaa-first.md", "---\nurl: https://ex.com/b\ntitle: B\n---\nsecond body\n");

    let store = SegmentStore::open(dir.path()).unwrap();
    let builder = SegmentBuilder::new(dir.path(), Schema::documentation(), SourceType::Filesystem);

    let first = builder.build(&store, None).unwrap();
    let segment_id_1 = first.segment_ids[0].clone();

    // Rename the files so a second traversal visits them in the opposite
    // directory order; fingerprinting sorts by document key, so this must
    // not change the resulting segment id.
    std::fs::rename(dir.path().join("zzz-last.md"), dir.path().join("renamed-zzz-last.md")).unwrap();
    std::fs::rename(dir.path().join("aaa-first.md"), dir.path().join("renamed-aaa-first.md")).unwrap();
    std::fs::write(
        dir.path().join("renamed-zzz-last.md"),
        "---\nurl: https://ex.com/a\ntitle: A\n---\nfirst body\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("renamed-aaa-first.md"),
        "---\nurl: https://ex.com/b\ntitle: B\n---\nsecond body\n",
    )
    .unwrap();

    let second = builder.build(&store, None).unwrap();
    let segment_id_2 = second.segment_ids[0].clone();

    assert_eq!(segment_id_1, segment_id_2);

    let segments = store.list_segments().unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(store.latest_segment_id().unwrap(), Some(segment_id_1));
}

#[test]
fn empty_corpus_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = SegmentStore::open(dir.path()).unwrap();
    let builder = SegmentBuilder::new(dir.path(), Schema::documentation(), SourceType::Filesystem);

    let result = builder.build(&store, None).unwrap();
    assert!(result.segment_ids.is_empty());
    assert_eq!(store.latest_segment_id().unwrap(), None);
    assert!(store.list_segments().unwrap().is_empty());
}
