//! Retention pruning against a tenant-configured `MAX_SEGMENTS`. Runs in its
//! own test binary so setting the env knob before first use is safe.

use tenant_search::builder::SourceType;
use tenant_search::{Schema, SegmentBuilder, SegmentStore};

fn write_doc(root: &std::path::Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
fn retention_keeps_only_the_newest_max_segments() {
    std::env::set_var("SEARCH_MAX_SEGMENTS", "2");
    assert_eq!(*tenant_search::knobs::MAX_SEGMENTS, 2);

    let dir = tempfile::tempdir().unwrap();
    let store = SegmentStore::open(dir.path()).unwrap();
    let schema = Schema::documentation();

    write_doc(dir.path(), "doc.md", "---\nurl: https://ex.com/v1\ntitle: V1\n---\nversion one body\n");
    let builder = SegmentBuilder::new(dir.path(), schema.clone(), SourceType::Filesystem);
    let r1 = builder.build(&store, None).unwrap();
    let seg1 = r1.segment_ids[0].clone();

    write_doc(dir.path(), "doc.md", "---\nurl: https://ex.com/v2\ntitle: V2\n---\nversion two body\n");
    let r2 = builder.build(&store, None).unwrap();
    let seg2 = r2.segment_ids[0].clone();

    write_doc(dir.path(), "doc.md", "---\nurl: https://ex.com/v3\ntitle: V3\n---\nversion three body\n");
    let r3 = builder.build(&store, None).unwrap();
    let seg3 = r3.segment_ids[0].clone();

    assert_ne!(seg1, seg2);
    assert_ne!(seg2, seg3);

    let segments = store.list_segments().unwrap();
    assert_eq!(segments.len(), 2);
    let ids: Vec<&str> = segments.iter().map(|e| e.segment_id.as_str()).collect();
    assert!(!ids.contains(&seg1.as_str()), "oldest segment should have been pruned");
    assert!(ids.contains(&seg2.as_str()));
    assert!(ids.contains(&seg3.as_str()));

    assert_eq!(store.latest_segment_id().unwrap(), Some(seg3));
    assert!(!store.segment_path(&seg1).exists());
}
