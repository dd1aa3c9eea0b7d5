//! Segment Store: filesystem layout, manifest, and atomic segment lifecycle
//! for one tenant.
//!
//! Layout under `<tenant-root>/__search_segments/`:
//! - `manifest.json` — owned, single source of truth for which segments
//!   are live.
//! - `<segment_id>.sqlite3` — owned, one immutable artifact per segment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::knobs::MAX_SEGMENTS;
use crate::sqlite_segment::SegmentReader;

const MANIFEST_FILENAME: &str = "manifest.json";
const SEGMENT_SUFFIX: &str = ".sqlite3";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub segment_id: String,
    pub created_at: DateTime<Utc>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub latest_segment_id: Option<String>,
    #[serde(default)]
    pub segments: Vec<ManifestEntry>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest {
            latest_segment_id: None,
            segments: Vec::new(),
            updated_at: None,
        }
    }
}

pub struct SegmentStore {
    directory: PathBuf,
}

impl SegmentStore {
    pub fn open(tenant_root: &Path) -> Result<Self> {
        let directory = tenant_root.join("__search_segments");
        fs::create_dir_all(&directory)
            .map_err(|e| SearchError::storage(format!("failed to create segment directory: {e}")))?;
        Ok(SegmentStore { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn manifest_path(&self) -> PathBuf {
        self.directory.join(MANIFEST_FILENAME)
    }

    pub fn segment_path(&self, segment_id: &str) -> PathBuf {
        self.directory.join(format!("{segment_id}{SEGMENT_SUFFIX}"))
    }

    fn load_manifest(&self) -> Result<Manifest> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(Manifest::default());
        }
        let bytes = fs::read(&path).map_err(|e| SearchError::storage(format!("failed to read manifest: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| SearchError::storage(format!("corrupt manifest JSON: {e}")))
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let path = self.manifest_path();
        let payload = serde_json::to_vec(manifest)
            .map_err(|e| SearchError::storage(format!("failed to serialize manifest: {e}")))?;
        atomic_write(&path, &payload)
    }

    /// Persists a segment artifact that was already written to a temp path
    /// by the caller (the builder), publishing it into the store and
    /// updating the manifest. Idempotent: if `segment_id` is already
    /// present, only the `latest_segment_id` pointer is updated.
    pub fn save(&self, segment_id: &str, created_at: DateTime<Utc>, tmp_artifact_path: &Path) -> Result<PathBuf> {
        let mut manifest = self.load_manifest()?;

        if let Some(entry) = manifest.segments.iter().find(|e| e.segment_id == segment_id) {
            let existing_path = self.segment_path(segment_id);
            if !existing_path.exists() {
                fs::rename(tmp_artifact_path, &existing_path)
                    .map_err(|e| SearchError::storage(format!("failed to publish segment: {e}")))?;
            } else if tmp_artifact_path.exists() {
                let _ = fs::remove_file(tmp_artifact_path);
            }
            let _ = entry;
            manifest.latest_segment_id = Some(segment_id.to_string());
            manifest.updated_at = Some(Utc::now());
            self.write_manifest(&manifest)?;
            return Ok(existing_path);
        }

        let segment_path = self.segment_path(segment_id);
        fs::rename(tmp_artifact_path, &segment_path)
            .map_err(|e| SearchError::storage(format!("failed to publish segment: {e}")))?;

        manifest.segments.push(ManifestEntry {
            segment_id: segment_id.to_string(),
            created_at,
            files: vec![segment_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string()],
        });
        manifest.segments.sort_by_key(|e| e.created_at);
        manifest.latest_segment_id = Some(segment_id.to_string());

        self.prune_excess(&mut manifest);
        manifest.updated_at = Some(Utc::now());
        self.write_manifest(&manifest)?;
        Ok(segment_path)
    }

    fn prune_excess(&self, manifest: &mut Manifest) {
        let max = *MAX_SEGMENTS;
        if manifest.segments.len() <= max {
            return;
        }
        let excess = manifest.segments.len() - max;
        let removed: Vec<ManifestEntry> = manifest.segments.drain(0..excess).collect();
        for entry in removed {
            self.delete_entry_files(&entry);
        }
    }

    fn delete_entry_files(&self, entry: &ManifestEntry) {
        for name in &entry.files {
            let path = self.directory.join(name);
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!("failed to remove pruned segment file {}: {e}", path.display());
                }
            }
        }
    }

    pub fn load(&self, segment_id: &str) -> Result<Option<SegmentReader>> {
        let path = self.segment_path(segment_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(SegmentReader::open(&path)?))
    }

    pub fn latest_segment_id(&self) -> Result<Option<String>> {
        Ok(self.load_manifest()?.latest_segment_id)
    }

    /// Loads the segment the manifest currently points at. A crash mid-prune
    /// can leave the manifest referencing a file that's no longer on disk;
    /// that's a storage inconsistency, not an empty-index state, so it
    /// surfaces as `SearchError::Storage` rather than `Ok(None)`.
    pub fn latest(&self) -> Result<Option<SegmentReader>> {
        match self.latest_segment_id()? {
            Some(id) => match self.load(&id)? {
                Some(reader) => Ok(Some(reader)),
                None => Err(SearchError::storage(format!("manifest points at missing segment {id}"))),
            },
            None => Ok(None),
        }
    }

    pub fn list_segments(&self) -> Result<Vec<ManifestEntry>> {
        Ok(self.load_manifest()?.segments)
    }

    /// Rewrites the manifest to contain only `keep_segment_ids` (preserving
    /// their relative order), deleting the files of anything dropped.
    pub fn prune_to_segment_ids(&self, keep_segment_ids: &[String]) -> Result<()> {
        let mut manifest = self.load_manifest()?;
        if manifest.segments.is_empty() {
            return Ok(());
        }
        let keep: std::collections::HashSet<&String> = keep_segment_ids.iter().collect();
        let (kept, removed): (Vec<_>, Vec<_>) = manifest
            .segments
            .drain(..)
            .partition(|e| keep.contains(&e.segment_id));

        if removed.is_empty() {
            manifest.segments = kept;
            return Ok(());
        }

        for entry in &removed {
            self.delete_entry_files(entry);
        }

        let mut by_id: std::collections::HashMap<String, ManifestEntry> =
            kept.into_iter().map(|e| (e.segment_id.clone(), e)).collect();
        let ordered: Vec<ManifestEntry> = keep_segment_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();

        manifest.latest_segment_id = ordered.last().map(|e| e.segment_id.clone());
        manifest.segments = ordered;
        manifest.updated_at = Some(Utc::now());
        self.write_manifest(&manifest)
    }

    /// Deletes any `*.tmp` file older than one manifest-poll interval. A
    /// mid-publication crash orphans a temp file rather than corrupting the
    /// manifest; this sweep reclaims the orphan.
    pub fn sweep_stale_temp_files(&self) -> Result<()> {
        let cutoff = SystemTime::now()
            .checked_sub(std::time::Duration::from_millis(*crate::knobs::MANIFEST_POLL_INTERVAL_MS))
            .unwrap_or(UNIX_EPOCH);
        let entries = fs::read_dir(&self.directory)
            .map_err(|e| SearchError::storage(format!("failed to scan segment directory: {e}")))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("tmp") {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                if let Ok(modified) = metadata.modified() {
                    if modified < cutoff {
                        let _ = fs::remove_file(&path);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Writes `bytes` to `path` via write-temp-then-rename so readers never
/// observe a torn write.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    });
    fs::write(&tmp_path, bytes).map_err(|e| SearchError::storage(format!("failed to write temp file: {e}")))?;
    fs::rename(&tmp_path, path).map_err(|e| SearchError::storage(format!("failed to publish file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::{BloomBuilder, BloomParams};
    use crate::schema::Schema;
    use crate::sqlite_segment::{create_segment, SegmentWriteParams};
    use std::collections::HashMap;

    fn write_fake_segment(tmp_path: &Path) {
        let schema = Schema::documentation();
        let bloom_params = BloomParams::for_expected_items(1, 0.01, 512);
        let bloom = BloomBuilder::new(bloom_params);
        let totals = HashMap::new();
        let write_params = SegmentWriteParams {
            schema: &schema,
            bloom_params,
            doc_count: 0,
            field_total_terms: &totals,
        };
        create_segment(tmp_path, &write_params, &[], &[], &bloom.into_blocks()).unwrap();
    }

    #[test]
    fn save_then_latest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::open(dir.path()).unwrap();
        let tmp = dir.path().join("staged.sqlite3");
        write_fake_segment(&tmp);

        store.save("seg-a", Utc::now(), &tmp).unwrap();
        assert_eq!(store.latest_segment_id().unwrap(), Some("seg-a".to_string()));
        assert!(store.load("seg-a").unwrap().is_some());
    }

    #[test]
    fn save_is_idempotent_for_existing_segment_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::open(dir.path()).unwrap();

        let tmp1 = dir.path().join("staged1.sqlite3");
        write_fake_segment(&tmp1);
        store.save("seg-a", Utc::now(), &tmp1).unwrap();

        let tmp2 = dir.path().join("staged2.sqlite3");
        write_fake_segment(&tmp2);
        store.save("seg-a", Utc::now(), &tmp2).unwrap();

        assert_eq!(store.list_segments().unwrap().len(), 1);
    }

    #[test]
    fn retention_prunes_oldest_segments() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::open(dir.path()).unwrap();

        for i in 0..(*MAX_SEGMENTS + 2) {
            let tmp = dir.path().join(format!("staged{i}.sqlite3"));
            write_fake_segment(&tmp);
            let created_at = Utc::now() + chrono::Duration::seconds(i as i64);
            store.save(&format!("seg-{i}"), created_at, &tmp).unwrap();
        }

        let segments = store.list_segments().unwrap();
        assert_eq!(segments.len(), *MAX_SEGMENTS);
    }

    #[test]
    fn prune_to_segment_ids_keeps_only_requested() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::open(dir.path()).unwrap();

        for i in 0..3 {
            let tmp = dir.path().join(format!("staged{i}.sqlite3"));
            write_fake_segment(&tmp);
            store.save(&format!("seg-{i}"), Utc::now(), &tmp).unwrap();
        }

        store.prune_to_segment_ids(&["seg-1".to_string()]).unwrap();
        let segments = store.list_segments().unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].segment_id, "seg-1");
        assert_eq!(store.latest_segment_id().unwrap(), Some("seg-1".to_string()));
        assert!(!store.segment_path("seg-0").exists());
    }
}
