//! Per-tenant coordinator: holds the resident segment handle, polls the
//! manifest for a newer published segment, and serializes background
//! rebuilds behind a lease so at most one runs per tenant at a time.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use crate::builder::{IndexBuildResult, SegmentBuilder, SourceType};
use crate::error::{Result, SearchError};
use crate::knobs;
use crate::query::{QueryEngine, QuerySpec, SearchOutcome};
use crate::schema::Schema;
use crate::sqlite_segment::SegmentReader;
use crate::store::SegmentStore;

/// A resident, reference-counted snapshot of one tenant's current segment.
/// Readers hold an `Arc` clone so a concurrent rebuild can swap the
/// coordinator's pointer without invalidating in-flight queries.
struct ResidentSegment {
    segment_id: Option<String>,
    reader: Option<SegmentReader>,
}

pub struct TenantCoordinator {
    tenant_root: PathBuf,
    schema: Schema,
    source_type: SourceType,
    store: SegmentStore,
    resident: RwLock<Arc<ResidentSegment>>,
    rebuild_lease: AsyncMutex<()>,
    cancel_current_rebuild: parking_lot::Mutex<Option<Arc<AtomicBool>>>,
}

impl TenantCoordinator {
    pub fn open(tenant_root: impl Into<PathBuf>, schema: Schema, source_type: SourceType) -> Result<Self> {
        let tenant_root = tenant_root.into();
        let store = SegmentStore::open(&tenant_root)?;
        let resident = Self::load_resident(&store)?;
        Ok(TenantCoordinator {
            tenant_root,
            schema,
            source_type,
            store,
            resident: RwLock::new(Arc::new(resident)),
            rebuild_lease: AsyncMutex::new(()),
            cancel_current_rebuild: parking_lot::Mutex::new(None),
        })
    }

    fn load_resident(store: &SegmentStore) -> Result<ResidentSegment> {
        let segment_id = store.latest_segment_id()?;
        let reader = store.latest()?;
        Ok(ResidentSegment { segment_id, reader })
    }

    /// A cheap snapshot of the current resident segment. Holding this `Arc`
    /// keeps the underlying `SegmentReader` alive even if a concurrent
    /// rebuild swaps the coordinator's pointer to a newer segment.
    fn snapshot(&self) -> Arc<ResidentSegment> {
        self.resident.read().clone()
    }

    /// Runs one query against the resident segment, bounded by a soft
    /// deadline. Returns an empty result set (not an error) when the tenant
    /// has no index yet, per the "no search index" contract.
    pub async fn search(&self, spec: QuerySpec) -> Result<SearchOutcome> {
        let snapshot = self.snapshot();
        let Some(reader) = snapshot.reader.as_ref() else {
            return Ok(SearchOutcome::default());
        };

        let engine = QueryEngine::new(reader);
        let deadline = Duration::from_millis(*knobs::QUERY_TIMEOUT_MS);
        let timer = crate::metrics::QUERY_SECONDS.start_timer();
        let outcome = tokio::time::timeout(deadline, async { engine.search(&spec) }).await;
        timer.stop_and_record();
        match outcome {
            Ok(result) => result,
            Err(_) => {
                crate::metrics::QUERY_TIMEOUTS_TOTAL.inc();
                Err(SearchError::QueryTimeout)
            },
        }
    }

    /// Polls the manifest once; if it points at a segment other than the one
    /// currently resident, swaps in a fresh reader. Cheap enough to run on
    /// every tick of a `tokio::time::interval`.
    pub fn poll_manifest(&self) -> Result<bool> {
        crate::metrics::MANIFEST_POLLS_TOTAL.inc();
        let current_id = self.resident.read().segment_id.clone();
        let latest_id = self.store.latest_segment_id()?;
        if latest_id == current_id {
            return Ok(false);
        }
        let reader = match &latest_id {
            Some(id) => self.store.load(id)?,
            None => None,
        };
        *self.resident.write() = Arc::new(ResidentSegment { segment_id: latest_id, reader });
        crate::metrics::MANIFEST_SWAPS_TOTAL.inc();
        Ok(true)
    }

    /// Spawns the manifest-polling loop on the current tokio runtime. The
    /// returned handle should be aborted when the tenant is unloaded.
    pub fn spawn_manifest_poller(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(*knobs::MANIFEST_POLL_INTERVAL_MS));
            loop {
                interval.tick().await;
                if let Err(e) = this.poll_manifest() {
                    tracing::warn!("manifest poll failed for {}: {e}", this.tenant_root.display());
                }
            }
        })
    }

    /// Runs a rebuild in the background, serialized per tenant via
    /// `rebuild_lease`. Cancels any rebuild already in flight before
    /// starting a new one, then swaps the resident segment in on success.
    pub async fn rebuild(&self) -> Result<IndexBuildResult> {
        let _lease = self.rebuild_lease.lock().await;

        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut slot = self.cancel_current_rebuild.lock();
            if let Some(previous) = slot.take() {
                previous.store(true, Ordering::Relaxed);
            }
            *slot = Some(Arc::clone(&cancel));
        }

        let docs_root = self.tenant_root.clone();
        let schema = self.schema.clone();
        let source_type = self.source_type;
        let store_dir = self.tenant_root.clone();
        let previous_created_at = self
            .store
            .list_segments()
            .ok()
            .and_then(|segments| segments.last().map(|e| e.created_at));

        let result = tokio::task::spawn_blocking(move || -> Result<IndexBuildResult> {
            let store = SegmentStore::open(&store_dir)?;
            let builder = SegmentBuilder::new(&docs_root, schema, source_type).with_cancellation(cancel);
            builder.build(&store, previous_created_at)
        })
        .await
        .map_err(|e| SearchError::storage(format!("rebuild task panicked: {e}")))??;

        self.poll_manifest()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn write_file(path: &std::path::Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn search_against_empty_tenant_returns_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = TenantCoordinator::open(dir.path(), Schema::documentation(), SourceType::Filesystem).unwrap();
        let outcome = coordinator.search(QuerySpec { text: "install".to_string(), ..Default::default() }).await.unwrap();
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn rebuild_then_search_finds_indexed_document() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("install.md"), "# Installation\n\nInstall with pip install pkg.\n");

        let coordinator = TenantCoordinator::open(dir.path(), Schema::documentation(), SourceType::Filesystem).unwrap();
        let result = coordinator.rebuild().await.unwrap();
        assert_eq!(result.documents_indexed, 1);

        let outcome = coordinator.search(QuerySpec { text: "install".to_string(), ..Default::default() }).await.unwrap();
        assert_eq!(outcome.results.len(), 1);
    }
}
