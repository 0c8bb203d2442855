//! Per-library indexing lifecycle: state machine, installed-index slot,
//! and the build procedure.
//!
//! Every library owns one [`IndexSlot`]. The slot holds the lifecycle
//! state machine and the atomically-swappable installed index:
//!
//! ```text
//!            start_index                build_ok
//!   idle ───────────────▶ building ───────────────▶ ready
//!   stale ──────────────▶    │     ───────────────▶ failed (build_err)
//!   ready ──────────────▶    │
//!   failed ─────────────▶    │ mutation → build marked superseded,
//!                            ▼ resolves to stale
//!   ready ── mutation ──▶ stale ── mutation ──▶ stale
//! ```
//!
//! The build runs off the request path: snapshot the library's chunk set,
//! embed whatever lacks a vector, re-validate the snapshot, construct the
//! indexer on a blocking thread, then swap it in. Any mutation (or a
//! library delete) that lands while the build is in flight marks it
//! superseded; the worker discards its result without touching the store.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use uuid::Uuid;

use crate::embedding::{EmbedRole, Embedder};
use crate::error::{Error, Result};
use crate::index::{build_indexer, IndexedPoint, IndexerKind, VectorIndexer};
use crate::models::SearchResult;
use crate::store::{ChunkSnapshot, Store};

/// Lifecycle state of a library's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Never indexed.
    Idle,
    /// A build is in flight.
    Building,
    /// The installed index reflects the library's current contents.
    Ready,
    /// An index exists (or existed) but the library has changed since.
    Stale,
    /// The last build failed; the error is preserved in the status.
    Failed,
}

/// Published status record: the search gate input and the body of
/// `GET /api/libraries/{id}/index/status`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    /// True iff the state is `ready`.
    pub indexed: bool,
    /// True iff a build is in flight.
    pub indexing_in_progress: bool,
    pub indexer_type: Option<IndexerKind>,
    /// Epoch milliseconds of the last successful build.
    pub last_indexed: Option<i64>,
    /// Error message from the last failed build, if any.
    pub error: Option<String>,
}

/// An index that has been swapped into a library's slot.
pub struct InstalledIndex {
    pub index: Box<dyn VectorIndexer>,
}

struct SlotState {
    state: IndexState,
    kind: Option<IndexerKind>,
    last_indexed: Option<i64>,
    error: Option<String>,
    /// Monotonic build counter; a finishing build must match it.
    epoch: u64,
    /// Set when a mutation lands while `state == Building`.
    superseded: bool,
}

/// One library's lifecycle state plus its installed-index pointer.
///
/// The pointer is read-many / written-once-per-build: searches `load()` it
/// without taking the state mutex.
pub struct IndexSlot {
    state: Mutex<SlotState>,
    installed: ArcSwapOption<InstalledIndex>,
}

impl IndexSlot {
    fn new(initial: IndexState) -> Self {
        Self {
            state: Mutex::new(SlotState {
                state: initial,
                kind: None,
                last_indexed: None,
                error: None,
                epoch: 0,
                superseded: false,
            }),
            installed: ArcSwapOption::const_empty(),
        }
    }

    /// Current published status.
    pub fn status(&self) -> IndexStatus {
        let s = self.state.lock();
        IndexStatus {
            indexed: s.state == IndexState::Ready,
            indexing_in_progress: s.state == IndexState::Building,
            indexer_type: s.kind,
            last_indexed: s.last_indexed,
            error: s.error.clone(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> IndexState {
        self.state.lock().state
    }

    /// The installed index, if one has been swapped in.
    pub fn installed(&self) -> Option<Arc<InstalledIndex>> {
        self.installed.load_full()
    }

    /// Apply the `mutation_in_library` event: `ready → stale`,
    /// `stale → stale`, `building` marks the running build superseded.
    /// `idle` and `failed` are unchanged.
    pub fn note_mutation(&self) {
        let mut s = self.state.lock();
        match s.state {
            IndexState::Ready => s.state = IndexState::Stale,
            IndexState::Stale => {}
            IndexState::Building => s.superseded = true,
            IndexState::Idle | IndexState::Failed => {}
        }
    }

    /// Enter `building`, or fail fast if a build is already in flight.
    /// Returns the epoch the new build must present when finishing.
    pub(crate) fn begin_build(&self, kind: IndexerKind) -> Result<u64> {
        let mut s = self.state.lock();
        if s.state == IndexState::Building {
            return Err(Error::AlreadyIndexing(
                "an index build is already in progress for this library".into(),
            ));
        }
        s.state = IndexState::Building;
        s.kind = Some(kind);
        s.error = None;
        s.superseded = false;
        s.epoch += 1;
        Ok(s.epoch)
    }

    /// Resolve a finished build. A superseded or out-of-epoch build lands
    /// in `stale` and reports [`Error::Superseded`]; a successful one
    /// swaps the index in and lands in `ready`; a failed one lands in
    /// `failed` with the error preserved.
    pub(crate) fn finish_build(&self, epoch: u64, outcome: Result<InstalledIndex>) -> Result<()> {
        let mut s = self.state.lock();
        if s.state != IndexState::Building || s.epoch != epoch {
            return Err(Error::Superseded);
        }
        match outcome {
            _ if s.superseded => {
                s.state = IndexState::Stale;
                s.superseded = false;
                Err(Error::Superseded)
            }
            Ok(installed) => {
                self.installed.store(Some(Arc::new(installed)));
                s.state = IndexState::Ready;
                s.last_indexed = Some(crate::index::epoch_ms());
                s.error = None;
                Ok(())
            }
            Err(Error::Superseded) => {
                s.state = IndexState::Stale;
                Err(Error::Superseded)
            }
            Err(e) => {
                s.state = IndexState::Failed;
                s.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Registry of per-library slots. The store signals mutations into it;
/// the lifecycle manager drives builds through it.
#[derive(Default)]
pub struct IndexSlots {
    slots: RwLock<HashMap<Uuid, Arc<IndexSlot>>>,
}

impl IndexSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot for a new (or reloaded) library.
    pub fn create(&self, library_id: Uuid, initial: IndexState) {
        self.slots
            .write()
            .insert(library_id, Arc::new(IndexSlot::new(initial)));
    }

    /// Drop a deleted library's slot. Any in-flight build is marked
    /// superseded first so its worker discards the result.
    pub fn remove(&self, library_id: Uuid) {
        if let Some(slot) = self.slots.write().remove(&library_id) {
            slot.note_mutation();
        }
    }

    pub fn get(&self, library_id: Uuid) -> Option<Arc<IndexSlot>> {
        self.slots.read().get(&library_id).cloned()
    }

    /// The *library-invalidated* signal emitted by the store.
    pub fn note_mutation(&self, library_id: Uuid) {
        if let Some(slot) = self.get(library_id) {
            slot.note_mutation();
        }
    }
}

// ============ Build orchestration ============

/// Drives index builds and serves gated searches. Holds the store, the
/// slot registry, and the injected embedding client.
pub struct LifecycleManager {
    store: Arc<Store>,
    slots: Arc<IndexSlots>,
    embedder: Arc<dyn Embedder>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<Store>,
        slots: Arc<IndexSlots>,
        embedder: Arc<dyn Embedder>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            slots,
            embedder,
        })
    }

    /// Transition the library to `building` and spawn the build task.
    /// Returns the status observed immediately after the transition, so a
    /// subsequent search sees `building` or `ready` of *this* build.
    pub fn start_index(
        self: &Arc<Self>,
        library_id: Uuid,
        kind: IndexerKind,
        leaf_size: Option<usize>,
    ) -> Result<IndexStatus> {
        if !self.store.library_exists(library_id) {
            return Err(Error::NotFound(format!("library {library_id} not found")));
        }
        let slot = self
            .slots
            .get(library_id)
            .ok_or_else(|| Error::NotFound(format!("library {library_id} not found")))?;
        let epoch = slot.begin_build(kind)?;
        let status = slot.status();

        let mgr = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = mgr.build_once(library_id, kind, leaf_size).await;
            match slot.finish_build(epoch, outcome) {
                Ok(()) => {
                    tracing::info!(%library_id, kind = kind.as_str(), "index build complete")
                }
                Err(Error::Superseded) => {
                    tracing::info!(%library_id, "index build superseded, result discarded")
                }
                Err(e) => {
                    tracing::warn!(%library_id, error = %e, "index build failed")
                }
            }
        });

        Ok(status)
    }

    /// Current status for a library.
    pub fn status(&self, library_id: Uuid) -> Result<IndexStatus> {
        self.slots
            .get(library_id)
            .map(|slot| slot.status())
            .ok_or_else(|| Error::NotFound(format!("library {library_id} not found")))
    }

    /// The build procedure proper. Runs outside any store lock; all CPU
    /// work is offloaded to a blocking thread.
    async fn build_once(
        &self,
        library_id: Uuid,
        kind: IndexerKind,
        leaf_size: Option<usize>,
    ) -> Result<InstalledIndex> {
        let snapshot = self.store.snapshot_chunks(library_id)?;

        // Fill in missing embeddings. These writes are index-internal and
        // must not re-invalidate the library.
        let missing: Vec<&ChunkSnapshot> =
            snapshot.iter().filter(|c| c.embedding.is_none()).collect();
        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts, EmbedRole::Document).await?;
            if vectors.len() != texts.len() {
                return Err(Error::EmbeddingProtocol(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    vectors.len()
                )));
            }
            for (chunk, vector) in missing.iter().zip(vectors) {
                self.store.set_chunk_embedding_internal(chunk.id, vector);
            }
        }

        // Re-validate: if the chunk set or any text changed under us, the
        // snapshot no longer describes the library.
        let current = self.store.snapshot_chunks(library_id)?;
        if !snapshots_match(&snapshot, &current) {
            return Err(Error::Superseded);
        }

        let points = current
            .into_iter()
            .map(|c| {
                let vector = c.embedding.ok_or_else(|| {
                    Error::Internal(format!("chunk {} lost its embedding during build", c.id))
                })?;
                Ok(IndexedPoint {
                    chunk_id: c.id,
                    vector,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let index = tokio::task::spawn_blocking(move || build_indexer(kind, leaf_size, points))
            .await
            .map_err(|e| Error::Internal(format!("index build task panicked: {e}")))??;

        Ok(InstalledIndex { index })
    }

    /// Gated search: embed the query and run it against the installed
    /// index, hydrating hits back into chunk records.
    pub async fn search(
        &self,
        library_id: Uuid,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let slot = self
            .slots
            .get(library_id)
            .ok_or_else(|| Error::NotFound(format!("library {library_id} not found")))?;

        match slot.state() {
            IndexState::Ready => {}
            IndexState::Building => {
                return Err(Error::AlreadyIndexing(
                    "library is being indexed; retry when the build completes".into(),
                ))
            }
            other => {
                return Err(Error::NotIndexed(format!(
                    "library is not indexed (state: {other:?}); call the index endpoint first"
                )))
            }
        }

        let installed = slot.installed().ok_or_else(|| {
            Error::NotIndexed("library has no installed index; call the index endpoint".into())
        })?;

        // Cheap consistency check; the state machine is authoritative.
        let chunk_count = self.store.library_chunk_count(library_id)?;
        if installed.index.len() != chunk_count {
            return Err(Error::NotIndexed(
                "index does not reflect the library's current contents; re-index".into(),
            ));
        }

        let query = self
            .embedder
            .embed_batch(&[query_text.to_string()], EmbedRole::Query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingProtocol("empty embedding response".into()))?;

        let hits = installed.index.search(&query, top_k)?;
        Ok(self.store.hydrate_hits(&hits))
    }
}

/// Whether two snapshots describe the same chunk set with the same texts.
fn snapshots_match(before: &[ChunkSnapshot], after: &[ChunkSnapshot]) -> bool {
    if before.len() != after.len() {
        return false;
    }
    let mut after_by_id: HashMap<Uuid, &ChunkSnapshot> =
        after.iter().map(|c| (c.id, c)).collect();
    before.iter().all(|b| {
        after_by_id
            .remove(&b.id)
            .map(|a| a.text == b.text)
            .unwrap_or(false)
    })
}
