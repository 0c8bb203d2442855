//! Application wiring: one [`AppContext`] carries the store, the slot
//! registry, the lifecycle manager, the embedding client, and the config.
//! Handlers receive it by reference; there is no global state.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::lifecycle::{IndexSlots, LifecycleManager};
use crate::persistence;
use crate::store::Store;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<Store>,
    pub slots: Arc<IndexSlots>,
    pub lifecycle: Arc<LifecycleManager>,
}

impl AppContext {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Arc<Self> {
        let slots = Arc::new(IndexSlots::new());
        let store = Arc::new(Store::new(slots.clone()));
        let lifecycle = LifecycleManager::new(store.clone(), slots.clone(), embedder);
        Arc::new(Self {
            config,
            store,
            slots,
            lifecycle,
        })
    }

    /// Startup: load persisted libraries, then the seed corpus when
    /// `TESTING_DATA=true`.
    pub fn bootstrap(&self) {
        let loaded = persistence::load_all_libraries(&self.store, &self.config.data_dir);
        tracing::info!(loaded, dir = %self.config.data_dir.display(), "startup load complete");

        if self.config.testing_data {
            match persistence::seed_corpus(&self.store) {
                Ok(library_id) => tracing::info!(%library_id, "seed corpus loaded"),
                Err(e) => tracing::warn!(error = %e, "seed corpus failed"),
            }
        }
    }

    /// Best-effort persistence after a mutation. Failures are logged,
    /// never surfaced: memory is the source of truth.
    pub async fn persist_library(&self, library_id: Uuid) {
        let store = self.store.clone();
        let data_dir = self.config.data_dir.clone();
        let result = tokio::task::spawn_blocking(move || {
            persistence::save_library(&store, &data_dir, library_id)
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(%library_id, error = %e, "library save failed"),
            Err(e) => tracing::warn!(%library_id, error = %e, "library save task failed"),
        }
    }

    /// Best-effort file removal after a library delete.
    pub async fn drop_library_file(&self, library_id: Uuid) {
        let data_dir = self.config.data_dir.clone();
        let result = tokio::task::spawn_blocking(move || {
            persistence::remove_library_file(&data_dir, library_id)
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(%library_id, error = %e, "library file removal failed"),
            Err(e) => tracing::warn!(%library_id, error = %e, "library file removal task failed"),
        }
    }
}
