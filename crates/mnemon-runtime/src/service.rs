//! Text-in memory service over a [`MemoryStore`].

use crate::embedder::Embedder;
use crate::error::RuntimeError;
use crate::options::{
    consolidation_policy_from_config, scheduler_settings_from_config, store_options_from_config,
};
use crate::scheduler::SchedulerSettings;
use log::{debug, info, warn};
use mnemon_config::MnemonConfig;
use mnemon_memory::{
    ConsolidationEngine, ConsolidationReport, FileSnapshotStore, MemoryStore, Metadata,
    MetadataValue, PassControl, Record, RecordId, SearchHit, SearchOptions, SnapshotStore,
};
use std::sync::Arc;
use tokio::sync::Notify;

/// Store, consolidation engine, embedder and optional snapshot storage wired
/// together from one config.
pub struct MemoryService {
    config: MnemonConfig,
    store: Arc<MemoryStore>,
    engine: Arc<ConsolidationEngine>,
    embedder: Arc<dyn Embedder>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    trigger: Arc<Notify>,
}

impl MemoryService {
    /// Build the service and, when configured, restore the last snapshot.
    pub fn from_config(
        config: MnemonConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;
        if embedder.dimension() != config.store.dimension {
            return Err(RuntimeError::EmbedderDimension {
                expected: config.store.dimension,
                actual: embedder.dimension(),
            });
        }
        let store = MemoryStore::new(store_options_from_config(&config.store))?;
        let status = store.backend_status();
        if status.degraded {
            warn!(
                "memory service running on fallback backend (reason={})",
                status.reason.as_deref().unwrap_or("unknown")
            );
        }
        let engine =
            ConsolidationEngine::new(consolidation_policy_from_config(&config.consolidation));
        let snapshots = match config.snapshot.path.as_ref() {
            Some(path) => Some(Arc::new(FileSnapshotStore::new(path)?) as Arc<dyn SnapshotStore>),
            None => None,
        };
        let load_on_start = config.snapshot.load_on_start;
        let service = Self {
            config,
            store: Arc::new(store),
            engine: Arc::new(engine),
            embedder,
            snapshots,
            trigger: Arc::new(Notify::new()),
        };
        if load_on_start {
            service.restore()?;
        }
        info!(
            "memory service ready (records={}, backend={})",
            service.store.count(),
            service.store.backend()
        );
        Ok(service)
    }

    /// Replace the snapshot backend.
    pub fn with_snapshot_store(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn config(&self) -> &MnemonConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<ConsolidationEngine> {
        &self.engine
    }

    /// Scheduler settings derived from the service config.
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        scheduler_settings_from_config(&self.config)
    }

    pub(crate) fn trigger(&self) -> Arc<Notify> {
        self.trigger.clone()
    }

    /// Embed `text` and store it. Wakes the scheduler when the store goes
    /// over capacity; the write itself is never refused for that.
    pub async fn remember(
        &self,
        text: &str,
        object_type: &str,
        metadata: Metadata,
    ) -> Result<RecordId, RuntimeError> {
        let embedding = self.embedder.embed(text).await?;
        let id = self.store.add(text, object_type, metadata, embedding)?;
        if self.store.over_capacity() {
            debug!(
                "capacity trigger raised (count={}, capacity={})",
                self.store.count(),
                self.store.capacity()
            );
            self.trigger.notify_one();
        }
        Ok(id)
    }

    /// Embed `query` and search the store.
    pub async fn recall(
        &self,
        query: &str,
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, RuntimeError> {
        let embedding = self.embedder.embed(query).await?;
        Ok(self.store.search(embedding, k, options)?)
    }

    /// Set the outcome signal read by consolidation.
    pub fn record_outcome(&self, id: &RecordId, success: bool) -> Result<Record, RuntimeError> {
        let mut metadata = Metadata::new();
        metadata.insert(
            self.config.consolidation.outcome_key.clone(),
            MetadataValue::Bool(success),
        );
        Ok(self.store.update_metadata(id, metadata)?)
    }

    /// Run one consolidation pass on the blocking pool.
    pub async fn consolidate(
        &self,
        control: PassControl,
    ) -> Result<ConsolidationReport, RuntimeError> {
        let store = self.store.clone();
        let engine = self.engine.clone();
        let report = tokio::task::spawn_blocking(move || engine.run(&store, &control)).await??;
        Ok(report)
    }

    /// Load the configured snapshot into the store. Returns the number of
    /// records restored, or `None` when there is nothing to load.
    pub fn restore(&self) -> Result<Option<usize>, RuntimeError> {
        let Some(snapshots) = self.snapshots.as_ref() else {
            return Ok(None);
        };
        let Some(snapshot) = snapshots.load()? else {
            return Ok(None);
        };
        let restored = self.store.import(snapshot)?;
        if self.store.over_capacity() {
            self.trigger.notify_one();
        }
        Ok(Some(restored))
    }

    /// Export the store and persist it. Returns false when no snapshot store
    /// is configured.
    pub async fn snapshot(&self) -> Result<bool, RuntimeError> {
        let Some(snapshots) = self.snapshots.clone() else {
            return Ok(false);
        };
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || -> Result<(), RuntimeError> {
            let snapshot = store.export()?;
            snapshots.save(&snapshot)?;
            Ok(())
        })
        .await??;
        Ok(true)
    }
}
