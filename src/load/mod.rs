// src/load/mod.rs
pub mod notion;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;

use crate::error::StoreError;
use crate::item::{CanonicalId, EnrichedItem};
use crate::state::RunState;

/// Bounded batch size keeps memory flat regardless of run size and limits
/// the blast radius of a failed batch.
pub const BATCH_SIZE: usize = 10;
const MAX_BATCH_ATTEMPTS: u32 = 3;
const BATCH_BACKOFF_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStatus {
    Created,
    Updated,
}

/// Narrow contract over the destination store: idempotent upsert keyed by
/// canonical id, plus the read path used to seed the known-id index.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn upsert(&self, item: &EnrichedItem) -> Result<UpsertStatus, StoreError>;
    async fn known_ids(&self) -> Result<Vec<CanonicalId>, StoreError>;
    fn name(&self) -> &'static str;
}

/// Streaming loader: upserts enriched items batch by batch as they become
/// ready. After a batch commits, its ids are appended to the run state and
/// the state is saved, so a mid-run crash loses at most one batch. A batch
/// that keeps failing stops the loader — it never skips ahead.
pub struct StreamingLoader<'a> {
    store: Option<&'a dyn ContentStore>,
    state: &'a mut RunState,
    state_path: &'a Path,
    pub loaded: usize,
    pub batches_committed: usize,
    pub skipped_dry_run: usize,
}

impl<'a> StreamingLoader<'a> {
    /// `store = None` is dry-run mode: nothing is written, nothing persisted.
    pub fn new(
        store: Option<&'a dyn ContentStore>,
        state: &'a mut RunState,
        state_path: &'a Path,
    ) -> Self {
        Self {
            store,
            state,
            state_path,
            loaded: 0,
            batches_committed: 0,
            skipped_dry_run: 0,
        }
    }

    pub async fn load_batch(&mut self, batch: &[EnrichedItem]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let Some(store) = self.store else {
            for item in batch {
                tracing::info!(id = %item.raw.canonical_id(), title = %item.raw.title, "[dry run] skipping upsert");
            }
            self.skipped_dry_run += batch.len();
            return Ok(());
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match commit_batch(store, batch).await {
                Ok(()) => break,
                Err(e) if attempt < MAX_BATCH_ATTEMPTS => {
                    tracing::warn!(error = %e, attempt, "batch upsert failed, retrying");
                    let delay = Duration::from_millis(BATCH_BACKOFF_MS * (1u64 << (attempt - 1)));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    counter!("newsroom_store_errors_total").increment(1);
                    return Err(e);
                }
            }
        }

        let ids: Vec<CanonicalId> = batch.iter().map(|i| i.raw.canonical_id()).collect();
        self.state.record_batch(&ids);
        if let Err(e) = self.state.save(self.state_path) {
            // The store is already durable; the next run will re-discover and
            // dedup against the store-seeded index.
            tracing::warn!(error = ?e, "could not persist run state after batch");
        }
        self.loaded += batch.len();
        self.batches_committed += 1;
        counter!("newsroom_loaded_total").increment(batch.len() as u64);
        Ok(())
    }
}

/// Upserts are idempotent, so re-running a partially applied batch is safe.
async fn commit_batch(store: &dyn ContentStore, batch: &[EnrichedItem]) -> Result<(), StoreError> {
    for item in batch {
        let status = store.upsert(item).await?;
        tracing::debug!(id = %item.raw.canonical_id(), ?status, "upserted");
    }
    Ok(())
}
