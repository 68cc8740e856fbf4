// src/state.rs
// Run state is the only piece of state that survives process restarts.
// It is read (snapshotted) at run start and appended after each committed
// load batch; its staleness tolerance is one run interval.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::CanonicalId;

/// Keep the persisted id list bounded; older ids age out first.
const MAX_TRACKED_IDS: usize = 5000;

/// Persisted envelope: `state/state.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub seen_canonical_ids: Vec<String>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
}

impl RunState {
    /// Load from disk. A missing file yields the default (first-ever run).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading run state from {}", path.display()))?;
        let state = serde_json::from_str(&s)
            .with_context(|| format!("parsing run state from {}", path.display()))?;
        Ok(state)
    }

    /// Atomic save: write to a temp file, then rename over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut bounded = self.clone();
        if bounded.seen_canonical_ids.len() > MAX_TRACKED_IDS {
            let excess = bounded.seen_canonical_ids.len() - MAX_TRACKED_IDS;
            bounded.seen_canonical_ids.drain(0..excess);
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating state dir {}", dir.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&bounded).context("serializing run state")?;
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes()).context("writing run state")?;
        fs::rename(&tmp, path)
            .with_context(|| format!("renaming state into {}", path.display()))?;
        Ok(())
    }

    /// Snapshot for the dedup filter and the early-stop scanner. Writes made
    /// during the run are not visible through this snapshot.
    pub fn snapshot_index(&self) -> KnownIdIndex {
        KnownIdIndex {
            ids: self
                .seen_canonical_ids
                .iter()
                .map(CanonicalId::from_stored)
                .collect(),
        }
    }

    /// Append-only record of a committed batch.
    pub fn record_batch(&mut self, ids: &[CanonicalId]) {
        for id in ids {
            self.seen_canonical_ids.push(id.as_str().to_string());
        }
    }

    /// Seed from the destination store's read path (state file lost/missing).
    pub fn seed_from_ids(&mut self, ids: Vec<CanonicalId>) {
        self.seen_canonical_ids = ids.into_iter().map(|id| id.as_str().to_string()).collect();
    }

    pub fn mark_run_complete(&mut self, at: DateTime<Utc>) {
        self.last_run_at = Some(at);
    }
}

/// Snapshot of previously loaded canonical ids, taken at run start.
#[derive(Debug, Clone, Default)]
pub struct KnownIdIndex {
    ids: HashSet<CanonicalId>,
}

impl KnownIdIndex {
    pub fn contains(&self, id: &CanonicalId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<CanonicalId> for KnownIdIndex {
    fn from_iter<T: IntoIterator<Item = CanonicalId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
