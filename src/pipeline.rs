//! # Pipeline Orchestrator
//! Sequences one run: Extracting → Deduping → Classifying → Enriching →
//! Loading → Done. Linear, no backward transitions, no mid-stage resume —
//! a full rerun is the recovery mechanism, cheap because the known-id index
//! filters out everything re-discovered.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::classify::{classify, Classification, ClassifyRules};
use crate::config::PipelineConfig;
use crate::dedup::dedup_filter;
use crate::enrich::{enrich_with_retry, Enricher};
use crate::extract::{extract_all, SourceExtractor};
use crate::item::{EnrichedItem, RawItem, RunWindow, SourceKind};
use crate::load::{ContentStore, StreamingLoader, BATCH_SIZE};
use crate::state::RunState;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("newsroom_extracted_total", "Raw items produced by extractors.");
        describe_counter!("newsroom_source_errors_total", "Source fetch/parse errors.");
        describe_counter!("newsroom_dedup_total", "Items removed by canonical-id dedup.");
        describe_counter!("newsroom_filtered_total", "Items dropped by the classifier.");
        describe_counter!("newsroom_enriched_total", "Items enriched by the model.");
        describe_counter!(
            "newsroom_enrich_dropped_total",
            "Items dropped on enrichment failure."
        );
        describe_counter!("newsroom_loaded_total", "Items upserted into the store.");
        describe_counter!("newsroom_store_errors_total", "Destination store failures.");
        describe_counter!("newsroom_feed_entries_total", "Entries parsed from feeds.");
        describe_histogram!("newsroom_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_histogram!("newsroom_enrich_ms", "Enrichment call time in milliseconds.");
        describe_gauge!(
            "newsroom_pipeline_last_run_ts",
            "Unix ts when the pipeline last ran."
        );
    });
}

/// External collaborators, built once per invocation (see `bootstrap`).
pub struct PipelineDeps {
    pub extractors: Vec<Arc<dyn SourceExtractor>>,
    pub enricher: Arc<dyn Enricher>,
    /// `None` runs the pipeline dry: no store writes, no state persistence.
    pub store: Option<Arc<dyn ContentStore>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub extracted: usize,
    pub deduped: usize,
    pub filtered: usize,
    pub enriched: usize,
    pub dropped: usize,
    pub loaded: usize,
    pub skipped_dry_run: usize,
}

/// Per-source-class accounting plus the fatal error, if any.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub feeds: StageCounts,
    pub channels: StageCounts,
    pub people: StageCounts,
    pub fatal: Option<String>,
}

impl RunSummary {
    fn counts_mut(&mut self, kind: SourceKind) -> &mut StageCounts {
        match kind {
            SourceKind::FeedPost => &mut self.feeds,
            SourceKind::ChannelUpload => &mut self.channels,
            SourceKind::PersonAppearance => &mut self.people,
        }
    }

    pub fn total_loaded(&self) -> usize {
        self.feeds.loaded + self.channels.loaded + self.people.loaded
    }

    /// Exit-code contract: partial success (at least one committed batch, or
    /// a clean run) is success; a fatal failure before any commit is not.
    pub fn is_failure(&self) -> bool {
        self.fatal.is_some() && self.total_loaded() == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=========================")?;
        writeln!(f, "--- Pipeline Summary ---")?;
        writeln!(f, "=========================")?;
        for (label, c) in [
            ("FEEDS", &self.feeds),
            ("CHANNELS", &self.channels),
            ("PEOPLE", &self.people),
        ] {
            writeln!(f, "[{label}]")?;
            writeln!(f, "Extracted:       {}", c.extracted)?;
            writeln!(f, "Deduped:         {}", c.deduped)?;
            writeln!(f, "Filtered:        {}", c.filtered)?;
            writeln!(f, "Enriched:        {}", c.enriched)?;
            writeln!(f, "Dropped:         {}", c.dropped)?;
            writeln!(f, "Loaded:          {}", c.loaded)?;
            if c.skipped_dry_run > 0 {
                writeln!(f, "Dry Run Skipped: {}", c.skipped_dry_run)?;
            }
            writeln!(f, "-------------------------")?;
        }
        if let Some(fatal) = &self.fatal {
            writeln!(f, "FATAL: {fatal}")?;
        }
        write!(f, "=========================")
    }
}

/// Execute one full run over the given window.
pub async fn run_pipeline(
    config: &PipelineConfig,
    deps: &PipelineDeps,
    window: Option<RunWindow>,
) -> RunSummary {
    ensure_metrics_described();
    let started = Instant::now();
    let now = Utc::now();
    let mut summary = RunSummary::default();

    // --- State + known-id snapshot ---
    let mut state = match RunState::load(&config.state_path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = ?e, "unreadable run state, starting fresh");
            RunState::default()
        }
    };
    if state.seen_canonical_ids.is_empty() {
        if let Some(store) = &deps.store {
            // First run or lost state file: mirror the store's read path so
            // re-extraction stays cheap. The upsert key still dedups at the
            // store if this fails.
            match store.known_ids().await {
                Ok(ids) => {
                    tracing::info!(count = ids.len(), "seeded known-id index from store");
                    state.seed_from_ids(ids);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not seed known ids from store");
                }
            }
        }
    }
    let known = Arc::new(state.snapshot_index());

    let window = window.unwrap_or_else(|| config.run_window(&state, now));
    tracing::info!(
        floor = %window.floor,
        ceiling = %window.ceiling,
        known = known.len(),
        dry_run = deps.store.is_none(),
        "pipeline run starting"
    );

    // --- Extracting ---
    let budget = config.run_budget;
    let extracted = extract_all(&deps.extractors, window, Arc::clone(&known), budget).await;
    for item in &extracted {
        summary.counts_mut(item.source_kind).extracted += 1;
    }

    // --- Deduping ---
    let kind_counts = |items: &[RawItem]| {
        let mut f = [0usize; 3];
        for it in items {
            match it.source_kind {
                SourceKind::FeedPost => f[0] += 1,
                SourceKind::ChannelUpload => f[1] += 1,
                SourceKind::PersonAppearance => f[2] += 1,
            }
        }
        f
    };
    let before = kind_counts(&extracted);
    let (unique, removed) = dedup_filter(extracted, &known);
    let after = kind_counts(&unique);
    summary.feeds.deduped = before[0] - after[0];
    summary.channels.deduped = before[1] - after[1];
    summary.people.deduped = before[2] - after[2];
    counter!("newsroom_dedup_total").increment(removed as u64);

    // --- Classifying ---
    let rules = ClassifyRules::from_config(config);
    let mut relevant = Vec::with_capacity(unique.len());
    for item in unique {
        match classify(&item, &rules) {
            Classification::Keep => relevant.push(item),
            Classification::Drop(reason) => {
                tracing::debug!(id = %item.canonical_id(), ?reason, "classifier drop");
                summary.counts_mut(item.source_kind).filtered += 1;
                counter!("newsroom_filtered_total").increment(1);
            }
        }
    }

    // --- Enriching + Loading (streamed per bounded batch) ---
    let (articles, videos): (Vec<RawItem>, Vec<RawItem>) = relevant
        .into_iter()
        .partition(|i| i.source_kind == SourceKind::FeedPost);

    let store_ref = deps.store.as_deref();
    let mut loader = StreamingLoader::new(store_ref, &mut state, &config.state_path);
    let mut truncated = false;

    // Articles get the model pass; videos load with default importance.
    'load: for (needs_model, group) in [(true, articles), (false, videos)] {
        for chunk in group.chunks(BATCH_SIZE) {
            if started.elapsed() >= budget {
                tracing::warn!("run deadline reached, abandoning remaining batches");
                truncated = true;
                break 'load;
            }

            let batch: Vec<EnrichedItem> = if needs_model {
                let result = enrich_with_retry(deps.enricher.as_ref(), chunk.to_vec()).await;
                for item in &result.items {
                    if item.enrichment.is_some() {
                        summary.counts_mut(item.raw.source_kind).enriched += 1;
                        counter!("newsroom_enriched_total").increment(1);
                    }
                }
                // Retry-exhausted and rejected items are gone; siblings load.
                if result.dropped > 0 {
                    summary.feeds.dropped += result.dropped;
                }
                result.items
            } else {
                chunk.iter().cloned().map(EnrichedItem::unenriched).collect()
            };

            match loader.load_batch(&batch).await {
                Ok(()) => {
                    for item in &batch {
                        let counts = summary.counts_mut(item.raw.source_kind);
                        if store_ref.is_none() {
                            counts.skipped_dry_run += 1;
                        } else {
                            counts.loaded += 1;
                        }
                    }
                }
                Err(e) => {
                    // Pipeline-wide failure: no further batches, items before
                    // this batch stay durable.
                    tracing::error!(error = %e, "store failure, aborting load stage");
                    summary.fatal = Some(format!("destination store: {e}"));
                    break 'load;
                }
            }
        }
    }

    // --- Done ---
    // Only a complete, committed run advances the window; otherwise the next
    // run re-extracts and the index keeps it cheap.
    if summary.fatal.is_none() && !truncated {
        state.mark_run_complete(now);
        if store_ref.is_some() {
            if let Err(e) = state.save(&config.state_path) {
                tracing::warn!(error = ?e, "could not persist final run state");
            }
        }
    }

    gauge!("newsroom_pipeline_last_run_ts").set(now.timestamp() as f64);
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        loaded = summary.total_loaded(),
        fatal = summary.fatal.is_some(),
        "pipeline run finished"
    );
    summary
}
