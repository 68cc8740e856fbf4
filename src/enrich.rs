//! Enrichment adapter: model provider abstraction + bounded retries.
//!
//! One external call per small batch; outcomes are per item, so one item's
//! failure never blocks or fails its siblings. Transient failures are
//! retried with exponential backoff up to a bound, then the item is dropped;
//! permanent failures drop immediately.

use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::json;

use crate::error::EnrichError;
use crate::item::{Enrichment, EnrichedItem, RawItem};

const MAX_ENRICH_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;
const MAX_TAGS: usize = 10;

/// Per-item outcome of a batch call. `Ok(None)` means the service produced
/// no metadata for the item (disabled adapter, or the model skipped the id);
/// the item stays loadable unenriched.
pub type ItemOutcome = Result<Option<Enrichment>, EnrichError>;

#[async_trait]
pub trait Enricher: Send + Sync {
    /// Must return exactly one outcome per input item, in order.
    async fn enrich_batch(&self, items: &[RawItem]) -> Vec<ItemOutcome>;
    fn name(&self) -> &'static str;
}

/// Used when no model key is configured: every item passes through raw.
pub struct DisabledEnricher;

#[async_trait]
impl Enricher for DisabledEnricher {
    async fn enrich_batch(&self, items: &[RawItem]) -> Vec<ItemOutcome> {
        items.iter().map(|_| Ok(None)).collect()
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

// ------------------------------------------------------------
// Retry wrapper
// ------------------------------------------------------------

pub struct BatchEnrichResult {
    /// Enriched (or raw-passthrough) items, input order preserved.
    pub items: Vec<EnrichedItem>,
    /// Items dropped after permanent failure or retry exhaustion.
    pub dropped: usize,
}

enum Slot {
    Pending,
    Done(Option<Enrichment>),
    Dropped,
}

/// Drive one batch through the enricher with bounded retries. Only items
/// whose outcome was transient are re-sent; backoff doubles per attempt.
pub async fn enrich_with_retry(enricher: &dyn Enricher, batch: Vec<RawItem>) -> BatchEnrichResult {
    let mut slots: Vec<Slot> = batch.iter().map(|_| Slot::Pending).collect();

    for attempt in 0..MAX_ENRICH_ATTEMPTS {
        let pending: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| matches!(s, Slot::Pending).then_some(i))
            .collect();
        if pending.is_empty() {
            break;
        }
        if attempt > 0 {
            let delay = Duration::from_millis(BACKOFF_BASE_MS * (1u64 << (attempt - 1)));
            tokio::time::sleep(delay).await;
        }

        let t0 = std::time::Instant::now();
        let subset: Vec<RawItem> = pending.iter().map(|&i| batch[i].clone()).collect();
        let outcomes = enricher.enrich_batch(&subset).await;
        histogram!("newsroom_enrich_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        for (&i, outcome) in pending.iter().zip(outcomes) {
            match outcome {
                Ok(enrichment) => slots[i] = Slot::Done(enrichment),
                Err(EnrichError::Permanent(msg)) => {
                    tracing::warn!(id = %batch[i].canonical_id(), %msg, "permanent enrichment failure, dropping");
                    counter!("newsroom_enrich_dropped_total").increment(1);
                    slots[i] = Slot::Dropped;
                }
                Err(EnrichError::Transient(msg)) => {
                    tracing::warn!(id = %batch[i].canonical_id(), %msg, attempt, "transient enrichment failure");
                }
            }
        }
    }

    let mut items = Vec::with_capacity(batch.len());
    let mut dropped = 0usize;
    for (raw, slot) in batch.into_iter().zip(slots) {
        match slot {
            Slot::Done(enrichment) => items.push(EnrichedItem { raw, enrichment }),
            Slot::Dropped => dropped += 1,
            Slot::Pending => {
                tracing::warn!(id = %raw.canonical_id(), "enrichment retries exhausted, dropping");
                counter!("newsroom_enrich_dropped_total").increment(1);
                dropped += 1;
            }
        }
    }
    BatchEnrichResult { items, dropped }
}

// ------------------------------------------------------------
// Gemini-style HTTP provider
// ------------------------------------------------------------

pub struct GeminiEnricher {
    http: reqwest::Client,
    api_key: String,
    model: String,
    fallback_model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ModelResults {
    #[serde(default)]
    results: Vec<ModelResult>,
}

#[derive(Debug, Deserialize)]
struct ModelResult {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    importance: u8,
    #[serde(default)]
    key_entities: Vec<String>,
    #[serde(default)]
    actionable_insight: Option<String>,
}

impl GeminiEnricher {
    pub fn new(api_key: String, http: reqwest::Client) -> Self {
        Self {
            http,
            api_key,
            model: "gemini-3-flash-preview".to_string(),
            fallback_model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn build_prompt(items: &[RawItem]) -> String {
        let items_json: Vec<serde_json::Value> = items
            .iter()
            .map(|it| {
                json!({
                    "id": it.canonical_id().as_str(),
                    "title": it.title,
                    "source": it.source_name,
                    "published_at": it.published_at.to_rfc3339(),
                    "content": it.body_text(),
                })
            })
            .collect();
        format!(
            "You are an expert AI implementation analyst. Analyze the following AI news items.\n\
             INPUT DATA:\n{}\n\
             For each item return an object with fields: id (copied from input), \
             summary (3 concise sentences), tags (list of strings), \
             importance (integer 1-10), key_entities (people/companies/models), \
             actionable_insight (one sentence on what a practitioner should do or know).\n\
             Return a single JSON object: {{\"results\": [ ... ]}}.",
            serde_json::to_string_pretty(&items_json).unwrap_or_else(|_| "[]".into())
        )
    }

    async fn call_model(&self, model: &str, prompt: &str) -> Result<Vec<ModelResult>, EnrichError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "response_mime_type": "application/json" },
        });

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| EnrichError::Transient(format!("{model}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            // Rate limits and server faults are worth retrying; anything the
            // service rejects outright is not.
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(EnrichError::Transient(format!("{model}: {status} {text}")))
            } else {
                Err(EnrichError::Permanent(format!("{model}: {status} {text}")))
            };
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| EnrichError::Transient(format!("{model} decode: {e}")))?;
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or_default();
        let results: ModelResults = serde_json::from_str(text)
            .map_err(|e| EnrichError::Permanent(format!("{model} returned non-JSON payload: {e}")))?;
        Ok(results.results)
    }

    fn sanitize(r: ModelResult) -> Enrichment {
        Enrichment {
            summary: r.summary.trim().to_string(),
            tags: r
                .tags
                .into_iter()
                .map(|t| t.replace(',', "").trim().to_string())
                .filter(|t| !t.is_empty())
                .take(MAX_TAGS)
                .collect(),
            importance: r.importance.clamp(1, 10),
            key_entities: r.key_entities,
            actionable_insight: r.actionable_insight.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[async_trait]
impl Enricher for GeminiEnricher {
    async fn enrich_batch(&self, items: &[RawItem]) -> Vec<ItemOutcome> {
        if items.is_empty() {
            return Vec::new();
        }
        let prompt = Self::build_prompt(items);

        let results = match self.call_model(&self.model, &prompt).await {
            Ok(r) => Ok(r),
            Err(primary_err) => {
                tracing::warn!(error = %primary_err, model = %self.model, "primary model failed, trying fallback");
                self.call_model(&self.fallback_model, &prompt).await
            }
        };

        match results {
            Ok(results) => {
                let mut by_id: std::collections::HashMap<String, ModelResult> = results
                    .into_iter()
                    .map(|r| (r.id.clone(), r))
                    .collect();
                items
                    .iter()
                    .map(|it| {
                        match by_id.remove(it.canonical_id().as_str()) {
                            Some(r) => Ok(Some(Self::sanitize(r))),
                            None => {
                                // The model skipped this id; keep the raw item.
                                tracing::warn!(id = %it.canonical_id(), "model response omitted item");
                                Ok(None)
                            }
                        }
                    })
                    .collect()
            }
            Err(e) => items.iter().map(|_| Err(e.clone())).collect(),
        }
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
