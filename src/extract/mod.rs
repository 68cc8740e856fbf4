// src/extract/mod.rs
pub mod early_stop;
pub mod feed;
pub mod youtube;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics::counter;
use tokio::time::timeout;

use crate::error::PipelineError;
use crate::item::{RawItem, RunWindow};
use crate::state::KnownIdIndex;

/// Shared capability of the three source classes: produce raw items for a
/// named source within a run window. The known-id snapshot is passed down so
/// paged sources can stop early.
#[async_trait::async_trait]
pub trait SourceExtractor: Send + Sync {
    async fn extract(&self, window: &RunWindow, known: &KnownIdIndex) -> Result<Vec<RawItem>>;
    fn name(&self) -> String;
}

/// Run all extractors concurrently; each populates its own output vector.
/// A failing source is logged and skipped — it never aborts its siblings.
/// Sources still pending when `budget` expires are abandoned.
pub async fn extract_all(
    extractors: &[Arc<dyn SourceExtractor>],
    window: RunWindow,
    known: Arc<KnownIdIndex>,
    budget: Duration,
) -> Vec<RawItem> {
    let mut handles = Vec::with_capacity(extractors.len());
    for ex in extractors {
        let ex = Arc::clone(ex);
        let known = Arc::clone(&known);
        handles.push(tokio::spawn(async move {
            let name = ex.name();
            match timeout(budget, ex.extract(&window, &known)).await {
                Ok(Ok(items)) => {
                    tracing::info!(source = %name, count = items.len(), "source extracted");
                    items
                }
                Ok(Err(e)) => {
                    let err = PipelineError::TransientSource {
                        src: name.clone(),
                        message: format!("{e:#}"),
                    };
                    tracing::warn!(error = %err, "skipping source");
                    counter!("newsroom_source_errors_total").increment(1);
                    Vec::new()
                }
                Err(_) => {
                    tracing::warn!(source = %name, "source abandoned at run deadline");
                    counter!("newsroom_source_errors_total").increment(1);
                    Vec::new()
                }
            }
        }));
    }

    let mut merged = Vec::new();
    for h in handles {
        if let Ok(mut items) = h.await {
            merged.append(&mut items);
        }
    }
    counter!("newsroom_extracted_total").increment(merged.len() as u64);
    merged
}

/// Normalize source text: entity decode, strip tags, unify quotes, collapse
/// whitespace. Capped so a pathological entry cannot blow up model requests.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap: 10_000 chars (plenty for a summary)
    if out.chars().count() > 10_000 {
        out = out.chars().take(10_000).collect();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_tags_and_entities() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b></p>  ";
        assert_eq!(normalize_text(s), "Hello, world");
    }

    #[test]
    fn normalize_unifies_curly_quotes() {
        let s = "\u{201C}quoted\u{201D} and \u{2018}single\u{2019}";
        assert_eq!(normalize_text(s), r#""quoted" and 'single'"#);
    }
}
