// src/classify.rs
// Rule-based relevance gate. Runs strictly before enrichment so irrelevant
// items never cost a model call. Deterministic given the item's raw payload.

use std::collections::HashMap;

use crate::config::PipelineConfig;
use crate::item::{RawItem, RawPayload, SourceKind};

/// Similarity floor for treating a token window as a mention of a tracked
/// person ("Sam Altman's" vs "Sam Altman").
const ALIAS_SIMILARITY_MIN: f64 = 0.93;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Keep,
    Drop(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Below the duration threshold or platform-flagged as short-form.
    ShortForm,
    /// Mixed-topic feed entry without any configured topic keyword.
    OffTopic,
    /// Person-search result that never actually mentions the person.
    NoPersonMatch,
}

#[derive(Debug, Clone, Default)]
pub struct ClassifyRules {
    min_video_secs: u64,
    /// Per-feed topic keywords, keyed by source name. Empty list keeps all.
    topic_keywords: HashMap<String, Vec<String>>,
    /// Tracked person names + aliases, keyed by canonical person name.
    people_aliases: HashMap<String, Vec<String>>,
}

impl ClassifyRules {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let topic_keywords = config
            .feeds
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    f.topics.iter().map(|t| t.to_lowercase()).collect(),
                )
            })
            .collect();
        let people_aliases = config
            .people
            .iter()
            .map(|p| {
                let mut names = vec![p.name.to_lowercase()];
                names.extend(p.aliases.iter().map(|a| a.to_lowercase()));
                (p.name.clone(), names)
            })
            .collect();
        Self {
            min_video_secs: config.min_video_secs,
            topic_keywords,
            people_aliases,
        }
    }

    #[cfg(test)]
    pub fn for_tests(
        min_video_secs: u64,
        topic_keywords: HashMap<String, Vec<String>>,
        people_aliases: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            min_video_secs,
            topic_keywords,
            people_aliases,
        }
    }
}

pub fn classify(item: &RawItem, rules: &ClassifyRules) -> Classification {
    match &item.raw_payload {
        RawPayload::Video {
            duration_secs,
            is_short,
            matched_person,
            description,
            ..
        } => {
            if *is_short || duration_secs.is_some_and(|d| d < rules.min_video_secs) {
                return Classification::Drop(DropReason::ShortForm);
            }
            if item.source_kind == SourceKind::PersonAppearance {
                if let Some(person) = matched_person {
                    let haystack = format!("{} {}", item.title, description).to_lowercase();
                    let aliases = rules.people_aliases.get(person);
                    let mentioned = aliases.is_none_or(|names| {
                        names.iter().any(|n| text_mentions(&haystack, n))
                    });
                    if !mentioned {
                        return Classification::Drop(DropReason::NoPersonMatch);
                    }
                }
            }
            Classification::Keep
        }
        RawPayload::FeedPost { body } => {
            let keywords = rules
                .topic_keywords
                .get(&item.source_name)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if keywords.is_empty() {
                return Classification::Keep;
            }
            let haystack = format!("{} {}", item.title, body).to_lowercase();
            if keywords.iter().any(|k| haystack.contains(k.as_str())) {
                Classification::Keep
            } else {
                Classification::Drop(DropReason::OffTopic)
            }
        }
    }
}

/// Substring match first; fall back to a Jaro-Winkler pass over token windows
/// of the alias length to catch inflected variants.
fn text_mentions(haystack_lower: &str, alias_lower: &str) -> bool {
    if haystack_lower.contains(alias_lower) {
        return true;
    }
    let alias_words = alias_lower.split_whitespace().count();
    if alias_words == 0 {
        return false;
    }
    let tokens: Vec<&str> = haystack_lower.split_whitespace().collect();
    tokens
        .windows(alias_words)
        .any(|w| strsim::jaro_winkler(&w.join(" "), alias_lower) >= ALIAS_SIMILARITY_MIN)
}
