// src/item.rs
// Core data model: raw ingestion units, canonical ids, enriched records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Closed set of source classes. The tracked source list is fixed and small,
/// so this is an enum rather than an open plugin mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    FeedPost,
    ChannelUpload,
    PersonAppearance,
}

impl SourceKind {
    /// Label used in store payloads and run summaries.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::FeedPost => "Article",
            SourceKind::ChannelUpload | SourceKind::PersonAppearance => "YouTube",
        }
    }
}

/// Source-specific metadata carried alongside an item. Opaque to dedup;
/// consumed by the classifier and the enrichment adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawPayload {
    FeedPost {
        /// Normalized entry body (content > summary > description).
        body: String,
    },
    Video {
        description: String,
        channel_title: String,
        /// Missing when the platform did not return contentDetails.
        duration_secs: Option<u64>,
        is_short: bool,
        /// Tracked person this item was discovered for (person search only).
        matched_person: Option<String>,
    },
}

/// A source-agnostic ingestion unit. Immutable once created by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub source_kind: SourceKind,
    pub source_name: String,
    /// Source-native identifier: feed GUID or video id.
    pub native_id: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub raw_payload: RawPayload,
}

impl RawItem {
    pub fn canonical_id(&self) -> CanonicalId {
        CanonicalId::resolve(self.source_kind, &self.native_id)
    }

    /// Text handed to the enrichment service and the classifier.
    pub fn body_text(&self) -> &str {
        match &self.raw_payload {
            RawPayload::FeedPost { body } => body,
            RawPayload::Video { description, .. } => description,
        }
    }
}

/// Stable cross-source identifier used for dedup and upsert keying.
///
/// Derived from `(source_kind, native_id)` only — never from title or URL,
/// which may change upstream. Both video kinds share the `vid:` namespace:
/// the same video found via a channel listing and via a person search must
/// collapse to one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    pub fn resolve(kind: SourceKind, native_id: &str) -> Self {
        match kind {
            SourceKind::FeedPost => {
                let digest = Sha256::digest(native_id.as_bytes());
                CanonicalId(format!("feed:{digest:x}"))
            }
            SourceKind::ChannelUpload | SourceKind::PersonAppearance => {
                CanonicalId(format!("vid:{native_id}"))
            }
        }
    }

    /// Reconstruct from a stored string (state file, store read path).
    pub fn from_stored(s: impl Into<String>) -> Self {
        CanonicalId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured metadata attached by the enrichment service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub summary: String,
    pub tags: Vec<String>,
    /// Relevance signal, 1..=10.
    pub importance: u8,
    pub key_entities: Vec<String>,
    pub actionable_insight: Option<String>,
}

/// Default importance for items loaded without a model pass (video items and
/// degraded runs).
pub const DEFAULT_IMPORTANCE: u8 = 3;

/// A raw item plus its enrichment. Never mutated after creation; terminal
/// state is either written to the store or dropped before loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedItem {
    pub raw: RawItem,
    /// `None` means the item is loaded unenriched (videos, degraded runs).
    pub enrichment: Option<Enrichment>,
}

impl EnrichedItem {
    pub fn unenriched(raw: RawItem) -> Self {
        Self {
            raw,
            enrichment: None,
        }
    }

    pub fn importance(&self) -> u8 {
        self.enrichment
            .as_ref()
            .map(|e| e.importance)
            .unwrap_or(DEFAULT_IMPORTANCE)
    }
}

/// The time range an extraction pass searches within: `[floor, ceiling]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    pub floor: DateTime<Utc>,
    pub ceiling: DateTime<Utc>,
}

impl RunWindow {
    pub fn new(floor: DateTime<Utc>, ceiling: DateTime<Utc>) -> Self {
        Self { floor, ceiling }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.floor && ts <= self.ceiling
    }

    pub fn is_before_floor(&self, ts: DateTime<Utc>) -> bool {
        ts < self.floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mk_feed_item(native_id: &str, title: &str, url: &str) -> RawItem {
        RawItem {
            source_kind: SourceKind::FeedPost,
            source_name: "Acme Blog".into(),
            native_id: native_id.into(),
            title: title.into(),
            url: url.into(),
            published_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            raw_payload: RawPayload::FeedPost { body: String::new() },
        }
    }

    #[test]
    fn canonical_id_ignores_title_and_url() {
        let a = mk_feed_item("guid-123", "Original title", "https://a.test/1");
        let b = mk_feed_item("guid-123", "Edited title", "https://a.test/1?utm=x");
        assert_eq!(a.canonical_id(), b.canonical_id());
    }

    #[test]
    fn canonical_id_is_stable_across_calls() {
        let id1 = CanonicalId::resolve(SourceKind::FeedPost, "guid-123");
        let id2 = CanonicalId::resolve(SourceKind::FeedPost, "guid-123");
        assert_eq!(id1, id2);
        assert!(id1.as_str().starts_with("feed:"));
    }

    #[test]
    fn video_kinds_share_one_namespace() {
        let via_channel = CanonicalId::resolve(SourceKind::ChannelUpload, "dQw4w9WgXcQ");
        let via_search = CanonicalId::resolve(SourceKind::PersonAppearance, "dQw4w9WgXcQ");
        assert_eq!(via_channel, via_search);
        assert_eq!(via_channel.as_str(), "vid:dQw4w9WgXcQ");
    }

    #[test]
    fn distinct_native_ids_do_not_collide() {
        let a = CanonicalId::resolve(SourceKind::FeedPost, "guid-1");
        let b = CanonicalId::resolve(SourceKind::FeedPost, "guid-2");
        assert_ne!(a, b);
    }

    #[test]
    fn window_membership() {
        let floor = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let ceiling = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        let w = RunWindow::new(floor, ceiling);
        assert!(w.contains(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()));
        assert!(w.is_before_floor(Utc.with_ymd_and_hms(2025, 5, 31, 23, 59, 59).unwrap()));
        assert!(!w.contains(Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap()));
    }
}
