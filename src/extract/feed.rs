// src/extract/feed.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::config::FeedSource;
use crate::extract::{normalize_text, SourceExtractor};
use crate::item::{RawItem, RawPayload, RunWindow, SourceKind};
use crate::state::KnownIdIndex;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

/// RFC 2822 is the RSS norm; some feeds emit RFC 3339 anyway.
fn parse_entry_date(ts: &str) -> Option<DateTime<Utc>> {
    let unix = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()?
        .unix_timestamp();
    DateTime::<Utc>::from_timestamp(unix, 0)
}

/// Fetches one configured feed endpoint and parses its entries. Feeds are
/// small, so the whole document is read at once — no paging, no early stop.
pub struct FeedExtractor {
    source: FeedSource,
    client: reqwest::Client,
}

impl FeedExtractor {
    pub fn new(source: FeedSource, client: reqwest::Client) -> Self {
        Self { source, client }
    }

    /// Parse entries from raw XML. Split out so tests can feed fixtures
    /// without HTTP.
    pub fn parse_items_from_str(&self, xml: &str, window: &RunWindow) -> Result<Vec<RawItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml for {}", self.source.name))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let Some(url) = it.link.as_deref().map(str::trim).filter(|l| !l.is_empty()) else {
                continue;
            };
            // GUID is the native id; fall back to the link for feeds that
            // omit one. Never the title, which may be edited upstream.
            let native_id = it
                .guid
                .as_ref()
                .and_then(|g| g.value.as_deref())
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .unwrap_or(url)
                .to_string();

            // Entries without a parsable date count as published at run time.
            let published_at = it
                .pub_date
                .as_deref()
                .and_then(parse_entry_date)
                .unwrap_or(window.ceiling);
            if window.is_before_floor(published_at) {
                continue;
            }

            // Prefer full content over the description teaser.
            let body_raw = it
                .content
                .as_deref()
                .or(it.description.as_deref())
                .unwrap_or_default();

            out.push(RawItem {
                source_kind: SourceKind::FeedPost,
                source_name: self.source.name.clone(),
                native_id,
                title: normalize_text(it.title.as_deref().unwrap_or("No Title")),
                url: url.to_string(),
                published_at,
                raw_payload: RawPayload::FeedPost {
                    body: normalize_text(body_raw),
                },
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("newsroom_feed_parse_ms").record(ms);
        counter!("newsroom_feed_entries_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceExtractor for FeedExtractor {
    async fn extract(&self, window: &RunWindow, _known: &KnownIdIndex) -> Result<Vec<RawItem>> {
        let body = self
            .client
            .get(&self.source.url)
            .send()
            .await
            .with_context(|| format!("feed http get: {}", self.source.url))?
            .error_for_status()
            .with_context(|| format!("feed non-2xx: {}", self.source.url))?
            .text()
            .await
            .context("feed http .text()")?;
        self.parse_items_from_str(&body, window)
    }

    fn name(&self) -> String {
        self.source.name.clone()
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
