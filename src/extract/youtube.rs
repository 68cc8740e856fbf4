// src/extract/youtube.rs
// Video platform access: channel uploads + person appearance search, both
// paged newest-first and wrapped by the early-stop scanner.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::{ChannelSource, PersonSource};
use crate::extract::early_stop::{scan_paged, Page};
use crate::extract::SourceExtractor;
use crate::item::{RawItem, RawPayload, RunWindow, SourceKind};
use crate::state::KnownIdIndex;

const PLAYLIST_PAGE_SIZE: u32 = 50;
const SEARCH_PAGE_SIZE: u32 = 25;

/// One video as the platform reports it, before mapping to a `RawItem`.
#[derive(Debug, Clone)]
pub struct Video {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
    pub duration_secs: Option<u64>,
    pub is_short: bool,
}

pub struct VideoPage {
    pub videos: Vec<Video>,
    pub next_cursor: Option<String>,
}

/// Narrow contract over the video platform. Every call is read-only and
/// paged newest-first where applicable.
#[async_trait]
pub trait VideoApi: Send + Sync {
    /// `@Handle` → channel id, when the platform knows the handle.
    async fn resolve_channel(&self, handle: &str) -> Result<Option<String>>;
    /// Channel id → its uploads playlist id.
    async fn uploads_playlist(&self, channel_id: &str) -> Result<Option<String>>;
    async fn playlist_page(&self, playlist_id: &str, cursor: Option<String>) -> Result<VideoPage>;
    async fn search_page(&self, query: &str, cursor: Option<String>) -> Result<VideoPage>;
}

// ------------------------------------------------------------
// HTTP implementation (YouTube Data API v3 shapes)
// ------------------------------------------------------------

pub struct HttpVideoApi {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HttpVideoApi {
    pub fn new(api_key: String, http: reqwest::Client) -> Self {
        Self {
            http,
            api_key,
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
        }
    }

    /// Point at a local stub in tests.
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("video api get {path}"))?
            .error_for_status()
            .with_context(|| format!("video api non-2xx {path}"))?;
        resp.json().await.with_context(|| format!("video api decode {path}"))
    }

    /// Durations come from a second endpoint; one call per page of ids.
    async fn durations(&self, ids: &[String]) -> Result<std::collections::HashMap<String, u64>> {
        if ids.is_empty() {
            return Ok(Default::default());
        }
        let csv = ids.join(",");
        let resp: VideosResponse = self
            .get_json("videos", &[("part", "contentDetails"), ("id", csv.as_str())])
            .await?;
        Ok(resp
            .items
            .into_iter()
            .filter_map(|v| {
                let secs = parse_iso8601_duration(&v.content_details.duration)?;
                Some((v.id, secs))
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Snippet,
    #[serde(rename = "contentDetails")]
    content_details: PlaylistContentDetails,
}

#[derive(Debug, Deserialize)]
struct PlaylistContentDetails {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
    #[serde(rename = "publishedAt")]
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoDetailsItem>,
}

#[derive(Debug, Deserialize)]
struct VideoDetailsItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: VideoContentDetails,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: String,
}

fn parse_published_at(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// ISO 8601 duration as the platform emits it: `PT1H2M3S`, `P1DT2H`, `PT45S`.
pub fn parse_iso8601_duration(s: &str) -> Option<u64> {
    static RE: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").unwrap()
    });
    let caps = re.captures(s)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let total = part(1) * 86_400 + part(2) * 3_600 + part(3) * 60 + part(4);
    if total == 0 && !s.contains(['D', 'H', 'M', 'S']) {
        return None;
    }
    Some(total)
}

#[async_trait]
impl VideoApi for HttpVideoApi {
    async fn resolve_channel(&self, handle: &str) -> Result<Option<String>> {
        let resp: ChannelsResponse = self
            .get_json("channels", &[("part", "id"), ("forHandle", handle)])
            .await?;
        Ok(resp.items.into_iter().next().map(|c| c.id))
    }

    async fn uploads_playlist(&self, channel_id: &str) -> Result<Option<String>> {
        let resp: ChannelsResponse = self
            .get_json("channels", &[("part", "contentDetails"), ("id", channel_id)])
            .await?;
        Ok(resp
            .items
            .into_iter()
            .next()
            .and_then(|c| c.content_details)
            .and_then(|cd| cd.related_playlists.uploads))
    }

    async fn playlist_page(&self, playlist_id: &str, cursor: Option<String>) -> Result<VideoPage> {
        let page_size = PLAYLIST_PAGE_SIZE.to_string();
        let mut query = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = cursor.as_deref() {
            query.push(("pageToken", token));
        }
        let resp: PlaylistItemsResponse = self.get_json("playlistItems", &query).await?;

        let ids: Vec<String> = resp
            .items
            .iter()
            .map(|i| i.content_details.video_id.clone())
            .collect();
        let durations = self.durations(&ids).await?;

        let videos = resp
            .items
            .into_iter()
            .map(|i| {
                let duration_secs = durations.get(&i.content_details.video_id).copied();
                Video {
                    video_id: i.content_details.video_id,
                    title: i.snippet.title,
                    description: i.snippet.description,
                    channel_title: i.snippet.channel_title,
                    published_at: parse_published_at(&i.snippet.published_at),
                    duration_secs,
                    is_short: false,
                }
            })
            .collect();
        Ok(VideoPage {
            videos,
            next_cursor: resp.next_page_token,
        })
    }

    async fn search_page(&self, query_str: &str, cursor: Option<String>) -> Result<VideoPage> {
        let page_size = SEARCH_PAGE_SIZE.to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("q", query_str),
            ("type", "video"),
            ("order", "date"),
            ("relevanceLanguage", "en"),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = cursor.as_deref() {
            query.push(("pageToken", token));
        }
        let resp: SearchResponse = self.get_json("search", &query).await?;

        let mut hits: Vec<(String, Snippet)> = Vec::with_capacity(resp.items.len());
        for item in resp.items {
            if let Some(id) = item.id.video_id {
                hits.push((id, item.snippet));
            }
        }
        let ids: Vec<String> = hits.iter().map(|(id, _)| id.clone()).collect();
        let durations = self.durations(&ids).await?;

        let videos = hits
            .into_iter()
            .map(|(video_id, snippet)| {
                let duration_secs = durations.get(&video_id).copied();
                Video {
                    video_id,
                    title: snippet.title,
                    description: snippet.description,
                    channel_title: snippet.channel_title,
                    published_at: parse_published_at(&snippet.published_at),
                    duration_secs,
                    is_short: false,
                }
            })
            .collect();
        Ok(VideoPage {
            videos,
            next_cursor: resp.next_page_token,
        })
    }
}

// ------------------------------------------------------------
// Extractors
// ------------------------------------------------------------

pub fn video_to_item(
    v: Video,
    kind: SourceKind,
    source_name: &str,
    matched_person: Option<&str>,
) -> RawItem {
    RawItem {
        source_kind: kind,
        source_name: source_name.to_string(),
        url: format!("https://www.youtube.com/watch?v={}", v.video_id),
        native_id: v.video_id,
        title: v.title,
        published_at: v.published_at,
        raw_payload: RawPayload::Video {
            description: v.description,
            channel_title: v.channel_title,
            duration_secs: v.duration_secs,
            is_short: v.is_short,
            matched_person: matched_person.map(str::to_string),
        },
    }
}

/// Pages one tracked channel's uploads playlist, newest first, under the
/// early-stop scanner.
pub struct ChannelUploadExtractor {
    channel: ChannelSource,
    api: Arc<dyn VideoApi>,
}

impl ChannelUploadExtractor {
    pub fn new(channel: ChannelSource, api: Arc<dyn VideoApi>) -> Self {
        Self { channel, api }
    }
}

#[async_trait]
impl SourceExtractor for ChannelUploadExtractor {
    async fn extract(&self, window: &RunWindow, known: &KnownIdIndex) -> Result<Vec<RawItem>> {
        let channel_id = match &self.channel.channel_id {
            Some(id) => id.clone(),
            None => {
                let handle = self
                    .channel
                    .handle
                    .as_deref()
                    .with_context(|| format!("channel {} has neither id nor handle", self.channel.name))?;
                self.api
                    .resolve_channel(handle)
                    .await?
                    .with_context(|| format!("could not resolve handle {handle}"))?
            }
        };
        let playlist = self
            .api
            .uploads_playlist(&channel_id)
            .await?
            .with_context(|| format!("channel {channel_id} has no uploads playlist"))?;

        let api = &self.api;
        let playlist = playlist.as_str();
        let name = self.channel.name.as_str();
        scan_paged(
            |cursor| async move {
                let page = api.playlist_page(playlist, cursor).await?;
                Ok(Page {
                    items: page
                        .videos
                        .into_iter()
                        .map(|v| video_to_item(v, SourceKind::ChannelUpload, name, None))
                        .collect(),
                    next_cursor: page.next_cursor,
                })
            },
            window,
            known,
        )
        .await
    }

    fn name(&self) -> String {
        format!("yt-channel:{}", self.channel.name)
    }
}

/// Issues a paged interview search for one tracked person, newest first,
/// under the early-stop scanner.
pub struct PersonSearchExtractor {
    person: PersonSource,
    api: Arc<dyn VideoApi>,
}

impl PersonSearchExtractor {
    pub fn new(person: PersonSource, api: Arc<dyn VideoApi>) -> Self {
        Self { person, api }
    }

    /// Quoted name keeps the search high-signal; interviews and podcasts are
    /// what the tracked-people feature is for.
    fn query(&self) -> String {
        format!("\"{}\" interview", self.person.name)
    }
}

#[async_trait]
impl SourceExtractor for PersonSearchExtractor {
    async fn extract(&self, window: &RunWindow, known: &KnownIdIndex) -> Result<Vec<RawItem>> {
        let api = &self.api;
        let query = self.query();
        let query = query.as_str();
        let name = self.person.name.as_str();
        scan_paged(
            |cursor| async move {
                let page = api.search_page(query, cursor).await?;
                Ok(Page {
                    items: page
                        .videos
                        .into_iter()
                        .map(|v| video_to_item(v, SourceKind::PersonAppearance, name, Some(name)))
                        .collect(),
                    next_cursor: page.next_cursor,
                })
            },
            window,
            known,
        )
        .await
    }

    fn name(&self) -> String {
        format!("yt-person:{}", self.person.name)
    }
}
