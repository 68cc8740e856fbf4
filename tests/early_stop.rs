// tests/early_stop.rs
// Early-stop behavior through a real extractor and a fake platform: page
// requests must be bounded by the number of new items, never by channel
// history.

use std::sync::Arc;

use ai_newsroom_pipeline::config::ChannelSource;
use ai_newsroom_pipeline::extract::youtube::{
    ChannelUploadExtractor, Video, VideoApi, VideoPage,
};
use ai_newsroom_pipeline::extract::SourceExtractor;
use ai_newsroom_pipeline::item::{CanonicalId, RunWindow, SourceKind};
use ai_newsroom_pipeline::state::KnownIdIndex;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

fn video(id: &str, age_hours: i64, now: DateTime<Utc>) -> Video {
    Video {
        video_id: id.into(),
        title: format!("Video {id}"),
        description: String::new(),
        channel_title: "Acme Research".into(),
        published_at: now - Duration::hours(age_hours),
        duration_secs: Some(1200),
        is_short: false,
    }
}

/// Serves a fixed sequence of playlist pages and counts requests.
struct FakeVideoApi {
    pages: Vec<Vec<Video>>,
    page_requests: Mutex<usize>,
}

impl FakeVideoApi {
    fn new(pages: Vec<Vec<Video>>) -> Self {
        Self {
            pages,
            page_requests: Mutex::new(0),
        }
    }

    fn requests(&self) -> usize {
        *self.page_requests.lock()
    }
}

#[async_trait]
impl VideoApi for FakeVideoApi {
    async fn resolve_channel(&self, _handle: &str) -> Result<Option<String>> {
        Ok(Some("UC-acme".into()))
    }

    async fn uploads_playlist(&self, _channel_id: &str) -> Result<Option<String>> {
        Ok(Some("UU-acme".into()))
    }

    async fn playlist_page(&self, _playlist: &str, cursor: Option<String>) -> Result<VideoPage> {
        *self.page_requests.lock() += 1;
        let idx: usize = cursor.as_deref().map_or(0, |c| c.parse().unwrap());
        let videos = self.pages.get(idx).cloned().unwrap_or_default();
        let next_cursor = (idx + 1 < self.pages.len()).then(|| (idx + 1).to_string());
        Ok(VideoPage { videos, next_cursor })
    }

    async fn search_page(&self, _q: &str, _cursor: Option<String>) -> Result<VideoPage> {
        unreachable!("channel extractor never searches");
    }
}

fn channel_extractor(api: Arc<FakeVideoApi>) -> ChannelUploadExtractor {
    ChannelUploadExtractor::new(
        ChannelSource {
            name: "Acme Research".into(),
            handle: Some("@AcmeResearch".into()),
            channel_id: None,
            enabled: true,
        },
        api,
    )
}

fn known(ids: &[&str]) -> KnownIdIndex {
    ids.iter()
        .map(|id| CanonicalId::resolve(SourceKind::ChannelUpload, id))
        .collect()
}

#[tokio::test]
async fn first_page_with_known_tail_stops_the_scan() {
    // Listing newest-first: [new1, new2, old1(known), old2(known), old3(known)].
    let now = Utc::now();
    let api = Arc::new(FakeVideoApi::new(vec![
        vec![
            video("new1", 1, now),
            video("new2", 2, now),
            video("old1", 30, now),
            video("old2", 40, now),
            video("old3", 50, now),
        ],
        vec![video("old4", 60, now)],
    ]));
    let window = RunWindow::new(now - Duration::hours(24), now);
    let index = known(&["old1", "old2", "old3", "old4"]);

    let items = channel_extractor(Arc::clone(&api))
        .extract(&window, &index)
        .await
        .unwrap();

    assert_eq!(api.requests(), 1, "must never request the all-old page");
    let ids: Vec<&str> = items.iter().map(|i| i.native_id.as_str()).collect();
    assert_eq!(ids, vec!["new1", "new2"]);
}

#[tokio::test]
async fn page_requests_scale_with_new_items_not_history() {
    // M = 7 new items across pages of 3, then a deep known history. The
    // scanner must fetch ceil(M / page_size) + 1 pages at most.
    let now = Utc::now();
    let mut pages: Vec<Vec<Video>> = vec![
        (0..3).map(|i| video(&format!("n{i}"), 1, now)).collect(),
        (3..6).map(|i| video(&format!("n{i}"), 2, now)).collect(),
        vec![video("n6", 3, now), video("k0", 48, now), video("k1", 49, now)],
    ];
    // A long tail of known-old pages that must never be touched.
    for p in 0..20 {
        pages.push(vec![video(&format!("k{}", p + 2), 72, now)]);
    }
    let known_ids: Vec<String> = (0..22).map(|i| format!("k{i}")).collect();
    let known_refs: Vec<&str> = known_ids.iter().map(String::as_str).collect();

    let api = Arc::new(FakeVideoApi::new(pages));
    let window = RunWindow::new(now - Duration::hours(24), now);
    let index = known(&known_refs);

    let items = channel_extractor(Arc::clone(&api))
        .extract(&window, &index)
        .await
        .unwrap();

    assert_eq!(items.len(), 7);
    assert_eq!(api.requests(), 3); // ceil(7/3) = 3, stop fires inside page 3
}
