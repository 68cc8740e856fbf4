// tests/extract_feed.rs
use ai_newsroom_pipeline::config::FeedSource;
use ai_newsroom_pipeline::extract::feed::FeedExtractor;
use ai_newsroom_pipeline::item::{RunWindow, SourceKind};
use chrono::{Duration, TimeZone, Utc};
use std::fs;

fn extractor() -> FeedExtractor {
    FeedExtractor::new(
        FeedSource {
            name: "Acme AI Blog".into(),
            url: "https://acme.test/feed.xml".into(),
            topics: Vec::new(),
        },
        reqwest::Client::new(),
    )
}

#[test]
fn fixture_parses_and_respects_the_window() {
    let xml = fs::read_to_string("tests/fixtures/feed_sample.xml")
        .expect("missing tests/fixtures/feed_sample.xml");

    let ceiling = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
    let window = RunWindow::new(ceiling - Duration::hours(48), ceiling);

    let items = extractor().parse_items_from_str(&xml, &window).expect("feed parse ok");

    // The December 2024 entry falls outside the window.
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.source_kind == SourceKind::FeedPost));
    assert!(items.iter().all(|i| i.source_name == "Acme AI Blog"));
    assert_eq!(items[0].native_id, "acme-2025-06-02-reasoning");

    // Entity scrub + tag strip happened before the body reached the item.
    assert!(items[0].body_text().contains("LLM serving stack"));
    assert!(!items[0].body_text().contains('<'));
}

#[test]
fn canonical_ids_come_from_guids_not_links() {
    let xml = fs::read_to_string("tests/fixtures/feed_sample.xml").unwrap();
    let ceiling = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
    let window = RunWindow::new(ceiling - Duration::hours(48), ceiling);

    let items = extractor().parse_items_from_str(&xml, &window).unwrap();
    let moved_link = items[0].clone();

    // A republished entry with a changed link keeps its identity.
    let mut altered = moved_link.clone();
    altered.url = "https://acme.test/posts/reasoning-stack-v2".into();
    altered.title = "Introducing the Acme reasoning stack (updated)".into();
    assert_eq!(moved_link.canonical_id(), altered.canonical_id());
}
