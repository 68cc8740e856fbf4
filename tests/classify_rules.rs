// tests/classify_rules.rs
// Classifier rules derived from real config: topic gating for mixed feeds,
// short-form exclusion, and tracked-person mention checks.

use std::path::PathBuf;
use std::time::Duration;

use ai_newsroom_pipeline::classify::{classify, Classification, ClassifyRules, DropReason};
use ai_newsroom_pipeline::config::{FeedSource, PersonSource, PipelineConfig};
use ai_newsroom_pipeline::item::{RawItem, RawPayload, SourceKind};
use chrono::{DateTime, Utc};

fn config() -> PipelineConfig {
    PipelineConfig {
        feeds: vec![
            FeedSource {
                name: "Acme AI Blog".into(),
                url: "https://acme.test/feed.xml".into(),
                topics: Vec::new(),
            },
            FeedSource {
                name: "General Eng Blog".into(),
                url: "https://eng.test/rss".into(),
                topics: vec!["AI".into(), "machine learning".into(), "LLM".into()],
            },
        ],
        channels: Vec::new(),
        people: vec![PersonSource {
            name: "Jane Doe".into(),
            aliases: vec!["Dr. Doe".into()],
        }],
        youtube_api_key: None,
        gemini_api_key: None,
        notion: None,
        dry_run: true,
        window_hours_override: None,
        backfill_cutoff: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc),
        state_path: PathBuf::from("state/state.json"),
        run_budget: Duration::from_secs(1200),
        max_people_per_run: 3,
        min_video_secs: 60,
    }
}

fn feed_post(source: &str, title: &str, body: &str) -> RawItem {
    RawItem {
        source_kind: SourceKind::FeedPost,
        source_name: source.into(),
        native_id: title.into(),
        title: title.into(),
        url: "https://x.test/p".into(),
        published_at: Utc::now(),
        raw_payload: RawPayload::FeedPost { body: body.into() },
    }
}

fn appearance(title: &str, description: &str, duration: Option<u64>, is_short: bool) -> RawItem {
    RawItem {
        source_kind: SourceKind::PersonAppearance,
        source_name: "Jane Doe".into(),
        native_id: "vid1".into(),
        title: title.into(),
        url: "https://www.youtube.com/watch?v=vid1".into(),
        published_at: Utc::now(),
        raw_payload: RawPayload::Video {
            description: description.into(),
            channel_title: "Pod".into(),
            duration_secs: duration,
            is_short,
            matched_person: Some("Jane Doe".into()),
        },
    }
}

#[test]
fn mixed_feed_needs_a_topic_keyword_dedicated_feed_does_not() {
    let rules = ClassifyRules::from_config(&config());

    let relevant = feed_post("General Eng Blog", "Faster LLM inference", "notes");
    let irrelevant = feed_post("General Eng Blog", "Postgres upgrade diary", "sql only");
    let dedicated = feed_post("Acme AI Blog", "Postgres upgrade diary", "sql only");

    assert_eq!(classify(&relevant, &rules), Classification::Keep);
    assert_eq!(
        classify(&irrelevant, &rules),
        Classification::Drop(DropReason::OffTopic)
    );
    assert_eq!(classify(&dedicated, &rules), Classification::Keep);
}

#[test]
fn keyword_match_is_case_insensitive() {
    let rules = ClassifyRules::from_config(&config());
    let item = feed_post("General Eng Blog", "our machine LEARNING platform", "");
    assert_eq!(classify(&item, &rules), Classification::Keep);
}

#[test]
fn shorts_are_dropped_before_any_model_call() {
    let rules = ClassifyRules::from_config(&config());
    let short = appearance("Jane Doe in 30 seconds", "", Some(28), false);
    let flagged = appearance("Jane Doe clip", "", None, true);
    assert_eq!(
        classify(&short, &rules),
        Classification::Drop(DropReason::ShortForm)
    );
    assert_eq!(
        classify(&flagged, &rules),
        Classification::Drop(DropReason::ShortForm)
    );
}

#[test]
fn appearance_must_mention_the_person_alias_counts() {
    let rules = ClassifyRules::from_config(&config());

    let by_name = appearance("Interview with Jane Doe", "", Some(2400), false);
    let by_alias = appearance("A conversation with Dr. Doe", "", Some(2400), false);
    let unrelated = appearance("Top 10 keyboards", "ranked by feel", Some(2400), false);

    assert_eq!(classify(&by_name, &rules), Classification::Keep);
    assert_eq!(classify(&by_alias, &rules), Classification::Keep);
    assert_eq!(
        classify(&unrelated, &rules),
        Classification::Drop(DropReason::NoPersonMatch)
    );
}
