// src/config.rs
// Run parameters: tracked source lists from config/*.toml, credentials and
// knobs from the environment. A missing required parameter is a fatal
// `PipelineError::Config` raised before any extraction starts.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;

use crate::error::PipelineError;
use crate::item::RunWindow;
use crate::state::RunState;

const ENV_CONFIG_DIR: &str = "NEWSROOM_CONFIG_DIR";
const ENV_STATE_PATH: &str = "NEWSROOM_STATE_PATH";
const ENV_WINDOW_HOURS: &str = "NEWSROOM_WINDOW_HOURS";
const ENV_BACKFILL_CUTOFF: &str = "NEWSROOM_BACKFILL_CUTOFF";
const ENV_RUN_BUDGET_SECS: &str = "NEWSROOM_RUN_BUDGET_SECS";
const ENV_MAX_PEOPLE: &str = "NEWSROOM_MAX_PEOPLE_PER_RUN";
const ENV_MIN_VIDEO_SECS: &str = "NEWSROOM_MIN_VIDEO_SECS";

/// Absolute floor for first-ever runs: nothing older than this is ingested.
pub const DEFAULT_BACKFILL_CUTOFF: &str = "2024-01-01T00:00:00Z";

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    /// Topic keywords for mixed-topic feeds; empty keeps everything.
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSource {
    pub name: String,
    /// `@Handle` form; resolved to a channel id on first use.
    pub handle: Option<String>,
    pub channel_id: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonSource {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct NotionParams {
    pub token: String,
    pub database_id: String,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub feeds: Vec<FeedSource>,
    pub channels: Vec<ChannelSource>,
    pub people: Vec<PersonSource>,
    pub youtube_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub notion: Option<NotionParams>,
    /// Extraction + enrichment run, store writes and state saves are skipped.
    pub dry_run: bool,
    /// Optional rolling-window override for the run-once entry point.
    pub window_hours_override: Option<i64>,
    pub backfill_cutoff: DateTime<Utc>,
    pub state_path: PathBuf,
    /// Run-level deadline; expired budget falls through to loading.
    pub run_budget: Duration,
    pub max_people_per_run: usize,
    /// Videos shorter than this are treated as short-form and dropped.
    pub min_video_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
struct FeedsFile {
    #[serde(default)]
    feeds: Vec<FeedSource>,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelsFile {
    #[serde(default)]
    channels: Vec<ChannelSource>,
}

#[derive(Debug, Default, Deserialize)]
struct PeopleFile {
    #[serde(default)]
    people: Vec<PersonSource>,
}

impl PipelineConfig {
    /// Load from `$NEWSROOM_CONFIG_DIR` (default `config/`) + environment.
    pub fn load() -> std::result::Result<Self, PipelineError> {
        let dir = std::env::var(ENV_CONFIG_DIR).unwrap_or_else(|_| "config".to_string());
        Self::load_from(Path::new(&dir))
    }

    pub fn load_from(dir: &Path) -> std::result::Result<Self, PipelineError> {
        let feeds = read_file::<FeedsFile>(&dir.join("sources.toml"), true)
            .map_err(|e| PipelineError::Config(format!("{e:#}")))?
            .feeds;
        let channels = read_file::<ChannelsFile>(&dir.join("channels.toml"), false)
            .map_err(|e| PipelineError::Config(format!("{e:#}")))?
            .channels;
        let people = read_file::<PeopleFile>(&dir.join("people.toml"), false)
            .map_err(|e| PipelineError::Config(format!("{e:#}")))?
            .people;

        let dry_run = std::env::var("DRY_RUN")
            .map(|v| v.to_ascii_lowercase() != "false")
            .unwrap_or(true);

        let notion = match (
            non_empty_env("NOTION_TOKEN"),
            non_empty_env("NOTION_DATABASE_ID"),
        ) {
            (Some(token), Some(database_id)) => Some(NotionParams { token, database_id }),
            (None, None) => None,
            _ => {
                return Err(PipelineError::Config(
                    "NOTION_TOKEN and NOTION_DATABASE_ID must be set together".into(),
                ))
            }
        };
        if !dry_run && notion.is_none() {
            return Err(PipelineError::Config(
                "destination store not configured (set NOTION_TOKEN and NOTION_DATABASE_ID, or DRY_RUN=true)"
                    .into(),
            ));
        }

        let backfill_cutoff = match std::env::var(ENV_BACKFILL_CUTOFF) {
            Ok(s) => parse_rfc3339(&s).ok_or_else(|| {
                PipelineError::Config(format!("{ENV_BACKFILL_CUTOFF} is not RFC 3339: {s}"))
            })?,
            Err(_) => parse_rfc3339(DEFAULT_BACKFILL_CUTOFF)
                .expect("default backfill cutoff is valid RFC 3339"),
        };

        let window_hours_override = match std::env::var(ENV_WINDOW_HOURS) {
            Ok(s) => Some(s.parse::<i64>().map_err(|_| {
                PipelineError::Config(format!("{ENV_WINDOW_HOURS} is not an integer: {s}"))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            feeds,
            channels,
            people,
            youtube_api_key: non_empty_env("YOUTUBE_API_KEY"),
            gemini_api_key: non_empty_env("GEMINI_API_KEY"),
            notion,
            dry_run,
            window_hours_override,
            backfill_cutoff,
            state_path: std::env::var(ENV_STATE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("state/state.json")),
            run_budget: Duration::from_secs(env_u64(ENV_RUN_BUDGET_SECS, 20 * 60)),
            max_people_per_run: env_u64(ENV_MAX_PEOPLE, 3) as usize,
            min_video_secs: env_u64(ENV_MIN_VIDEO_SECS, 60),
        })
    }

    /// Rolling window for scheduled runs:
    /// `[last_successful_run_or_backfill_cutoff, now]`, with the optional
    /// hours override taking precedence.
    pub fn run_window(&self, state: &RunState, now: DateTime<Utc>) -> RunWindow {
        let floor = match self.window_hours_override {
            Some(hours) => now - ChronoDuration::hours(hours),
            None => state.last_run_at.unwrap_or(self.backfill_cutoff),
        };
        RunWindow::new(floor.max(self.backfill_cutoff), now)
    }

    /// Explicit historical window for the backfill entry point. The absolute
    /// cutoff still applies as a floor.
    pub fn backfill_window(&self, from: DateTime<Utc>, now: DateTime<Utc>) -> RunWindow {
        RunWindow::new(from.max(self.backfill_cutoff), now)
    }
}

fn read_file<T: serde::de::DeserializeOwned + Default>(path: &Path, required: bool) -> Result<T> {
    if !path.exists() {
        if required {
            anyhow::bail!("missing required config file {}", path.display());
        }
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_feed_section() {
        let toml = r#"
            [[feeds]]
            name = "Acme AI Blog"
            url = "https://acme.test/feed.xml"
            topics = ["ai", "llm"]

            [[feeds]]
            name = "General Eng Blog"
            url = "https://eng.test/rss"
        "#;
        let feeds = toml::from_str::<FeedsFile>(toml).unwrap().feeds;
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].topics, vec!["ai", "llm"]);
        assert!(feeds[1].topics.is_empty());
    }

    #[test]
    fn parses_channels_with_enabled_default() {
        let toml = r#"
            [[channels]]
            name = "Acme Research"
            handle = "@AcmeResearch"

            [[channels]]
            name = "Old Channel"
            channel_id = "UC123"
            enabled = false
        "#;
        let channels = toml::from_str::<ChannelsFile>(toml).unwrap().channels;
        assert!(channels[0].enabled);
        assert!(!channels[1].enabled);
    }

    #[test]
    fn window_floor_never_precedes_cutoff() {
        let cfg = test_config();
        let now = Utc::now();
        let state = RunState::default();
        let w = cfg.run_window(&state, now);
        assert_eq!(w.floor, cfg.backfill_cutoff);
        assert_eq!(w.ceiling, now);

        let early = cfg.backfill_window(cfg.backfill_cutoff - ChronoDuration::days(365), now);
        assert_eq!(early.floor, cfg.backfill_cutoff);
    }

    #[test]
    fn window_uses_last_run_when_present() {
        let cfg = test_config();
        let now = Utc::now();
        let mut state = RunState::default();
        let last = now - ChronoDuration::hours(6);
        state.mark_run_complete(last);
        let w = cfg.run_window(&state, now);
        assert_eq!(w.floor, last);
    }

    #[serial_test::serial]
    #[test]
    fn load_reads_config_dir_and_env_knobs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("sources.toml"),
            r#"
                [[feeds]]
                name = "Acme AI Blog"
                url = "https://acme.test/feed.xml"
            "#,
        )
        .unwrap();

        std::env::remove_var("NOTION_TOKEN");
        std::env::remove_var("NOTION_DATABASE_ID");
        std::env::remove_var("DRY_RUN");
        std::env::set_var(ENV_WINDOW_HOURS, "12");
        std::env::set_var(ENV_BACKFILL_CUTOFF, "2025-03-01T00:00:00Z");

        let cfg = PipelineConfig::load_from(tmp.path()).unwrap();
        assert_eq!(cfg.feeds.len(), 1);
        assert!(cfg.channels.is_empty());
        assert!(cfg.dry_run, "DRY_RUN defaults to true");
        assert_eq!(cfg.window_hours_override, Some(12));
        assert_eq!(cfg.backfill_cutoff, parse_rfc3339("2025-03-01T00:00:00Z").unwrap());

        std::env::remove_var(ENV_WINDOW_HOURS);
        std::env::remove_var(ENV_BACKFILL_CUTOFF);
    }

    #[serial_test::serial]
    #[test]
    fn live_run_without_store_credentials_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("sources.toml"),
            r#"
                [[feeds]]
                name = "Acme AI Blog"
                url = "https://acme.test/feed.xml"
            "#,
        )
        .unwrap();

        std::env::remove_var("NOTION_TOKEN");
        std::env::remove_var("NOTION_DATABASE_ID");
        std::env::set_var("DRY_RUN", "false");

        let err = PipelineConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        std::env::remove_var("DRY_RUN");
    }

    #[test]
    fn missing_sources_file_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            feeds: Vec::new(),
            channels: Vec::new(),
            people: Vec::new(),
            youtube_api_key: None,
            gemini_api_key: None,
            notion: None,
            dry_run: true,
            window_hours_override: None,
            backfill_cutoff: parse_rfc3339(DEFAULT_BACKFILL_CUTOFF).unwrap(),
            state_path: PathBuf::from("state/state.json"),
            run_budget: Duration::from_secs(1200),
            max_people_per_run: 3,
            min_video_secs: 60,
        }
    }
}
