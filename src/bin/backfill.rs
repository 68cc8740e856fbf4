//! One-off backfill: the identical pipeline, run over an explicit historical
//! window instead of the rolling default. Start date comes from the first
//! CLI argument or `NEWSROOM_BACKFILL_FROM` (RFC 3339 or `YYYY-MM-DD`); the
//! documented cutoff still applies as an absolute floor.

use ai_newsroom_pipeline::{bootstrap, pipeline, PipelineConfig};
use chrono::{DateTime, NaiveDate, Utc};
use tracing_subscriber::EnvFilter;

fn parse_start(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_newsroom_pipeline=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();

    let from_arg = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("NEWSROOM_BACKFILL_FROM").ok());
    let Some(from_str) = from_arg else {
        eprintln!("usage: backfill <start: RFC3339 or YYYY-MM-DD>");
        std::process::exit(2);
    };
    let Some(from) = parse_start(&from_str) else {
        eprintln!("fatal: unparsable backfill start {from_str}");
        std::process::exit(2);
    };

    let config = match PipelineConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: {e}");
            std::process::exit(2);
        }
    };

    let window = config.backfill_window(from, Utc::now());
    tracing::info!(floor = %window.floor, ceiling = %window.ceiling, "backfill window");

    let deps = bootstrap::build_deps(&config);
    let summary = pipeline::run_pipeline(&config, &deps, Some(window)).await;
    println!("{summary}");

    if summary.is_failure() {
        std::process::exit(1);
    }
}
