//! Newsroom Pipeline — Binary Entrypoint
//! Runs the pipeline exactly once; the six-hour cadence is the external
//! scheduler's job. Exit code 0 on full or partial success, non-zero when a
//! fatal failure prevented any batch from committing.

use ai_newsroom_pipeline::{bootstrap, pipeline, PipelineConfig};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_newsroom_pipeline=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op when variables come from the scheduler.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = match PipelineConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: {e}");
            std::process::exit(2);
        }
    };

    let deps = bootstrap::build_deps(&config);
    let summary = pipeline::run_pipeline(&config, &deps, None).await;
    println!("{summary}");

    if summary.is_failure() {
        std::process::exit(1);
    }
}
