// src/bootstrap.rs
// Builds the pipeline's external collaborators from config: one extractor
// per tracked source, an enricher, and the destination store. Anything
// without credentials degrades to a disabled/absent collaborator instead of
// failing the run (dry runs and partial setups stay useful).

use std::sync::Arc;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::enrich::{DisabledEnricher, Enricher, GeminiEnricher};
use crate::extract::feed::FeedExtractor;
use crate::extract::youtube::{
    ChannelUploadExtractor, HttpVideoApi, PersonSearchExtractor, VideoApi,
};
use crate::extract::SourceExtractor;
use crate::load::notion::NotionStore;
use crate::load::ContentStore;
use crate::pipeline::PipelineDeps;

pub fn build_deps(config: &PipelineConfig) -> PipelineDeps {
    let http = reqwest::Client::builder()
        .user_agent("ai-newsroom-pipeline/0.1")
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(15))
        .build()
        .expect("reqwest client");

    let mut extractors: Vec<Arc<dyn SourceExtractor>> = Vec::new();
    for feed in &config.feeds {
        extractors.push(Arc::new(FeedExtractor::new(feed.clone(), http.clone())));
    }

    match &config.youtube_api_key {
        Some(key) => {
            let api: Arc<dyn VideoApi> = Arc::new(HttpVideoApi::new(key.clone(), http.clone()));
            for channel in config.channels.iter().filter(|c| c.enabled) {
                extractors.push(Arc::new(ChannelUploadExtractor::new(
                    channel.clone(),
                    Arc::clone(&api),
                )));
            }
            for person in config.people.iter().take(config.max_people_per_run) {
                extractors.push(Arc::new(PersonSearchExtractor::new(
                    person.clone(),
                    Arc::clone(&api),
                )));
            }
        }
        None => {
            tracing::info!("no YOUTUBE_API_KEY, skipping video sources");
        }
    }

    let enricher: Arc<dyn Enricher> = match &config.gemini_api_key {
        Some(key) => Arc::new(GeminiEnricher::new(key.clone(), http.clone())),
        None => {
            tracing::info!("no GEMINI_API_KEY, items load unenriched");
            Arc::new(DisabledEnricher)
        }
    };

    // Store writes get a more generous budget than the read-heavy clients.
    let store: Option<Arc<dyn ContentStore>> = if config.dry_run {
        None
    } else {
        config.notion.as_ref().map(|params| {
            let store_http = reqwest::Client::builder()
                .user_agent("ai-newsroom-pipeline/0.1")
                .connect_timeout(Duration::from_secs(4))
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client");
            Arc::new(NotionStore::new(params, store_http)) as Arc<dyn ContentStore>
        })
    };

    PipelineDeps {
        extractors,
        enricher,
        store,
    }
}
