use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use arcade_config::AppConfig;
use arcade_exec::Hi2TxtExtractor;
use arcade_sync::{GithubStore, RemoteSync};

use crate::debounce::DebounceScheduler;
use crate::pipeline::ScorePipeline;
use crate::watcher::watch_directory;

/// Pipeline wired to the real extractor and the GitHub-backed store.
pub fn build_pipeline(config: &AppConfig) -> Result<ScorePipeline<Hi2TxtExtractor, GithubStore>> {
    let extractor = Hi2TxtExtractor::from_config(config);
    let store = GithubStore::new(config.github.clone()).context("building GitHub client")?;
    Ok(ScorePipeline::new(config.clone(), extractor, RemoteSync::new(store)))
}

/// Run the watch loop until `shutdown` flips to `true` or the subscription
/// fails.  A pass already running when the loop ends is allowed to finish;
/// a pending debounce timer is dropped.
pub async fn run_watch(config: AppConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let pipeline = Arc::new(build_pipeline(&config)?);
    let scheduler = DebounceScheduler::start(config.debounce_delay(), pipeline);
    let dir = PathBuf::from(&config.system.hi_score_dir);

    info!(
        player = %config.player.name,
        games = config.games.len(),
        debounce_ms = config.system.debounce_delay_ms,
        "score watcher starting"
    );

    let watched = watch_directory(&dir, &scheduler, shutdown).await;
    scheduler.shutdown().await;
    info!("score watcher stopped");
    watched
}
