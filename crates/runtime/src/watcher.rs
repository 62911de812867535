//! Directory subscription that feeds score file changes into the debounce
//! scheduler.

use std::path::Path;

use anyhow::{Context, Result, bail};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use arcade_config::SCORE_FILE_SUFFIX;

use crate::debounce::DebounceScheduler;

/// Game id for a score file name (`mspacman.hi` → `mspacman`).
pub fn game_id_from_file_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(SCORE_FILE_SUFFIX)
        .filter(|id| !id.is_empty())
}

/// Base names of the score files a modification event touches.  Events of
/// any other kind, renames included, yield nothing.
pub fn score_file_names(event: &Event) -> Vec<String> {
    let is_modification = match &event.kind {
        EventKind::Modify(ModifyKind::Name(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    if !is_modification {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| game_id_from_file_name(name).is_some())
        .collect()
}

/// Watch `dir` (non-recursively) until `shutdown` flips to `true`.
///
/// A failure reported by the subscription ends the loop with an error;
/// there is no resubscription.
pub async fn watch_directory(
    dir: &Path,
    scheduler: &DebounceScheduler,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        },
        Config::default(),
    )
    .context("creating filesystem watcher")?;
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching {}", dir.display()))?;

    info!(dir = %dir.display(), "watching for score file changes");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            received = event_rx.recv() => {
                let event = match received {
                    Some(Ok(event)) => event,
                    Some(Err(err)) => {
                        return Err(err).context("filesystem watch failed");
                    }
                    None => bail!("filesystem watcher stopped unexpectedly"),
                };
                for file_name in score_file_names(&event) {
                    info!(
                        file = %file_name,
                        settle_secs = scheduler.delay().as_secs_f32(),
                        "change detected; waiting for writes to settle"
                    );
                    scheduler.notify(file_name);
                }
                debug!(kind = ?event.kind, paths = ?event.paths, "filesystem event");
            }
        }
    }

    info!("directory watch stopped");
    Ok(())
}
