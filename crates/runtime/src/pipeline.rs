//! One processing pass: extract → parse → merge → save → publish.
//!
//! Every stage reports through [`PassOutcome`]; nothing escapes a pass, so
//! the watcher keeps servicing later changes whatever happens here.

use async_trait::async_trait;
use tracing::{error, info, warn};

use arcade_config::AppConfig;
use arcade_exec::{Extraction, ScoreExtractor};
use arcade_scores::{
    GameScore, LocalScoreStore, ParsedScore, PlayerSnapshot, merge_if_better, parse_score_line,
};
use arcade_sync::{BackupOutcome, PublishOutcome, RemoteStore, RemoteSync};

use crate::debounce::ChangeHandler;
use crate::watcher::game_id_from_file_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    NotScoreFile {
        file_name: String,
    },
    Unsupported {
        game: String,
    },
    ExtractionFailed {
        game: String,
        error: String,
    },
    NoScore {
        game: String,
    },
    NotImproved {
        game: String,
        old_score: u64,
        new_score: u64,
    },
    /// The improvement was not persisted locally, so nothing was published.
    SaveFailed {
        game: String,
        error: String,
    },
    Updated {
        game: String,
        old_score: u64,
        new_score: u64,
        publish: PublishOutcome,
    },
}

pub struct ScorePipeline<E, S> {
    config: AppConfig,
    extractor: E,
    store: LocalScoreStore,
    remote: RemoteSync<S>,
}

impl<E: ScoreExtractor, S: RemoteStore> ScorePipeline<E, S> {
    pub fn new(config: AppConfig, extractor: E, remote: RemoteSync<S>) -> Self {
        let store = LocalScoreStore::new(&config.system.local_scores_path, &config.player.name);
        Self {
            config,
            extractor,
            store,
            remote,
        }
    }

    pub fn remote(&self) -> &RemoteSync<S> {
        &self.remote
    }

    pub async fn local_snapshot(&self) -> PlayerSnapshot {
        self.store.load().await
    }

    /// Entry point for a debounced change to `file_name` (e.g. `pacman.hi`).
    pub async fn process_file(&self, file_name: &str) -> PassOutcome {
        match game_id_from_file_name(file_name) {
            Some(game_id) => self.process_game(game_id).await,
            None => PassOutcome::NotScoreFile {
                file_name: file_name.to_string(),
            },
        }
    }

    pub async fn process_game(&self, game_id: &str) -> PassOutcome {
        let game = game_id.to_string();
        if !self.config.is_supported_game(game_id) {
            return PassOutcome::Unsupported { game };
        }

        let line = match self.extractor.extract(game_id).await {
            Ok(Extraction::Line(line)) => line,
            Ok(Extraction::NotFound) => return PassOutcome::NoScore { game },
            Err(err) => {
                return PassOutcome::ExtractionFailed {
                    game,
                    error: format!("{err:#}"),
                };
            }
        };

        let entry = match parse_score_line(&line) {
            ParsedScore::Parsed(entry) => entry,
            ParsedScore::Fallback { entry, reason } => {
                warn!(%game, %line, ?reason, "unparseable score line; treating as zero");
                entry
            }
        };

        let display_name = self.config.display_name(game_id).map(str::to_string);
        let candidate = GameScore::from_entry(entry, display_name);

        let mut snapshot = self.store.load().await;
        let merge = merge_if_better(&mut snapshot, game_id, candidate);
        if !merge.applied {
            return PassOutcome::NotImproved {
                game,
                old_score: merge.old_score,
                new_score: merge.new_score,
            };
        }

        info!(
            %game,
            new_score = merge.new_score,
            old_score = merge.old_score,
            "new high score"
        );

        if let Err(err) = self.store.save(&snapshot).await {
            return PassOutcome::SaveFailed {
                game,
                error: format!("{err:#}"),
            };
        }

        let publish = self.remote.publish(&snapshot).await;
        PassOutcome::Updated {
            game,
            old_score: merge.old_score,
            new_score: merge.new_score,
            publish,
        }
    }

    /// Publish the persisted local snapshot as is.
    pub async fn republish(&self) -> PublishOutcome {
        let snapshot = self.store.load().await;
        self.remote.publish(&snapshot).await
    }
}

#[async_trait]
impl<E, S> ChangeHandler for ScorePipeline<E, S>
where
    E: ScoreExtractor + 'static,
    S: RemoteStore + 'static,
{
    async fn handle(&self, file_name: String) {
        let outcome = self.process_file(&file_name).await;
        log_outcome(&outcome);
    }
}

pub fn log_outcome(outcome: &PassOutcome) {
    match outcome {
        PassOutcome::NotScoreFile { file_name } => {
            warn!(file = %file_name, "not a score file; skipping");
        }
        PassOutcome::Unsupported { game } => {
            info!(%game, "skipping unsupported game");
        }
        PassOutcome::ExtractionFailed { game, error } => {
            error!(%game, %error, "score extraction failed");
        }
        PassOutcome::NoScore { game } => {
            warn!(%game, "no score data found");
        }
        PassOutcome::NotImproved {
            game,
            old_score,
            new_score,
        } => {
            info!(%game, new_score, old_score, "score not higher than existing; skipping update");
        }
        PassOutcome::SaveFailed { game, error } => {
            error!(%game, %error, "saving local scores failed; not publishing");
        }
        PassOutcome::Updated { game, publish, .. } => match publish {
            PublishOutcome::Published { attempts, backup } => {
                info!(%game, attempts, "remote score table updated");
                if let BackupOutcome::Failed(reason) = backup {
                    warn!(%game, %reason, "backup copy is stale");
                }
            }
            PublishOutcome::Conflict { attempts } => {
                error!(%game, attempts, "gave up publishing after repeated conflicts; will retry on next high score");
            }
            PublishOutcome::Failed { attempts, error } => {
                error!(%game, attempts, %error, "gave up publishing; will retry on next high score");
            }
        },
    }
}
