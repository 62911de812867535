use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::schema::{GameScore, PlayerSnapshot};

/// Result of offering a candidate score to [`merge_if_better`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub applied: bool,
    pub old_score: u64,
    pub new_score: u64,
}

/// Replace `game_id`'s entry with `candidate` only when the candidate's top
/// score is strictly greater than the stored one (0 when absent).  Ties and
/// lower scores leave `snapshot` untouched.
pub fn merge_if_better(
    snapshot: &mut PlayerSnapshot,
    game_id: &str,
    candidate: GameScore,
) -> MergeOutcome {
    let old_score = snapshot.top_score(game_id);
    let new_score = candidate.top_score();
    let applied = new_score > old_score;

    if applied {
        snapshot.arcade_scores.insert(game_id.to_string(), candidate);
        snapshot.last_updated = Utc::now();
    }

    MergeOutcome {
        applied,
        old_score,
        new_score,
    }
}

/// On-disk home of the local player's snapshot (`local_scores.json`).
#[derive(Debug, Clone)]
pub struct LocalScoreStore {
    path: PathBuf,
    player: String,
}

impl LocalScoreStore {
    pub fn new(path: impl Into<PathBuf>, player: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            player: player.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted snapshot.  A missing file yields a fresh snapshot.
    /// An unreadable one is copied to a `.corrupt` sibling for inspection and
    /// also yields a fresh snapshot.
    pub async fn load(&self) -> PlayerSnapshot {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(raw),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return PlayerSnapshot::new(&self.player);
            }
            Err(err) => Err(anyhow::Error::from(err)),
        };
        let parsed = raw.and_then(|raw| {
            serde_json::from_str::<PlayerSnapshot>(&raw).map_err(anyhow::Error::from)
        });

        match parsed {
            Ok(mut snapshot) => {
                if snapshot.player != self.player {
                    warn!(
                        stored = %snapshot.player,
                        configured = %self.player,
                        "local snapshot belongs to another player name; adopting configured name"
                    );
                    snapshot.player = self.player.clone();
                }
                snapshot
            }
            Err(err) => {
                warn!(
                    error = %err,
                    path = %self.path.display(),
                    "could not read local scores; starting from an empty snapshot"
                );
                let corrupt_path = self.sibling("corrupt");
                match tokio::fs::copy(&self.path, &corrupt_path).await {
                    Ok(_) => warn!(copy = %corrupt_path.display(), "unreadable local scores set aside"),
                    Err(copy_err) => warn!(
                        error = %copy_err,
                        copy = %corrupt_path.display(),
                        "could not set unreadable local scores aside"
                    ),
                }
                PlayerSnapshot::new(&self.player)
            }
        }
    }

    /// Overwrite the persisted snapshot with `snapshot`, pretty-printed.
    ///
    /// Written to a `.tmp` sibling, synced, then renamed over the original so
    /// a crash never leaves a half-written file behind.
    pub async fn save(&self, snapshot: &PlayerSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let rendered = serde_json::to_string_pretty(snapshot)?;
        let tmp_path = self.sibling("tmp");

        let write_result: Result<()> = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(rendered.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.context(format!("writing {}", tmp_path.display())));
        }

        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err).with_context(|| format!("replacing {}", self.path.display()));
        }

        Ok(())
    }

    fn sibling(&self, extension: &str) -> PathBuf {
        let filename = self
            .path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "local_scores.json".to_string());
        self.path.with_file_name(format!("{filename}.{extension}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::schema::HighScoreEntry;

    fn candidate(score: u64) -> GameScore {
        GameScore::from_entry(
            HighScoreEntry {
                rank: 1,
                score,
                score_string: score.to_string(),
                date: Utc::now(),
            },
            Some("MS. PAC-MAN".to_string()),
        )
    }

    // ── merge_if_better ────────────────────────────────────────────────────

    #[test]
    fn first_score_for_game_is_applied() {
        let mut snapshot = PlayerSnapshot::new("alice");
        let outcome = merge_if_better(&mut snapshot, "mspacman", candidate(5000));
        assert_eq!(
            outcome,
            MergeOutcome {
                applied: true,
                old_score: 0,
                new_score: 5000
            }
        );
        assert_eq!(snapshot.top_score("mspacman"), 5000);
    }

    #[test]
    fn ties_and_lower_scores_are_rejected_without_mutation() {
        let mut snapshot = PlayerSnapshot::new("alice");
        merge_if_better(&mut snapshot, "mspacman", candidate(5000));
        let before = snapshot.clone();

        for score in [5000, 4000, 0] {
            let outcome = merge_if_better(&mut snapshot, "mspacman", candidate(score));
            assert!(!outcome.applied);
            assert_eq!(outcome.old_score, 5000);
            assert_eq!(snapshot, before);
        }

        let outcome = merge_if_better(&mut snapshot, "mspacman", candidate(5001));
        assert!(outcome.applied);
        assert_eq!(snapshot.top_score("mspacman"), 5001);
    }

    #[test]
    fn zero_fallback_never_creates_an_entry() {
        let mut snapshot = PlayerSnapshot::new("alice");
        let outcome = merge_if_better(&mut snapshot, "pacman", candidate(0));
        assert!(!outcome.applied);
        assert!(snapshot.arcade_scores.is_empty());
    }

    #[test]
    fn top_score_is_running_maximum() {
        let mut snapshot = PlayerSnapshot::new("alice");
        let scores = [300, 1200, 50, 1200, 9999, 10, 4000, 10_000, 2];
        let mut previous = 0;
        for score in scores {
            merge_if_better(&mut snapshot, "galaga", candidate(score));
            let top = snapshot.top_score("galaga");
            assert!(top >= previous);
            previous = top;
        }
        assert_eq!(previous, *scores.iter().max().unwrap());
    }

    #[test]
    fn merge_only_touches_named_game() {
        let mut snapshot = PlayerSnapshot::new("alice");
        merge_if_better(&mut snapshot, "pacman", candidate(100));
        merge_if_better(&mut snapshot, "galaga", candidate(200));
        assert_eq!(snapshot.top_score("pacman"), 100);
        assert_eq!(snapshot.top_score("galaga"), 200);
    }

    // ── load / save ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn load_missing_file_returns_fresh_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = LocalScoreStore::new(dir.path().join("local_scores.json"), "alice");
        let snapshot = store.load().await;
        assert_eq!(snapshot.player, "alice");
        assert!(snapshot.arcade_scores.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_returns_same_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = LocalScoreStore::new(dir.path().join("nested/local_scores.json"), "alice");

        let mut snapshot = store.load().await;
        merge_if_better(&mut snapshot, "mspacman", candidate(31_337));
        store.save(&snapshot).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"player\": \"alice\""), "expected pretty JSON: {raw}");
        assert!(!dir.path().join("nested/local_scores.json.tmp").exists());

        assert_eq!(store.load().await, snapshot);
    }

    #[tokio::test]
    async fn save_overwrites_previous_version() {
        let dir = TempDir::new().unwrap();
        let store = LocalScoreStore::new(dir.path().join("local_scores.json"), "alice");

        let mut snapshot = store.load().await;
        merge_if_better(&mut snapshot, "pacman", candidate(10));
        store.save(&snapshot).await.unwrap();
        merge_if_better(&mut snapshot, "pacman", candidate(20));
        store.save(&snapshot).await.unwrap();

        assert_eq!(store.load().await.top_score("pacman"), 20);
    }

    #[tokio::test]
    async fn corrupt_file_is_set_aside() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local_scores.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = LocalScoreStore::new(&path, "alice");
        let snapshot = store.load().await;
        assert!(snapshot.arcade_scores.is_empty());

        let corrupt = dir.path().join("local_scores.json.corrupt");
        assert_eq!(std::fs::read_to_string(corrupt).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn corrupt_file_still_loads_when_it_cannot_be_set_aside() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local_scores.json");
        std::fs::write(&path, "{ not json").unwrap();
        // A directory in the way makes the copy fail.
        std::fs::create_dir(dir.path().join("local_scores.json.corrupt")).unwrap();

        let store = LocalScoreStore::new(&path, "alice");
        let snapshot = store.load().await;
        assert_eq!(snapshot.player, "alice");
        assert!(snapshot.arcade_scores.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn load_adopts_configured_player_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local_scores.json");
        let old = LocalScoreStore::new(&path, "old-name");
        let mut snapshot = old.load().await;
        merge_if_better(&mut snapshot, "pacman", candidate(42));
        old.save(&snapshot).await.unwrap();

        let renamed = LocalScoreStore::new(&path, "alice").load().await;
        assert_eq!(renamed.player, "alice");
        assert_eq!(renamed.top_score("pacman"), 42);
    }
}
