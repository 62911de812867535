use std::path::Path;

use arcade_config::AppConfig;
use arcade_runtime::PassOutcome;
use arcade_scores::PlayerSnapshot;
use arcade_sync::{BackupOutcome, PublishOutcome};

pub fn pass_summary(outcome: &PassOutcome) -> String {
    match outcome {
        PassOutcome::NotScoreFile { file_name } => format!("{file_name}: not a score file"),
        PassOutcome::Unsupported { game } => format!("{game}: not a configured game"),
        PassOutcome::ExtractionFailed { game, error } => format!("{game}: extraction failed ({error})"),
        PassOutcome::NoScore { game } => format!("{game}: no score data"),
        PassOutcome::NotImproved {
            game,
            old_score,
            new_score,
        } => format!("{game}: {new_score} does not beat {old_score}"),
        PassOutcome::SaveFailed { game, error } => format!("{game}: local save failed ({error})"),
        PassOutcome::Updated {
            game,
            old_score,
            new_score,
            publish,
        } => format!(
            "{game}: new high score {new_score} (was {old_score}); {}",
            publish_summary(publish)
        ),
    }
}

pub fn publish_summary(outcome: &PublishOutcome) -> String {
    match outcome {
        PublishOutcome::Published { attempts, backup } => {
            let backup = match backup {
                BackupOutcome::Updated => "backup updated".to_string(),
                BackupOutcome::Skipped => "no backup configured".to_string(),
                BackupOutcome::Failed(reason) => format!("backup failed: {reason}"),
            };
            format!("published after {attempts} attempt(s), {backup}")
        }
        PublishOutcome::Conflict { attempts } => {
            format!("not published: remote kept changing ({attempts} attempts)")
        }
        PublishOutcome::Failed { attempts, error } => {
            format!("not published after {attempts} attempt(s): {error}")
        }
    }
}

pub fn snapshot_lines(snapshot: &PlayerSnapshot) -> Vec<String> {
    let mut lines = vec![format!(
        "{} (updated {})",
        snapshot.player,
        snapshot.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    )];
    if snapshot.arcade_scores.is_empty() {
        lines.push("  no scores recorded yet".to_string());
    }
    for (game_id, game) in &snapshot.arcade_scores {
        let label = game.display_name.as_deref().unwrap_or(game_id);
        match game.high_scores.first() {
            Some(best) => lines.push(format!(
                "  {label:<24} {:>10}  {}",
                best.score,
                best.date.format("%Y-%m-%d")
            )),
            None => lines.push(format!("  {label:<24} {:>10}", "-")),
        }
    }
    lines
}

pub fn config_lines(config: &AppConfig, path: &Path) -> Vec<String> {
    let blank_as = |value: &str, placeholder: &str| {
        if value.trim().is_empty() {
            placeholder.to_string()
        } else {
            value.to_string()
        }
    };

    let mut lines = vec![
        "── arcade configuration ─────────────────────────────".to_string(),
        format!("  config file    : {}", path.display()),
        format!("  player         : {}", blank_as(&config.player.name, "(unset)")),
        format!("  score dir      : {}", blank_as(&config.system.hi_score_dir, "(unset)")),
        format!("  hi2txt jar     : {}", blank_as(&config.system.hi2txt_jar, "(unset)")),
        format!("  debounce       : {} ms", config.system.debounce_delay_ms),
        format!("  local scores   : {}", config.system.local_scores_path),
        format!(
            "  repository     : {}/{}@{}:{}",
            config.github.repo_owner,
            config.github.repo_name,
            config.github.branch,
            config.github.scores_path
        ),
        format!(
            "  token          : {}",
            if config.github.token.is_empty() { "(unset)" } else { "(set)" }
        ),
        format!("  backup gist    : {}", blank_as(&config.github.gist_id, "(disabled)")),
        format!("  games ({})", config.games.len()),
    ];
    for id in config.game_ids() {
        match config.display_name(id) {
            Some(name) => lines.push(format!("    {id:<12} {name}")),
            None => lines.push(format!("    {id}")),
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use arcade_config::GameConfig;
    use arcade_scores::{GameScore, HighScoreEntry};
    use chrono::Utc;

    use super::*;

    #[test]
    fn updated_pass_mentions_both_scores_and_backup() {
        let outcome = PassOutcome::Updated {
            game: "mspacman".to_string(),
            old_score: 5000,
            new_score: 5001,
            publish: PublishOutcome::Published {
                attempts: 2,
                backup: BackupOutcome::Skipped,
            },
        };
        let text = pass_summary(&outcome);
        assert!(text.contains("5001"));
        assert!(text.contains("was 5000"));
        assert!(text.contains("2 attempt(s)"));
        assert!(text.contains("no backup configured"));
    }

    #[test]
    fn snapshot_lines_prefer_display_name() {
        let mut snapshot = PlayerSnapshot::new("alice");
        snapshot.arcade_scores.insert(
            "mspacman".to_string(),
            GameScore::from_entry(
                HighScoreEntry {
                    rank: 1,
                    score: 31337,
                    score_string: "31337".to_string(),
                    date: Utc::now(),
                },
                Some("MS. PAC-MAN".to_string()),
            ),
        );
        let lines = snapshot_lines(&snapshot);
        assert!(lines[0].starts_with("alice"));
        assert!(lines[1].contains("MS. PAC-MAN"));
        assert!(lines[1].contains("31337"));

        let empty = snapshot_lines(&PlayerSnapshot::new("bob"));
        assert_eq!(empty[1].trim(), "no scores recorded yet");
    }

    #[test]
    fn config_summary_hides_token_and_lists_games() {
        let mut config = AppConfig::default();
        config.github.token = "ghp_secret".to_string();
        config.games.insert(
            "galaga".to_string(),
            GameConfig {
                display_name: "GALAGA".to_string(),
            },
        );
        config.games.insert("dkong".to_string(), GameConfig::default());

        let lines = config_lines(&config, Path::new("config/default.toml"));
        assert!(lines.iter().all(|line| !line.contains("ghp_secret")));
        assert!(lines.iter().any(|line| line.contains("(set)")));
        assert!(lines.iter().any(|line| line.trim() == "galaga       GALAGA"));
        assert!(lines.iter().any(|line| line.trim() == "dkong"));
        assert!(lines.iter().any(|line| line.contains("(disabled)")));
    }
}
