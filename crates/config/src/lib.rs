use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Suffix every watched score file carries; the game id is the file name
/// with this stripped.
pub const SCORE_FILE_SUFFIX: &str = ".hi";

// ── Player ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Identity under which this machine's scores are published.
    pub name: String,
}

// ── Games ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub display_name: String,
}

// ── System paths ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Directory the emulator writes `<game>.hi` files into.  Watched
    /// non-recursively.
    pub hi_score_dir: String,
    /// Path to the `hi2txt` archive used to decode score files.
    pub hi2txt_jar: String,
    /// Java launcher used to run `hi2txt_jar`.
    pub java_bin: String,
    /// Quiet period, in milliseconds, a burst of writes must settle for
    /// before the changed file is processed.
    pub debounce_delay_ms: u64,
    /// Where the local player snapshot is persisted.
    pub local_scores_path: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            hi_score_dir: String::new(),
            hi2txt_jar: String::new(),
            java_bin: "java".to_string(),
            debounce_delay_ms: 5000,
            local_scores_path: "local_scores.json".to_string(),
        }
    }
}

// ── Remote store ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub repo_owner: String,
    pub repo_name: String,
    pub branch: String,
    /// Path of the aggregate document inside the repository.
    pub scores_path: String,
    /// Bearer credential.  Can also be set via `ARCADE_GITHUB_TOKEN`
    /// (env takes precedence).
    pub token: String,
    /// Gist holding the backup copy.  Empty disables the backup write.
    pub gist_id: String,
    pub commit_message: String,
    pub api_base_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo_owner: String::new(),
            repo_name: String::new(),
            branch: "main".to_string(),
            scores_path: "scores.json".to_string(),
            token: String::new(),
            gist_id: String::new(),
            commit_message: "Update arcade scores".to_string(),
            api_base_url: "https://api.github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// ── Validation errors ─────────────────────────────────────────────────────────

/// Reasons a configuration is unusable for watching.  Any of these is fatal
/// at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("player.name is empty")]
    MissingPlayer,
    #[error("no games configured under [games]")]
    NoGames,
    #[error("hi_score_dir does not exist or is not a directory: {0}")]
    ScoreDirMissing(String),
    #[error("hi2txt jar not found: {0}")]
    ExtractorMissing(String),
    #[error("github.{0} is empty")]
    MissingRemoteSetting(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub player: PlayerConfig,
    /// Supported games keyed by game id (the score file's base name).
    pub games: BTreeMap<String, GameConfig>,
    pub system: SystemConfig,
    pub github: GithubConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(token) = env::var("ARCADE_GITHUB_TOKEN") {
            if !token.is_empty() {
                config.github.token = token;
            }
        }

        if let Ok(name) = env::var("ARCADE_PLAYER_NAME") {
            if !name.is_empty() {
                config.player.name = name;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// Checks everything the watch loop depends on.  Stops at the first
    /// problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.player.name.trim().is_empty() {
            return Err(ConfigError::MissingPlayer);
        }
        if self.games.is_empty() {
            return Err(ConfigError::NoGames);
        }
        if !Path::new(&self.system.hi_score_dir).is_dir() {
            return Err(ConfigError::ScoreDirMissing(self.system.hi_score_dir.clone()));
        }
        if !Path::new(&self.system.hi2txt_jar).exists() {
            return Err(ConfigError::ExtractorMissing(self.system.hi2txt_jar.clone()));
        }
        for (field, value) in [
            ("repo_owner", &self.github.repo_owner),
            ("repo_name", &self.github.repo_name),
            ("token", &self.github.token),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRemoteSetting(field));
            }
        }
        Ok(())
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.system.debounce_delay_ms)
    }

    pub fn is_supported_game(&self, game_id: &str) -> bool {
        self.games.contains_key(game_id)
    }

    pub fn display_name(&self, game_id: &str) -> Option<&str> {
        self.games
            .get(game_id)
            .map(|game| game.display_name.as_str())
            .filter(|name| !name.is_empty())
    }

    pub fn game_ids(&self) -> Vec<&str> {
        self.games.keys().map(String::as_str).collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
