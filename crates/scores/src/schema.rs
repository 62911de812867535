use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One row of a game's high-score table as reported by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    pub rank: u32,
    pub score: u64,
    /// Score as the game renders it (may carry initials or padding).
    pub score_string: String,
    /// When the entry was parsed, not when the game recorded it.
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameScore {
    /// Best first.
    #[serde(default)]
    pub high_scores: Vec<HighScoreEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl GameScore {
    pub fn from_entry(entry: HighScoreEntry, display_name: Option<String>) -> Self {
        Self {
            high_scores: vec![entry],
            display_name,
        }
    }

    /// Score of the first entry, or 0 for an empty table.
    pub fn top_score(&self) -> u64 {
        self.high_scores.first().map(|entry| entry.score).unwrap_or(0)
    }
}

/// A single player's complete score state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player: String,
    #[serde(default)]
    pub arcade_scores: BTreeMap<String, GameScore>,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub last_updated: DateTime<Utc>,
}

impl PlayerSnapshot {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
            arcade_scores: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Current best for `game_id`, 0 when the game has never been recorded.
    pub fn top_score(&self, game_id: &str) -> u64 {
        self.arcade_scores
            .get(game_id)
            .map(GameScore::top_score)
            .unwrap_or(0)
    }
}

/// The shared multi-player score table published to the remote store.
///
/// Player entries are kept as raw JSON so that snapshots written by other
/// clients round-trip without losing fields this crate does not model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDocument {
    #[serde(default)]
    pub players: BTreeMap<String, serde_json::Value>,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub last_updated: DateTime<Utc>,
}

impl Default for AggregateDocument {
    fn default() -> Self {
        Self {
            players: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

impl AggregateDocument {
    /// Replace `snapshot.player`'s entry as a whole and stamp the document.
    /// Other players' entries are left untouched.
    pub fn upsert_player(&mut self, snapshot: &PlayerSnapshot) -> serde_json::Result<()> {
        let value = serde_json::to_value(snapshot)?;
        self.players.insert(snapshot.player.clone(), value);
        self.last_updated = Utc::now();
        Ok(())
    }

    pub fn player(&self, name: &str) -> Option<PlayerSnapshot> {
        self.players
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Accepts RFC 3339 timestamps and falls back to "now" for anything else
/// (older clients wrote free-form date strings).
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(score: u64) -> HighScoreEntry {
        HighScoreEntry {
            rank: 1,
            score,
            score_string: score.to_string(),
            date: Utc::now(),
        }
    }

    #[test]
    fn top_score_is_zero_for_unknown_game() {
        let mut snapshot = PlayerSnapshot::new("alice");
        assert_eq!(snapshot.top_score("pacman"), 0);
        snapshot
            .arcade_scores
            .insert("pacman".to_string(), GameScore::from_entry(entry(4200), None));
        assert_eq!(snapshot.top_score("pacman"), 4200);
        assert_eq!(GameScore::default().top_score(), 0);
    }

    #[test]
    fn display_name_omitted_when_absent() {
        let value = serde_json::to_value(GameScore::from_entry(entry(10), None)).unwrap();
        assert!(value.get("display_name").is_none());
        let value = serde_json::to_value(GameScore::from_entry(
            entry(10),
            Some("PAC-MAN".to_string()),
        ))
        .unwrap();
        assert_eq!(value["display_name"], "PAC-MAN");
    }

    #[test]
    fn legacy_date_strings_are_accepted() {
        let doc: AggregateDocument = serde_json::from_value(json!({
            "players": {},
            "last_updated": "Tue Mar 04 21:13:05 CET 2025"
        }))
        .unwrap();
        assert!(doc.players.is_empty());

        let snapshot: PlayerSnapshot = serde_json::from_value(json!({
            "player": "bob",
            "arcade_scores": {
                "pacman": {
                    "high_scores": [{
                        "rank": 1, "score": 3000, "score_string": "3000",
                        "date": "Tue Mar 04 21:13:05 CET 2025"
                    }]
                }
            },
            "last_updated": "2025-03-04T20:13:05Z"
        }))
        .unwrap();
        assert_eq!(snapshot.top_score("pacman"), 3000);
        assert_eq!(snapshot.last_updated.to_rfc3339(), "2025-03-04T20:13:05+00:00");
    }

    #[test]
    fn upsert_replaces_only_own_player() {
        let mut doc: AggregateDocument = serde_json::from_value(json!({
            "players": {
                "bob": { "player": "bob", "arcade_scores": {}, "custom_field": 7 },
                "alice": { "player": "alice", "arcade_scores": {} }
            },
            "last_updated": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        let bob_before = doc.players["bob"].clone();

        let mut alice = PlayerSnapshot::new("alice");
        alice
            .arcade_scores
            .insert("galaga".to_string(), GameScore::from_entry(entry(9000), None));
        doc.upsert_player(&alice).unwrap();

        assert_eq!(doc.players.len(), 2);
        assert_eq!(doc.players["bob"], bob_before);
        assert_eq!(doc.player("alice").unwrap().top_score("galaga"), 9000);
    }
}
