//! Decoding of the extractor's pipe-delimited data line.
//!
//! Parsing never fails: malformed input degrades to a zero score so that the
//! pipeline keeps running.  The fallback is surfaced through [`ParsedScore`]
//! so callers can log it.

use chrono::Utc;

use crate::schema::HighScoreEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Fewer than two `|`-separated fields.
    TooFewFields,
    /// Rank or score is not a non-negative integer.
    NotNumeric,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedScore {
    Parsed(HighScoreEntry),
    Fallback {
        entry: HighScoreEntry,
        reason: FallbackReason,
    },
}

impl ParsedScore {
    pub fn entry(&self) -> &HighScoreEntry {
        match self {
            Self::Parsed(entry) | Self::Fallback { entry, .. } => entry,
        }
    }

    pub fn into_entry(self) -> HighScoreEntry {
        match self {
            Self::Parsed(entry) | Self::Fallback { entry, .. } => entry,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Parse `rank|score[|score_string]`.  Whitespace around fields is trimmed;
/// a missing or blank `score_string` defaults to the score field's text.
pub fn parse_score_line(line: &str) -> ParsedScore {
    let fields = line.split('|').map(str::trim).collect::<Vec<_>>();
    if fields.len() < 2 {
        return fallback(FallbackReason::TooFewFields);
    }

    let (Ok(rank), Ok(score)) = (fields[0].parse::<u32>(), fields[1].parse::<u64>()) else {
        return fallback(FallbackReason::NotNumeric);
    };

    let score_string = fields
        .get(2)
        .copied()
        .filter(|text| !text.is_empty())
        .unwrap_or(fields[1]);

    ParsedScore::Parsed(HighScoreEntry {
        rank,
        score,
        score_string: score_string.to_string(),
        date: Utc::now(),
    })
}

fn fallback(reason: FallbackReason) -> ParsedScore {
    ParsedScore::Fallback {
        entry: HighScoreEntry {
            rank: 1,
            score: 0,
            score_string: "0".to_string(),
            date: Utc::now(),
        },
        reason,
    }
}
