pub mod parser;
pub mod schema;
pub mod store;

pub use parser::{FallbackReason, ParsedScore, parse_score_line};
pub use schema::{AggregateDocument, GameScore, HighScoreEntry, PlayerSnapshot};
pub use store::{LocalScoreStore, MergeOutcome, merge_if_better};
