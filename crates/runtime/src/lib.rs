pub mod daemon;
pub mod debounce;
pub mod pipeline;
pub mod watcher;

pub use daemon::{build_pipeline, run_watch};
pub use debounce::{ChangeHandler, DebounceScheduler};
pub use pipeline::{PassOutcome, ScorePipeline, log_outcome};
pub use watcher::{game_id_from_file_name, score_file_names, watch_directory};
