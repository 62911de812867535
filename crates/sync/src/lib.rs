//! Publication of the local player's snapshot to the shared remote score
//! table, with a backup copy refreshed after every successful write.

pub mod error;
pub mod github;
pub mod publisher;
pub mod remote;

pub use error::SyncError;
pub use github::GithubStore;
pub use publisher::{BackupOutcome, PublishOutcome, RemoteSync, RetryPolicy};
pub use remote::{RemoteDocument, RemoteStore};
