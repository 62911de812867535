//! Optimistic read-modify-write of the aggregate document.
//!
//! Each attempt fetches the current document and its version marker, puts
//! the local snapshot in place of this player's entry, and writes it back
//! with the marker.  Conflicts and transport faults both consume an attempt.
//! Nothing here returns an error: the outcome says what happened.

use std::time::Duration;

use tracing::{info, warn};

use arcade_scores::{AggregateDocument, PlayerSnapshot};

use crate::error::SyncError;
use crate::remote::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Updated,
    /// No backup location configured.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { attempts: u32, backup: BackupOutcome },
    /// Every attempt lost the race to another writer.
    Conflict { attempts: u32 },
    /// Attempts exhausted; the last one failed for a reason other than a
    /// conflict.
    Failed { attempts: u32, error: String },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

pub struct RemoteSync<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: RemoteStore> RemoteSync<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, RetryPolicy::default())
    }

    pub fn with_policy(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn publish(&self, snapshot: &PlayerSnapshot) -> PublishOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.attempt(snapshot).await {
                Ok(content) => {
                    info!(attempt, player = %snapshot.player, "scores published");
                    let backup = self.refresh_backup(&content).await;
                    return PublishOutcome::Published {
                        attempts: attempt,
                        backup,
                    };
                }
                Err(err) => {
                    if err.is_conflict() {
                        warn!(attempt, max_attempts, "remote scores changed underneath us");
                    } else {
                        warn!(attempt, max_attempts, error = %err, "publishing scores failed");
                    }
                    last_error = Some(err);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        match last_error {
            Some(SyncError::Conflict) => PublishOutcome::Conflict {
                attempts: max_attempts,
            },
            Some(err) => PublishOutcome::Failed {
                attempts: max_attempts,
                error: err.to_string(),
            },
            None => PublishOutcome::Failed {
                attempts: max_attempts,
                error: "no attempt was made".to_string(),
            },
        }
    }

    /// One read-modify-write round.  Returns the document text written.
    async fn attempt(&self, snapshot: &PlayerSnapshot) -> Result<String, SyncError> {
        let remote = self.store.fetch().await?;
        let mut document = remote.document.unwrap_or_else(AggregateDocument::default);
        document.upsert_player(snapshot)?;

        let content = serde_json::to_string_pretty(&document)?;
        self.store.write(&content, remote.version.as_deref()).await?;
        Ok(content)
    }

    async fn refresh_backup(&self, content: &str) -> BackupOutcome {
        if !self.store.backup_configured() {
            return BackupOutcome::Skipped;
        }
        match self.store.write_backup(content).await {
            Ok(()) => {
                info!("backup copy updated");
                BackupOutcome::Updated
            }
            Err(err) => {
                warn!(error = %err, "backup update failed; primary copy is current");
                BackupOutcome::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory [`RemoteStore`] with scriptable failures.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::remote::RemoteDocument;

    #[derive(Debug)]
    pub enum Fault {
        Conflict,
        Unavailable,
    }

    #[derive(Default)]
    pub struct MemoryStore {
        pub stored: Mutex<Option<(String, u64)>>,
        pub fetch_faults: Mutex<VecDeque<Fault>>,
        pub write_faults: Mutex<VecDeque<Fault>>,
        /// Documents another client commits just before our next write.
        pub concurrent_commits: Mutex<VecDeque<String>>,
        pub always_conflict: bool,
        pub backup_fails: bool,
        pub fetches: Mutex<u32>,
        pub writes: Mutex<u32>,
        pub backups: Mutex<Vec<String>>,
    }

    impl MemoryStore {
        pub fn document(&self) -> Option<AggregateDocument> {
            self.stored
                .lock()
                .unwrap()
                .as_ref()
                .map(|(text, _)| serde_json::from_str(text).unwrap())
        }

    }

    #[async_trait]
    impl RemoteStore for MemoryStore {
        async fn fetch(&self) -> Result<RemoteDocument, SyncError> {
            *self.fetches.lock().unwrap() += 1;
            match self.fetch_faults.lock().unwrap().pop_front() {
                Some(Fault::Conflict) => return Err(SyncError::Conflict),
                Some(Fault::Unavailable) => return Err(SyncError::api(503, "unavailable")),
                None => {}
            }
            let stored = self.stored.lock().unwrap().clone();
            Ok(match stored {
                Some((text, version)) => RemoteDocument {
                    document: Some(serde_json::from_str(&text)?),
                    version: Some(version.to_string()),
                },
                None => RemoteDocument::default(),
            })
        }

        async fn write(&self, content: &str, version: Option<&str>) -> Result<(), SyncError> {
            *self.writes.lock().unwrap() += 1;
            if self.always_conflict {
                return Err(SyncError::Conflict);
            }
            match self.write_faults.lock().unwrap().pop_front() {
                Some(Fault::Conflict) => return Err(SyncError::Conflict),
                Some(Fault::Unavailable) => return Err(SyncError::api(503, "unavailable")),
                None => {}
            }

            let mut stored = self.stored.lock().unwrap();
            if let Some(foreign) = self.concurrent_commits.lock().unwrap().pop_front() {
                let next = stored.as_ref().map(|(_, v)| v + 1).unwrap_or(1);
                *stored = Some((foreign, next));
            }
            let current = stored.as_ref().map(|(_, v)| v.to_string());
            if current.as_deref() != version {
                return Err(SyncError::Conflict);
            }
            let next = stored.as_ref().map(|(_, v)| v + 1).unwrap_or(1);
            *stored = Some((content.to_string(), next));
            Ok(())
        }

        async fn write_backup(&self, content: &str) -> Result<(), SyncError> {
            if self.backup_fails {
                return Err(SyncError::api(500, "gist down"));
            }
            self.backups.lock().unwrap().push(content.to_string());
            Ok(())
        }
    }
}
