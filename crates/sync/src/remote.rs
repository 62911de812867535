use async_trait::async_trait;

use arcade_scores::AggregateDocument;

use crate::error::SyncError;

/// The aggregate document as last observed, with the version marker needed
/// to write it back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteDocument {
    /// `None` when the store has no document yet.
    pub document: Option<AggregateDocument>,
    /// Opaque marker of the stored version; `None` when nothing is stored.
    pub version: Option<String>,
}

/// A document store that detects lost updates through a version marker.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch(&self) -> Result<RemoteDocument, SyncError>;

    /// Write `content` as the new document.  When `version` is given the
    /// store must reject the write with [`SyncError::Conflict`] if it no
    /// longer matches.
    async fn write(&self, content: &str, version: Option<&str>) -> Result<(), SyncError>;

    /// Refresh the secondary backup copy with `content`.
    async fn write_backup(&self, content: &str) -> Result<(), SyncError>;

    fn backup_configured(&self) -> bool {
        true
    }
}
