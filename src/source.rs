//! Boundary to the host's download subsystem.

use async_trait::async_trait;

use crate::error::HostError;
use crate::protocol::{DownloadDelta, DownloadId, DownloadRecord, DownloadState};

/// Filter for [`DownloadSource::search`]. Empty matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub id: Option<DownloadId>,
    pub state: Option<DownloadState>,
}

impl SearchFilter {
    pub fn for_id(id: DownloadId) -> Self {
        Self { id: Some(id), ..Self::default() }
    }

    pub fn in_progress() -> Self {
        Self { state: Some(DownloadState::InProgress), ..Self::default() }
    }

    pub fn matches(&self, record: &DownloadRecord) -> bool {
        self.id.is_none_or(|id| id == record.id)
            && self.state.is_none_or(|state| state == record.state)
    }
}

/// Lifecycle notifications pushed by the host into the service.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Created(DownloadRecord),
    Changed(DownloadDelta),
    Erased(DownloadId),
}

/// Imperative side of the host's download subsystem.
///
/// Implementations adapt whatever the embedding host exposes. Every method may
/// fail; the sync core treats failures as "no data available" and keeps going.
#[async_trait]
pub trait DownloadSource: Send + Sync + 'static {
    async fn search(&self, filter: SearchFilter) -> Result<Vec<DownloadRecord>, HostError>;

    /// Resolves the icon URL for a download. Icons may change once a download
    /// completes (generic placeholder to a type-specific one).
    async fn file_icon(&self, id: DownloadId) -> Result<String, HostError>;

    async fn pause(&self, id: DownloadId) -> Result<(), HostError>;

    async fn resume(&self, id: DownloadId) -> Result<(), HostError>;

    async fn cancel(&self, id: DownloadId) -> Result<(), HostError>;

    /// Reveals the downloaded file in the host's file manager.
    async fn show(&self, id: DownloadId) -> Result<(), HostError>;

    /// Opens the downloaded file with its default application.
    async fn open(&self, id: DownloadId) -> Result<(), HostError>;

    /// Opens the default downloads folder.
    async fn show_default_folder(&self) -> Result<(), HostError>;
}
