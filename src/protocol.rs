//! Message vocabulary exchanged between the store and per-window bar surfaces.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Download identifier, assigned by the download source.
pub type DownloadId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    InProgress,
    Complete,
    Interrupted,
}

/// Full state of one download, as shown in the bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub url: String,
    pub filename: String,
    pub state: DownloadState,
    pub bytes_received: u64,
    /// `None` when the source does not know the final size yet.
    pub total_bytes: Option<u64>,
    pub can_resume: bool,
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// One changed field as reported by the download source: previous and current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct FieldDelta<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<T>,
}

impl<T> FieldDelta<T> {
    pub fn to(current: T) -> Self {
        Self { previous: None, current: Some(current) }
    }

    pub fn from_to(previous: T, current: T) -> Self {
        Self { previous: Some(previous), current: Some(current) }
    }
}

/// Change notification in the download source's shape, every field wrapped
/// with previous/current. Only `id` is always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadDelta {
    pub id: DownloadId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<FieldDelta<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<FieldDelta<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<FieldDelta<DownloadState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_received: Option<FieldDelta<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<FieldDelta<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_resume: Option<FieldDelta<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<FieldDelta<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FieldDelta<String>>,
}

impl DownloadDelta {
    pub fn new(id: DownloadId) -> Self {
        Self { id, ..Self::default() }
    }

    /// True when this delta carries a state transition into `Complete`.
    pub fn completed(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|d| d.current == Some(DownloadState::Complete))
    }

    /// Collapses every present field to its current value. Bar surfaces only
    /// care about where a download is now, not where it came from.
    pub fn flatten(self) -> DownloadChange {
        fn current<T>(field: Option<FieldDelta<T>>) -> Option<T> {
            field.and_then(|d| d.current)
        }

        DownloadChange {
            id: self.id,
            url: current(self.url),
            filename: current(self.filename),
            state: current(self.state),
            bytes_received: current(self.bytes_received),
            total_bytes: current(self.total_bytes),
            can_resume: current(self.can_resume),
            paused: current(self.paused),
            error: current(self.error),
            icon_url: None,
        }
    }
}

/// Flattened change broadcast to bar surfaces: `id` plus current values of the
/// fields that changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadChange {
    pub id: DownloadId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<DownloadState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_received: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_resume: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl DownloadChange {
    /// Byte-progress refresh, as the poller sends.
    pub fn progress(id: DownloadId, bytes_received: u64, total_bytes: Option<u64>) -> Self {
        Self {
            id,
            bytes_received: Some(bytes_received),
            total_bytes,
            ..Self::default()
        }
    }

    /// Icon resolution result pushed after creation or completion.
    pub fn icon(id: DownloadId, icon_url: String) -> Self {
        Self {
            id,
            icon_url: Some(icon_url),
            ..Self::default()
        }
    }
}

/// Messages sent from the store to bar surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BarUpdate {
    /// Initial dump of active downloads, always the first message on a channel.
    Snapshot { downloads: Vec<DownloadRecord> },
    Added { download: DownloadRecord },
    Changed { delta: DownloadChange },
    Removed { download_id: DownloadId },
}

/// User-intent messages sent from a bar surface to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BarCommand {
    Open { download_id: DownloadId },
    Show { download_id: DownloadId },
    Pause { download_id: DownloadId },
    Resume { download_id: DownloadId },
    Cancel { download_id: DownloadId },
    /// Hide one download from the bar.
    RemoveOne { download_id: DownloadId },
    RemoveAll,
    ShowAllInFolder,
}

#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error("message has no type tag")]
    MissingType,
    #[error("unusable {tag:?} message: {source}")]
    Invalid {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Validates a raw inbound message. Surfaces are not trusted to send
/// well-formed commands; anything unusable is reported, never panicked on.
pub fn parse_command(raw: &Value) -> Result<BarCommand, ProtocolViolation> {
    let tag = match raw.get("type").and_then(Value::as_str) {
        Some(tag) => tag,
        None => return Err(ProtocolViolation::MissingType),
    };
    serde_json::from_value(raw.clone()).map_err(|source| ProtocolViolation::Invalid {
        tag: tag.to_string(),
        source,
    })
}
