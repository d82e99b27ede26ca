use thiserror::Error;

use crate::protocol::DownloadId;

/// Failure reported by the browser host (download source or tab boundary).
///
/// Host failures are never fatal to the sync core: callers log them and carry
/// on with whatever state they already have.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("download {0} not found")]
    NotFound(DownloadId),

    #[error("host call failed: {0}")]
    Call(String),
}
