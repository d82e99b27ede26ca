//! Byte-progress polling for the fields the source does not push reliably.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use tracing::{debug, warn};

use crate::protocol::{BarUpdate, DownloadChange};
use crate::registry::ChannelRegistry;
use crate::source::{DownloadSource, SearchFilter};

/// Fixed delay between progress queries.
pub const POLL_PERIOD: Duration = Duration::from_secs(1);

/// Supplements the event stream with byte-progress refreshes: the source does
/// not announce pure byte-count changes, so while anything is in progress the
/// poller asks for all running downloads once a second and broadcasts their
/// counters.
///
/// A self-rescheduling one-shot timer owned and polled by the service loop,
/// not a free-running interval task. A tick that finds nothing running, or a
/// failed query, leaves it disarmed until the next lifecycle event rearms it.
pub struct ProgressPoller {
    source: Arc<dyn DownloadSource>,
    registry: ChannelRegistry,
    next_tick: Option<Pin<Box<Sleep>>>,
}

impl ProgressPoller {
    pub fn new(source: Arc<dyn DownloadSource>, registry: ChannelRegistry) -> Self {
        Self {
            source,
            registry,
            next_tick: None,
        }
    }

    /// Arms an immediate tick unless one is already scheduled. Called on every
    /// creation and change event: a download that just finished may have been
    /// replaced by a new one at the same moment.
    pub fn restart(&mut self) {
        if self.next_tick.is_none() {
            debug!("progress poller armed");
            self.next_tick = Some(Box::pin(sleep(Duration::ZERO)));
        }
    }

    pub fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Resolves when the scheduled tick is due. Pends forever while disarmed.
    pub async fn due(&mut self) {
        match self.next_tick.as_mut() {
            Some(timer) => timer.as_mut().await,
            None => std::future::pending().await,
        }
    }

    /// One query-and-broadcast round. Reschedules only when the query found
    /// work; a failed query disarms instead of retrying, so a broken source
    /// cannot drive an error loop at timer speed.
    pub async fn tick(&mut self) {
        self.next_tick = None;
        let in_progress = match self.source.search(SearchFilter::in_progress()).await {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, "progress poll failed");
                return;
            }
        };
        for download in &in_progress {
            self.registry.broadcast(&BarUpdate::Changed {
                delta: DownloadChange::progress(
                    download.id,
                    download.bytes_received,
                    download.total_bytes,
                ),
            });
        }
        if !in_progress.is_empty() {
            self.next_tick = Some(Box::pin(sleep(POLL_PERIOD)));
        }
    }
}
