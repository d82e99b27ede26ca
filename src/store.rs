//! Authoritative record of the currently active downloads.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::host::TabHost;
use crate::protocol::{
    BarCommand, BarUpdate, DownloadChange, DownloadDelta, DownloadId, DownloadRecord,
};
use crate::registry::ChannelRegistry;
use crate::source::{DownloadSource, SearchFilter};

/// Process-wide download state, shared across the service loop, icon tasks and
/// per-channel command readers. Cheap to clone; all fields sit behind `Arc`.
///
/// The store reacts to source events and bar commands, and its only side
/// effects point outward: broadcasts to the channel registry, or calls back
/// into the download source. It never waits on an observer.
#[derive(Clone)]
pub struct Store {
    source: Arc<dyn DownloadSource>,
    host: Arc<dyn TabHost>,
    registry: ChannelRegistry,
    /// Ids of downloads shown in the bar. Ids are assigned in increasing
    /// order, so ordered iteration reproduces creation order.
    active: Arc<Mutex<BTreeSet<DownloadId>>>,
    icons: Arc<Mutex<HashMap<DownloadId, String>>>,
    /// Downloads waiting to be claimed by an opener page, oldest first.
    opening_queue: Arc<Mutex<VecDeque<DownloadId>>>,
    /// Removals requested while no fresh channel existed to receive them.
    pending_removals: Arc<Mutex<Vec<DownloadId>>>,
}

impl Store {
    pub fn new(
        source: Arc<dyn DownloadSource>,
        host: Arc<dyn TabHost>,
        registry: ChannelRegistry,
    ) -> Self {
        Self {
            source,
            host,
            registry,
            active: Arc::new(Mutex::new(BTreeSet::new())),
            icons: Arc::new(Mutex::new(HashMap::new())),
            opening_queue: Arc::new(Mutex::new(VecDeque::new())),
            pending_removals: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn active_ids(&self) -> Vec<DownloadId> {
        self.active.lock().unwrap().iter().copied().collect()
    }

    /// A download started. Track it, announce it, and kick off icon resolution.
    pub fn on_created(&self, record: DownloadRecord) {
        info!(id = record.id, filename = %record.filename, "download started");
        self.active.lock().unwrap().insert(record.id);
        let id = record.id;
        self.registry.broadcast(&BarUpdate::Added { download: record });
        self.spawn_icon_fetch(id);
    }

    /// Something about a download changed. Surfaces only get current values.
    pub fn on_changed(&self, delta: DownloadDelta) {
        if delta.completed() {
            // Icons can change once a download finishes.
            self.spawn_icon_fetch(delta.id);
        }
        self.registry.broadcast(&BarUpdate::Changed { delta: delta.flatten() });
    }

    /// The source erased a download. Same path as a user removal, so any
    /// later event referencing the id finds nothing to act on.
    pub fn on_erased(&self, id: DownloadId) {
        self.remove_download(id);
    }

    /// Drops a download from the bar. Inert for ids that are not tracked:
    /// no broadcast may re-announce a download that was already dismissed.
    pub fn remove_download(&self, id: DownloadId) {
        let was_active = self.active.lock().unwrap().remove(&id);
        if !was_active {
            debug!(id, "ignoring removal of an untracked download");
            return;
        }
        self.icons.lock().unwrap().remove(&id);
        self.registry.broadcast(&BarUpdate::Removed { download_id: id });
    }

    /// Removes every active download, one broadcast per id so surfaces can
    /// animate each item out on its own.
    pub fn clear_all(&self) {
        let ids = self.active_ids();
        info!(count = ids.len(), "clearing all downloads from the bar");
        for id in ids {
            self.remove_download(id);
        }
    }

    /// Current record of every active download, merged with cached icons.
    /// Only used to greet a freshly installed channel.
    pub async fn snapshot(&self) -> Vec<DownloadRecord> {
        let ids = self.active_ids();
        let lookups = join_all(
            ids.iter()
                .map(|&id| self.source.search(SearchFilter::for_id(id))),
        )
        .await;

        let icons = self.icons.lock().unwrap();
        let mut downloads = Vec::with_capacity(ids.len());
        for (id, lookup) in ids.into_iter().zip(lookups) {
            match lookup.map(|records| records.into_iter().next()) {
                Ok(Some(mut record)) => {
                    record.icon_url = icons.get(&id).cloned().or(record.icon_url);
                    downloads.push(record);
                }
                Ok(None) => warn!(id, "active download unknown to the source"),
                Err(error) => warn!(id, %error, "download lookup failed"),
            }
        }
        downloads
    }

    /// Queues a removal until the next channel handshake. Used by the opener
    /// page, which dismisses a download before any bar exists to animate it.
    pub fn defer_removal(&self, id: DownloadId) {
        debug!(id, "removal deferred until the next channel connects");
        self.pending_removals.lock().unwrap().push(id);
    }

    /// Replays deferred removals through the normal removal path. Runs before
    /// a new channel's snapshot is assembled, so a dismissed download can
    /// never reappear there.
    pub fn drain_pending_removals(&self) {
        let pending = std::mem::take(&mut *self.pending_removals.lock().unwrap());
        for id in pending {
            self.remove_download(id);
        }
    }

    /// Next download an opener page is responsible for, in request order.
    pub fn take_download_to_open(&self) -> Option<DownloadId> {
        self.opening_queue.lock().unwrap().pop_front()
    }

    pub async fn handle_command(&self, command: BarCommand) {
        debug!(?command, "bar command");
        let result = match command {
            BarCommand::Open { download_id } => {
                self.open_via_helper(download_id).await;
                Ok(())
            }
            BarCommand::Show { download_id } => self.source.show(download_id).await,
            BarCommand::Pause { download_id } => self.source.pause(download_id).await,
            BarCommand::Resume { download_id } => self.source.resume(download_id).await,
            BarCommand::Cancel { download_id } => self.source.cancel(download_id).await,
            BarCommand::RemoveOne { download_id } => {
                self.remove_download(download_id);
                Ok(())
            }
            BarCommand::RemoveAll => {
                self.clear_all();
                Ok(())
            }
            BarCommand::ShowAllInFolder => self.source.show_default_folder().await,
        };
        if let Err(error) = result {
            // Typically "not found" for a download erased under our feet;
            // the bar just keeps whatever it was showing.
            warn!(?command, %error, "bar command failed");
        }
    }

    /// Opening a file needs user activation, which only the dedicated helper
    /// page has. Spawn it next to the active tab and queue the download id
    /// for the page to claim.
    async fn open_via_helper(&self, id: DownloadId) {
        let opener = match self.host.active_tab().await {
            Ok(active) => active.tab,
            Err(error) => {
                warn!(id, %error, "no active tab to anchor the opener page");
                return;
            }
        };
        if let Err(error) = self.host.open_helper_page(opener).await {
            warn!(id, %error, "could not open the helper page");
            return;
        }
        self.opening_queue.lock().unwrap().push_back(id);
    }

    fn spawn_icon_fetch(&self, id: DownloadId) {
        let store = self.clone();
        tokio::spawn(async move {
            match store.source.file_icon(id).await {
                Ok(icon_url) => {
                    store.icons.lock().unwrap().insert(id, icon_url.clone());
                    store
                        .registry
                        .broadcast(&BarUpdate::Changed { delta: DownloadChange::icon(id, icon_url) });
                }
                Err(error) => debug!(id, %error, "icon lookup failed"),
            }
        });
    }
}
