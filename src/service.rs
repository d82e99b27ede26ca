//! The event loop tying source, store, poller and channels together.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Options;
use crate::host::{Port, TabEvent, TabHost, WindowId};
use crate::poller::ProgressPoller;
use crate::protocol::{BarUpdate, DownloadId};
use crate::registry::{Channel, ChannelRegistry};
use crate::source::{DownloadSource, SourceEvent};
use crate::store::Store;

/// Requests answered by the service outside the bar channels: the opener-page
/// handoff, deferred removals, and the one-time options read.
enum RuntimeRequest {
    TakeDownloadToOpen {
        reply: oneshot::Sender<Option<DownloadId>>,
    },
    DeferRemoval {
        download_id: DownloadId,
    },
    Options {
        reply: oneshot::Sender<Options>,
    },
    Shutdown,
}

/// Handle to a running download bar service.
///
/// The host adapter feeds lifecycle events into the two receivers handed to
/// [`DownloadBar::spawn`]; everything else happens inside one event-loop task,
/// so state mutations never race each other and every channel observes
/// broadcasts in event order.
pub struct DownloadBar {
    requests: mpsc::UnboundedSender<RuntimeRequest>,
    task: JoinHandle<()>,
}

impl DownloadBar {
    pub fn spawn(
        source: Arc<dyn DownloadSource>,
        host: Arc<dyn TabHost>,
        options: Options,
        source_events: mpsc::UnboundedReceiver<SourceEvent>,
        tab_events: mpsc::UnboundedReceiver<TabEvent>,
    ) -> Self {
        let registry = ChannelRegistry::new();
        let store = Store::new(source.clone(), host.clone(), registry.clone());
        let poller = ProgressPoller::new(source, registry.clone());
        let (requests, request_rx) = mpsc::unbounded_channel();

        let event_loop = EventLoop {
            store,
            host,
            options,
            registry,
            poller,
            source_events,
            tab_events,
            requests: request_rx,
        };
        let task = tokio::spawn(event_loop.run());

        Self { requests, task }
    }

    /// The download the calling opener page is responsible for, in request
    /// order. `None` when every queued download has been claimed.
    pub async fn download_to_open(&self) -> Option<DownloadId> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(RuntimeRequest::TakeDownloadToOpen { reply })
            .ok()?;
        answer.await.ok().flatten()
    }

    /// Queues a removal to run right before the next channel handshake, so
    /// the dismissal does not get lost while no bar is listening.
    pub fn defer_removal(&self, download_id: DownloadId) {
        let _ = self
            .requests
            .send(RuntimeRequest::DeferRemoval { download_id });
    }

    /// User options, read once by observer surfaces at startup.
    pub async fn options(&self) -> Option<Options> {
        let (reply, answer) = oneshot::channel();
        self.requests.send(RuntimeRequest::Options { reply }).ok()?;
        answer.await.ok()
    }

    /// Stops the event loop and closes every channel.
    pub async fn shutdown(self) {
        let _ = self.requests.send(RuntimeRequest::Shutdown);
        let _ = self.task.await;
    }
}

struct EventLoop {
    store: Store,
    host: Arc<dyn TabHost>,
    options: Options,
    registry: ChannelRegistry,
    poller: ProgressPoller,
    source_events: mpsc::UnboundedReceiver<SourceEvent>,
    tab_events: mpsc::UnboundedReceiver<TabEvent>,
    requests: mpsc::UnboundedReceiver<RuntimeRequest>,
}

impl EventLoop {
    async fn run(mut self) {
        info!("download bar service started");
        loop {
            tokio::select! {
                event = self.source_events.recv() => match event {
                    Some(event) => self.on_source_event(event),
                    None => break,
                },
                event = self.tab_events.recv() => match event {
                    Some(event) => self.on_tab_event(event).await,
                    None => break,
                },
                request = self.requests.recv() => match request {
                    Some(RuntimeRequest::TakeDownloadToOpen { reply }) => {
                        let _ = reply.send(self.store.take_download_to_open());
                    }
                    Some(RuntimeRequest::DeferRemoval { download_id }) => {
                        self.store.defer_removal(download_id);
                    }
                    Some(RuntimeRequest::Options { reply }) => {
                        let _ = reply.send(self.options.clone());
                    }
                    Some(RuntimeRequest::Shutdown) | None => break,
                },
                _ = self.poller.due(), if self.poller.is_armed() => self.poller.tick().await,
            }
        }
        self.registry.close_all();
        info!("download bar service stopped");
    }

    fn on_source_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Created(record) => {
                self.store.on_created(record);
                self.poller.restart();
            }
            SourceEvent::Changed(delta) => {
                self.store.on_changed(delta);
                // The change may mean a new download took over right as
                // another finished; the next tick sorts it out.
                self.poller.restart();
            }
            SourceEvent::Erased(id) => self.store.on_erased(id),
        }
    }

    async fn on_tab_event(&mut self, event: TabEvent) {
        match event {
            TabEvent::Activated { tab, window } => {
                // The outgoing tab's bar goes quiet before the new one talks.
                self.registry.evict(window);
                match self.host.connect(tab).await {
                    Ok(port) => self.install(window, port).await,
                    Err(error) => {
                        warn!(window, tab, %error, "connecting to the active tab failed");
                    }
                }
            }
            TabEvent::ConnectRequested { tab, window, active, port } => {
                if active {
                    self.install(window, port).await;
                } else {
                    debug!(window, tab, "rejecting connection from a background tab");
                    // Dropping the port tells the surface to disconnect.
                    drop(port);
                }
            }
            TabEvent::WindowRemoved { window } => self.registry.evict(window),
        }
    }

    /// Connection handshake. Deferred removals run first so the snapshot
    /// cannot resurrect a dismissed download; assembling the snapshot
    /// suspends this loop, so no lifecycle event lands in between; the
    /// registry then delivers the snapshot as the channel's first message.
    async fn install(&mut self, window: WindowId, port: Port) {
        self.store.drain_pending_removals();
        let downloads = self.store.snapshot().await;
        let channel = Channel::spawn(port, self.store.clone(), window);
        self.registry
            .install(window, channel, BarUpdate::Snapshot { downloads });
    }
}
