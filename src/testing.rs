//! Test doubles for the host boundaries, shared by the module tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::HostError;
use crate::host::{ActiveTab, Port, PortPeer, TabHost, TabId, WindowId};
use crate::protocol::{BarUpdate, DownloadId, DownloadRecord, DownloadState};
use crate::registry::{Channel, ChannelRegistry};
use crate::source::{DownloadSource, SearchFilter};
use crate::store::Store;

pub fn record(id: DownloadId, state: DownloadState) -> DownloadRecord {
    DownloadRecord {
        id,
        url: format!("https://example.com/file-{id}.bin"),
        filename: format!("/downloads/file-{id}.bin"),
        state,
        bytes_received: 0,
        total_bytes: Some(1024),
        can_resume: false,
        paused: false,
        error: None,
        icon_url: None,
    }
}

pub fn empty_snapshot() -> BarUpdate {
    BarUpdate::Snapshot { downloads: Vec::new() }
}

/// Polls `condition` until it holds. Panics if it never does.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub async fn next_update(peer: &mut PortPeer) -> BarUpdate {
    tokio::time::timeout(Duration::from_secs(2), peer.updates.recv())
        .await
        .expect("timed out waiting for an update")
        .expect("channel closed while waiting for an update")
}

/// Installs a channel with an empty snapshot, for tests that only care about
/// the broadcasts after installation.
pub fn observer(store: &Store, registry: &ChannelRegistry, window: WindowId) -> PortPeer {
    let (port, peer) = Port::pair();
    let channel = Channel::spawn(port, store.clone(), window);
    registry.install(window, channel, empty_snapshot());
    peer
}

/// Installs a channel the way the service does: pending removals drained
/// first, then the real snapshot as the first message.
pub async fn handshake(store: &Store, registry: &ChannelRegistry, window: WindowId) -> PortPeer {
    store.drain_pending_removals();
    let downloads = store.snapshot().await;
    let (port, peer) = Port::pair();
    let channel = Channel::spawn(port, store.clone(), window);
    registry.install(window, channel, BarUpdate::Snapshot { downloads });
    peer
}

pub fn test_store() -> (Store, ChannelRegistry, Arc<MockSource>, Arc<MockHost>) {
    init_tracing();
    let source = Arc::new(MockSource::default());
    let host = Arc::new(MockHost::new());
    let registry = ChannelRegistry::new();
    let store = Store::new(source.clone(), host.clone(), registry.clone());
    (store, registry, source, host)
}

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory download subsystem with pluggable failures.
#[derive(Default)]
pub struct MockSource {
    records: Mutex<HashMap<DownloadId, DownloadRecord>>,
    icons: Mutex<HashMap<DownloadId, String>>,
    controls: Mutex<Vec<(String, DownloadId)>>,
    search_calls: AtomicUsize,
    icon_calls: AtomicUsize,
    pub fail_search: AtomicBool,
    pub fail_icons: AtomicBool,
}

impl MockSource {
    pub fn put(&self, record: DownloadRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub fn forget(&self, id: DownloadId) {
        self.records.lock().unwrap().remove(&id);
    }

    pub fn set_icon(&self, id: DownloadId, url: &str) {
        self.icons.lock().unwrap().insert(id, url.to_string());
    }

    /// Control calls seen so far, as `(operation, id)` pairs.
    pub fn control_calls(&self) -> Vec<(String, DownloadId)> {
        self.controls.lock().unwrap().clone()
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn icon_lookups(&self) -> usize {
        self.icon_calls.load(Ordering::SeqCst)
    }

    fn control(&self, operation: &str, id: DownloadId) -> Result<(), HostError> {
        if !self.records.lock().unwrap().contains_key(&id) {
            return Err(HostError::NotFound(id));
        }
        self.controls.lock().unwrap().push((operation.to_string(), id));
        Ok(())
    }
}

#[async_trait]
impl DownloadSource for MockSource {
    async fn search(&self, filter: SearchFilter) -> Result<Vec<DownloadRecord>, HostError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(HostError::Call("search unplugged".into()));
        }
        let records = self.records.lock().unwrap();
        let mut hits: Vec<_> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        hits.sort_by_key(|r| r.id);
        Ok(hits)
    }

    async fn file_icon(&self, id: DownloadId) -> Result<String, HostError> {
        self.icon_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_icons.load(Ordering::SeqCst) {
            return Err(HostError::Call("icons unplugged".into()));
        }
        self.icons
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(HostError::NotFound(id))
    }

    async fn pause(&self, id: DownloadId) -> Result<(), HostError> {
        self.control("pause", id)
    }

    async fn resume(&self, id: DownloadId) -> Result<(), HostError> {
        self.control("resume", id)
    }

    async fn cancel(&self, id: DownloadId) -> Result<(), HostError> {
        self.control("cancel", id)
    }

    async fn show(&self, id: DownloadId) -> Result<(), HostError> {
        self.control("show", id)
    }

    async fn open(&self, id: DownloadId) -> Result<(), HostError> {
        self.control("open", id)
    }

    async fn show_default_folder(&self) -> Result<(), HostError> {
        self.controls
            .lock()
            .unwrap()
            .push(("show_default_folder".to_string(), 0));
        Ok(())
    }
}

/// Tab machinery double: hands out port pairs and records helper pages.
pub struct MockHost {
    active: Mutex<ActiveTab>,
    peers: Mutex<Vec<PortPeer>>,
    helper_pages: Mutex<Vec<TabId>>,
    pub fail_connect: AtomicBool,
    pub fail_active_tab: AtomicBool,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(ActiveTab { tab: 100, window: 1 }),
            peers: Mutex::new(Vec::new()),
            helper_pages: Mutex::new(Vec::new()),
            fail_connect: AtomicBool::new(false),
            fail_active_tab: AtomicBool::new(false),
        }
    }

    pub fn set_active(&self, tab: TabId, window: WindowId) {
        *self.active.lock().unwrap() = ActiveTab { tab, window };
    }

    /// Oldest observer endpoint created by `connect` that was not taken yet.
    pub fn take_peer(&self) -> Option<PortPeer> {
        let mut peers = self.peers.lock().unwrap();
        if peers.is_empty() { None } else { Some(peers.remove(0)) }
    }

    /// Waits for the service to connect and yields the observer endpoint.
    pub async fn next_peer(&self) -> PortPeer {
        for _ in 0..400 {
            if let Some(peer) = self.take_peer() {
                return peer;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no connection arrived in time");
    }

    pub fn helper_pages(&self) -> Vec<TabId> {
        self.helper_pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl TabHost for MockHost {
    async fn active_tab(&self) -> Result<ActiveTab, HostError> {
        if self.fail_active_tab.load(Ordering::SeqCst) {
            return Err(HostError::Call("no focused window".into()));
        }
        Ok(*self.active.lock().unwrap())
    }

    async fn connect(&self, _tab: TabId) -> Result<Port, HostError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(HostError::Call("tab went away".into()));
        }
        let (port, peer) = Port::pair();
        self.peers.lock().unwrap().push(peer);
        Ok(port)
    }

    async fn open_helper_page(&self, opener: TabId) -> Result<(), HostError> {
        self.helper_pages.lock().unwrap().push(opener);
        Ok(())
    }
}
