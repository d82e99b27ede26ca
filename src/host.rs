//! Boundary to the host's tab and window machinery.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::HostError;
use crate::protocol::BarUpdate;

pub type TabId = i64;
pub type WindowId = i64;

/// The active tab of the currently focused window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveTab {
    pub tab: TabId,
    pub window: WindowId,
}

/// Store-side endpoint of a bar channel, as handed over by the host when a
/// tab is connected. Updates flow out, raw command messages flow back in.
#[derive(Debug)]
pub struct Port {
    pub(crate) id: Uuid,
    pub(crate) updates: mpsc::UnboundedSender<BarUpdate>,
    pub(crate) commands: mpsc::UnboundedReceiver<Value>,
}

/// Observer-side endpoint, owned by the bar surface in the connected tab.
#[derive(Debug)]
pub struct PortPeer {
    pub updates: mpsc::UnboundedReceiver<BarUpdate>,
    pub commands: mpsc::UnboundedSender<Value>,
}

impl Port {
    /// Creates a connected endpoint pair. Host adapters call this in
    /// `connect` and when forwarding an unsolicited connection request.
    pub fn pair() -> (Port, PortPeer) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let port = Port {
            id: Uuid::new_v4(),
            updates: update_tx,
            commands: command_rx,
        };
        let peer = PortPeer {
            updates: update_rx,
            commands: command_tx,
        };
        (port, peer)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Tab lifecycle notifications pushed by the host into the service.
#[derive(Debug)]
pub enum TabEvent {
    /// A tab became the active tab of its window.
    Activated { tab: TabId, window: WindowId },
    /// A whole window went away.
    WindowRemoved { window: WindowId },
    /// A bar surface asked to connect on its own initiative (e.g. after its
    /// tab finished loading). Only honored when the tab is active; the port
    /// is dropped otherwise, which the surface observes as a disconnect.
    ConnectRequested {
        tab: TabId,
        window: WindowId,
        active: bool,
        port: Port,
    },
}

/// Imperative side of the host's tab machinery.
#[async_trait]
pub trait TabHost: Send + Sync + 'static {
    /// The active tab of the currently focused window.
    async fn active_tab(&self) -> Result<ActiveTab, HostError>;

    /// Connects to the bar surface in the given tab.
    async fn connect(&self, tab: TabId) -> Result<Port, HostError>;

    /// Opens the dedicated page that performs the actual file open with user
    /// activation, with `opener` as its opener tab. The host keeps this page
    /// out of session history.
    async fn open_helper_page(&self, opener: TabId) -> Result<(), HostError>;
}
