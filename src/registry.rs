//! One live bar channel per browser window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::host::{Port, WindowId};
use crate::protocol::{self, BarUpdate};
use crate::store::Store;

/// An installed channel: the outbound update sender coupled with the task
/// reading the surface's inbound commands. Dropping the channel tears both
/// down, so close and setup stay symmetric.
#[derive(Debug)]
pub struct Channel {
    id: Uuid,
    updates: mpsc::UnboundedSender<BarUpdate>,
    reader: JoinHandle<()>,
}

impl Channel {
    /// Takes ownership of a port and starts reading its commands into the store.
    pub fn spawn(port: Port, store: Store, window: WindowId) -> Self {
        let Port { id, updates, mut commands } = port;
        let reader = tokio::spawn(async move {
            while let Some(raw) = commands.recv().await {
                match protocol::parse_command(&raw) {
                    Ok(command) => store.handle_command(command).await,
                    Err(violation) => {
                        warn!(window, %violation, "dropping message from bar surface");
                    }
                }
            }
            debug!(window, "bar surface hung up");
        });
        Self { id, updates, reader }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn send(&self, update: &BarUpdate) -> bool {
        self.updates.send(update.clone()).is_ok()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Maps each window to its single live channel. Bars render per window but the
/// user only ever interacts with the active tab, so installing the channel for
/// a newly activated tab must close whatever the window had before.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: Arc<Mutex<HashMap<WindowId, Channel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `channel` as the window's only channel, closing any previous
    /// one first. The snapshot is delivered under the registry lock so that no
    /// concurrent broadcast can reach the new channel ahead of it.
    pub fn install(&self, window: WindowId, channel: Channel, snapshot: BarUpdate) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(old) = channels.remove(&window) {
            debug!(window, channel = %old.id, "closing replaced channel");
        }
        if channel.send(&snapshot) {
            info!(window, channel = %channel.id, "bar channel installed");
            channels.insert(window, channel);
        } else {
            warn!(window, "bar surface went away before its snapshot was delivered");
        }
    }

    pub fn evict(&self, window: WindowId) {
        if let Some(channel) = self.channels.lock().unwrap().remove(&window) {
            debug!(window, channel = %channel.id, "bar channel closed");
        }
    }

    /// Sends `update` to every live channel. A channel whose surface is gone
    /// fails the send and is dropped right here; the rest still get the update.
    pub fn broadcast(&self, update: &BarUpdate) {
        self.channels.lock().unwrap().retain(|window, channel| {
            let delivered = channel.send(update);
            if !delivered {
                debug!(window, channel = %channel.id, "dropping dead channel");
            }
            delivered
        });
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.channels.lock().unwrap().contains_key(&window)
    }

    pub fn len(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn close_all(&self) {
        let mut channels = self.channels.lock().unwrap();
        if !channels.is_empty() {
            info!(count = channels.len(), "closing all bar channels");
        }
        channels.clear();
    }
}
