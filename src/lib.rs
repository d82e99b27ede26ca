//! Keeps per-window download bars in sync with the host's active downloads.
//!
//! The host adapter implements [`DownloadSource`] and [`TabHost`], feeds
//! lifecycle events into [`DownloadBar::spawn`], and hands each bar surface a
//! [`PortPeer`]. Every surface first receives a full snapshot, then
//! added/changed/removed updates, and sends user commands back over the same
//! channel.

mod config;
mod error;
mod host;
mod poller;
mod protocol;
mod registry;
mod service;
mod source;
mod store;

#[cfg(test)]
mod testing;

pub use crate::config::{DefaultAction, Options};
pub use crate::error::HostError;
pub use crate::host::{ActiveTab, Port, PortPeer, TabEvent, TabHost, TabId, WindowId};
pub use crate::poller::{POLL_PERIOD, ProgressPoller};
pub use crate::protocol::{
    BarCommand, BarUpdate, DownloadChange, DownloadDelta, DownloadId, DownloadRecord,
    DownloadState, FieldDelta, ProtocolViolation, parse_command,
};
pub use crate::registry::{Channel, ChannelRegistry};
pub use crate::service::DownloadBar;
pub use crate::source::{DownloadSource, SearchFilter, SourceEvent};
pub use crate::store::Store;
