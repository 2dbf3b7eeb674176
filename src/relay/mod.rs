//! Frame relay: nested frames request or mirror actions in the top
//! frame over directed per-frame channels.

pub mod codec;
pub mod hub;
pub mod link;
pub mod protocol;

use tokio::sync::mpsc;

pub use hub::{HubAction, RelayHub};
pub use link::{Envelope, FrameLink};
pub use protocol::FrameId;

/// Sending side shared by every nested frame of one document tree.
#[derive(Debug, Clone)]
pub struct RelayBus {
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Top-frame receiving side.
pub type RelayInbox = mpsc::UnboundedReceiver<Envelope>;

pub fn channel() -> (RelayBus, RelayInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RelayBus { tx }, rx)
}

impl RelayBus {
    /// Outlet for a frame the hub has mounted.
    pub fn link(&self, frame: FrameId) -> FrameLink {
        FrameLink::new(frame, self.tx.clone())
    }
}
