//! Top-frame relay state: mount table, lock target, fullscreen grants.
//!
//! All methods are pure state transitions with no I/O. The engine feeds
//! inbound envelopes through [`RelayHub::handle`] and performs whatever
//! [`HubAction`] comes back.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::gesture::path::GesturePath;
use crate::gesture::sampler::Point;

use super::codec::{DecodeResult, decode};
use super::link::Envelope;
use super::protocol::{CoordinateSnapshot, FrameId, Orientation, RelayMessage};

#[derive(Debug)]
struct MountedFrame {
    /// Position of the embedding element in top-frame coordinates.
    offset: Point,
    fullscreen_granted: bool,
}

/// What the top frame must do in response to a relay.
#[derive(Debug, Clone, PartialEq)]
pub enum HubAction {
    /// Dispatch `path` as if generated locally. Snapshot is already
    /// in top-frame coordinates.
    Execute {
        path: GesturePath,
        snapshot: CoordinateSnapshot,
    },
    Mirror(Point),
    /// First fullscreen grant for this frame; its element reloads once.
    ReloadFrame(FrameId),
    Fullscreen { frame: FrameId, enter: bool },
    LockOrientation {
        frame: FrameId,
        orientation: Orientation,
    },
    Capture {
        frame: FrameId,
        content: Vec<u8>,
        source: Option<String>,
    },
}

#[derive(Debug, Default)]
pub struct RelayHub {
    mounts: HashMap<FrameId, MountedFrame>,
    lock_target: Option<FrameId>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a nested frame embedded at `offset`.
    pub fn mount(&mut self, offset: Point) -> FrameId {
        let frame = FrameId::new();
        self.mounts.insert(
            frame,
            MountedFrame {
                offset,
                fullscreen_granted: false,
            },
        );
        debug!(%frame, x = offset.x, y = offset.y, "frame mounted");
        frame
    }

    pub fn unmount(&mut self, frame: FrameId) {
        self.mounts.remove(&frame);
        if self.lock_target == Some(frame) {
            self.lock_target = None;
        }
        debug!(%frame, "frame unmounted");
    }

    #[allow(dead_code)]
    pub fn lock_target(&self) -> Option<FrameId> {
        self.lock_target
    }

    #[allow(dead_code)]
    pub fn fullscreen_granted(&self, frame: FrameId) -> bool {
        self.mounts
            .get(&frame)
            .is_some_and(|m| m.fullscreen_granted)
    }

    pub fn handle(&mut self, envelope: Envelope) -> Option<HubAction> {
        let from = envelope.from;
        if !self.mounts.contains_key(&from) {
            debug!(frame = %from, "relay from unmounted frame dropped");
            return None;
        }

        let msg = match decode(&envelope.payload) {
            DecodeResult::Ok(msg) => msg,
            DecodeResult::UnknownType(raw) => {
                debug!(frame = %from, claimed = ?raw.frame, msg_type = %raw.msg_type, "unknown relay type dropped");
                return None;
            }
            DecodeResult::Malformed(e) => {
                warn!(frame = %from, error = %e, "malformed relay dropped");
                return None;
            }
        };

        if msg.frame() != from {
            warn!(frame = %from, claimed = %msg.frame(), "relay frame mismatch dropped");
            return None;
        }

        if let RelayMessage::LockNotify { .. } = msg {
            self.lock_target = Some(from);
            return None;
        }

        if self.lock_target != Some(from) {
            debug!(frame = %from, kind = msg.kind(), "relay from non-locked frame dropped");
            return None;
        }

        let mount = self.mounts.get_mut(&from)?;
        match msg {
            RelayMessage::LockNotify { .. } => None,
            RelayMessage::FullscreenPermissionRequest { frame } => {
                if mount.fullscreen_granted {
                    return None;
                }
                mount.fullscreen_granted = true;
                Some(HubAction::ReloadFrame(frame))
            }
            RelayMessage::PathExecuteRequest { path, snapshot, .. } => {
                match path.parse::<GesturePath>() {
                    Ok(path) => Some(HubAction::Execute {
                        path,
                        snapshot: snapshot.rebased(mount.offset),
                    }),
                    Err(e) => {
                        warn!(frame = %from, %path, error = %e, "relayed path rejected");
                        None
                    }
                }
            }
            RelayMessage::CoordinatePush { point, .. } => {
                Some(HubAction::Mirror(point.offset(mount.offset)))
            }
            RelayMessage::OrientationLockRequest { frame, orientation } => {
                Some(HubAction::LockOrientation { frame, orientation })
            }
            RelayMessage::FullscreenRequest { frame, enter } => {
                Some(HubAction::Fullscreen { frame, enter })
            }
            RelayMessage::CaptureRelay {
                frame,
                content,
                source,
            } => Some(HubAction::Capture {
                frame,
                content,
                source,
            }),
        }
    }
}
