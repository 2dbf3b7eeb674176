//! Nested-frame relay outlet.
//!
//! A [`FrameLink`] owns the sending half of one frame's directed
//! channel. Every relay goes through [`FrameLink::send`], which emits a
//! `lock-notify` first whenever the frame has not locked since its last
//! gesture began, so the hub always sees the lock before anything it
//! would act on.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dispatch::registry::FrameRequest;
use crate::gesture::context::GestureContext;
use crate::gesture::path::GesturePath;
use crate::gesture::sampler::Point;

use super::codec;
use super::protocol::{CoordinateSnapshot, FrameId, RelayMessage};

/// One encoded relay, tagged with its sender.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: FrameId,
    pub payload: Bytes,
}

#[derive(Debug)]
pub struct FrameLink {
    frame: FrameId,
    tx: mpsc::UnboundedSender<Envelope>,
    locked: bool,
}

impl FrameLink {
    pub(super) fn new(frame: FrameId, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            frame,
            tx,
            locked: false,
        }
    }

    pub fn id(&self) -> FrameId {
        self.frame
    }

    /// A new gesture started in this frame; the next relay re-locks.
    pub fn begin_gesture(&mut self) {
        self.locked = false;
    }

    /// Release observed: claim the lock unconditionally.
    pub fn notify_release(&mut self) {
        self.emit(&RelayMessage::LockNotify { frame: self.frame });
        self.locked = true;
    }

    pub fn request_path(&mut self, path: &GesturePath, context: &GestureContext) {
        self.send(RelayMessage::PathExecuteRequest {
            frame: self.frame,
            path: path.to_string(),
            snapshot: CoordinateSnapshot::from_context(context),
        });
    }

    pub fn push_coordinate(&mut self, point: Point) {
        self.send(RelayMessage::CoordinatePush {
            frame: self.frame,
            point,
        });
    }

    pub fn request_fullscreen_permission(&mut self) {
        self.send(RelayMessage::FullscreenPermissionRequest { frame: self.frame });
    }

    pub fn request(&mut self, request: &FrameRequest) {
        let msg = match *request {
            FrameRequest::Fullscreen { enter } => RelayMessage::FullscreenRequest {
                frame: self.frame,
                enter,
            },
            FrameRequest::OrientationLock { orientation } => {
                RelayMessage::OrientationLockRequest {
                    frame: self.frame,
                    orientation,
                }
            }
        };
        self.send(msg);
    }

    pub fn relay_capture(&mut self, content: Vec<u8>, source: Option<String>) {
        self.send(RelayMessage::CaptureRelay {
            frame: self.frame,
            content,
            source,
        });
    }

    fn send(&mut self, msg: RelayMessage) {
        if !self.locked {
            self.notify_release();
        }
        self.emit(&msg);
    }

    fn emit(&self, msg: &RelayMessage) {
        let payload = match codec::encode(msg) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(frame = %self.frame, kind = msg.kind(), error = %e, "relay encode failed");
                return;
            }
        };
        let envelope = Envelope {
            from: self.frame,
            payload,
        };
        if self.tx.send(envelope).is_err() {
            debug!(frame = %self.frame, kind = msg.kind(), "relay dropped: top frame gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::codec::{DecodeResult, decode};

    fn kinds(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Vec<&'static str> {
        let mut out = Vec::new();
        while let Ok(env) = rx.try_recv() {
            match decode(&env.payload) {
                DecodeResult::Ok(msg) => out.push(msg.kind()),
                other => panic!("undecodable envelope: {other:?}"),
            }
        }
        out
    }

    #[test]
    fn first_relay_is_preceded_by_lock() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut link = FrameLink::new(FrameId::new(), tx);
        link.push_coordinate(Point::new(1.0, 1.0));
        link.push_coordinate(Point::new(2.0, 2.0));
        assert_eq!(
            kinds(&mut rx),
            vec!["lock-notify", "coordinate-push", "coordinate-push"]
        );
    }

    #[test]
    fn release_always_locks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut link = FrameLink::new(FrameId::new(), tx);
        link.notify_release();
        link.request_path(&"→↓".parse().unwrap(), &GestureContext::default());
        link.notify_release();
        assert_eq!(
            kinds(&mut rx),
            vec!["lock-notify", "path-execute-request", "lock-notify"]
        );
    }

    #[test]
    fn new_gesture_relocks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut link = FrameLink::new(FrameId::new(), tx);
        link.request_fullscreen_permission();
        link.begin_gesture();
        link.request(&FrameRequest::Fullscreen { enter: true });
        assert_eq!(
            kinds(&mut rx),
            vec![
                "lock-notify",
                "fullscreen-permission-request",
                "lock-notify",
                "fullscreen-request"
            ]
        );
    }

    #[test]
    fn closed_channel_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut link = FrameLink::new(FrameId::new(), tx);
        link.relay_capture(vec![1, 2, 3], None);
    }

    #[test]
    fn envelopes_carry_sender() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let frame = FrameId::new();
        let mut link = FrameLink::new(frame, tx);
        link.notify_release();
        assert_eq!(rx.try_recv().unwrap().from, frame);
        assert_eq!(link.id(), frame);
    }
}
