//! Relay envelope types exchanged between a nested frame and the top
//! frame.
//!
//! Every envelope is a map with a `type` discriminant and the sending
//! frame's id. Envelopes are fire-and-forget: no acknowledgement, no
//! retry, no ordering across frames.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gesture::context::GestureContext;
use crate::gesture::sampler::Point;

/// Identity of one mounted frame.
///
/// Carried as its hyphenated string form in every encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FrameId(Uuid);

impl From<FrameId> for String {
    fn from(id: FrameId) -> Self {
        id.0.to_string()
    }
}

impl TryFrom<String> for FrameId {
    type Error = uuid::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Uuid::parse_str(&s).map(Self)
    }
}

impl FrameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

/// Gesture context as it crosses the frame boundary.
///
/// Coordinates are in the sender's space; the top frame re-bases them
/// by the sender's mount offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSnapshot {
    pub start: Point,
    pub end: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl CoordinateSnapshot {
    pub fn from_context(cx: &GestureContext) -> Self {
        Self {
            start: cx.start,
            end: cx.end,
            selection: cx.selection.clone(),
            image: cx.image.clone(),
            link: cx.link.clone(),
        }
    }

    pub fn rebased(&self, offset: Point) -> Self {
        Self {
            start: self.start.offset(offset),
            end: self.end.offset(offset),
            ..self.clone()
        }
    }

    /// Context for a dispatch in the receiving frame.
    pub fn into_context(self) -> GestureContext {
        GestureContext {
            selection: self.selection,
            image: self.image,
            link: self.link,
            start: self.start,
            end: self.end,
            ..GestureContext::default()
        }
    }
}

/// All relay envelopes, tagged on `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RelayMessage {
    /// Sent on every release: the sender becomes the active source.
    LockNotify { frame: FrameId },

    FullscreenPermissionRequest { frame: FrameId },

    PathExecuteRequest {
        frame: FrameId,
        path: String,
        snapshot: CoordinateSnapshot,
    },

    /// Live position during a long-press or slide.
    CoordinatePush { frame: FrameId, point: Point },

    OrientationLockRequest {
        frame: FrameId,
        orientation: Orientation,
    },

    FullscreenRequest { frame: FrameId, enter: bool },

    /// Captured media bytes handed to the top frame.
    CaptureRelay {
        frame: FrameId,
        #[serde(with = "serde_bytes")]
        content: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
}

impl RelayMessage {
    pub fn frame(&self) -> FrameId {
        match self {
            RelayMessage::LockNotify { frame }
            | RelayMessage::FullscreenPermissionRequest { frame }
            | RelayMessage::PathExecuteRequest { frame, .. }
            | RelayMessage::CoordinatePush { frame, .. }
            | RelayMessage::OrientationLockRequest { frame, .. }
            | RelayMessage::FullscreenRequest { frame, .. }
            | RelayMessage::CaptureRelay { frame, .. } => *frame,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::LockNotify { .. } => "lock-notify",
            RelayMessage::FullscreenPermissionRequest { .. } => "fullscreen-permission-request",
            RelayMessage::PathExecuteRequest { .. } => "path-execute-request",
            RelayMessage::CoordinatePush { .. } => "coordinate-push",
            RelayMessage::OrientationLockRequest { .. } => "orientation-lock-request",
            RelayMessage::FullscreenRequest { .. } => "fullscreen-request",
            RelayMessage::CaptureRelay { .. } => "capture-relay",
        }
    }
}

/// Minimal envelope for messages whose `type` is not understood.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub frame: Option<FrameId>,
}
