//! Context detection: zone prefix for a newly accepted gesture.
//!
//! Runs once per gesture. Priority: a live text selection, then a media
//! element under the start point, then no prefix. Image zones are not
//! assigned here; the dispatcher discovers them on a lookup miss.

use serde::{Deserialize, Serialize};

use super::glyph::ZonePrefix;
use super::sampler::{Point, Screen, TargetId, TouchSample};
use crate::config::Features;

/// Axis-aligned box in document pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// Snapshot of the document's active media element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaState {
    pub bounds: Rect,
    /// Still attached to the document.
    #[serde(default = "attached_default")]
    pub attached: bool,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default)]
    pub src: Option<String>,
}

fn attached_default() -> bool {
    true
}

/// Host queries the detector and handlers need from the document.
pub trait DocumentView {
    /// Current selected text, if any.
    fn selection_text(&self) -> Option<String>;

    /// The active media element, if any.
    fn active_media(&self) -> Option<MediaState>;

    /// Source of the image enclosing `target`, if it sits inside one.
    fn image_source(&self, target: TargetId) -> Option<String>;

    /// Link destination enclosing `target`, if any.
    fn link_href(&self, target: TargetId) -> Option<String>;
}

/// Everything a handler may inspect about one gesture.
///
/// Built at gesture start and owned by the classifier until dispatch,
/// where handlers receive a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureContext {
    pub target: TargetId,
    pub media: Option<MediaState>,
    pub selection: Option<String>,
    pub image: Option<String>,
    pub link: Option<String>,
    pub start: Point,
    pub end: Point,
}

/// Result of context detection for one gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub prefix: Option<ZonePrefix>,
    pub context: GestureContext,
}

#[derive(Debug, Clone)]
pub struct ContextDetector {
    screen: Screen,
    text_gestures: bool,
    media_gestures: bool,
}

impl ContextDetector {
    pub fn new(screen: Screen, features: &Features) -> Self {
        Self {
            screen,
            text_gestures: features.text_gestures,
            media_gestures: features.media_gestures,
        }
    }

    pub fn detect(&self, view: &dyn DocumentView, start: &TouchSample) -> Detection {
        let selection = view.selection_text().filter(|s| !s.is_empty());
        let media = view.active_media().filter(|m| m.attached);

        let prefix = if self.text_gestures && selection.is_some() {
            Some(ZonePrefix::Text)
        } else if let Some(m) = media.as_ref().filter(|_| self.media_gestures)
            && m.bounds.contains(start.point)
        {
            // System gestures own the top edge of a fullscreen player.
            if m.fullscreen && start.point.y < self.screen.height / 12.0 {
                Some(ZonePrefix::Interrupt)
            } else {
                Some(ZonePrefix::Video)
            }
        } else {
            None
        };

        tracing::trace!(prefix = ?prefix, target = start.target.0, "context detected");

        Detection {
            prefix,
            context: GestureContext {
                target: start.target,
                media,
                selection,
                image: view.image_source(start.target),
                link: view.link_href(start.target),
                start: start.point,
                end: start.point,
            },
        }
    }
}
