//! Deterministic replay of recorded contact traces.
//!
//! A trace is JSON lines, one [`TraceRecord`] per line, tagged on
//! `event`. Time is virtual: before each record the engine is advanced
//! to the record's `t`, so long-press and slide timers fire exactly
//! where they would have live. With [`FrameRole::Nested`] the trace
//! drives a nested engine relaying into an in-process top engine.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::config::Settings;
use crate::dispatch::host::{HostPrimitives, LogNotifier};
use crate::dispatch::{Executed, FrameRole};
use crate::gesture::context::{DocumentView, MediaState};
use crate::gesture::sampler::{ContactEvent, ContactKind, Point, Screen, TargetId};
use crate::relay::{self, FrameId, RelayHub, RelayInbox};

use super::{Endpoint, EngineEvent, GestureEngine, HostEvent};

/// Virtual time granted after the last record for pending timers.
pub const SETTLE_MS: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read trace {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("trace line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageRef {
    pub target: TargetId,
    pub src: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkRef {
    pub target: TargetId,
    pub href: String,
}

/// Document state described by a trace's `scene` records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub selection: Option<String>,
    #[serde(default)]
    pub media: Option<MediaState>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub links: Vec<LinkRef>,
}

impl DocumentView for SceneDocument {
    fn selection_text(&self) -> Option<String> {
        self.selection.clone()
    }

    fn active_media(&self) -> Option<MediaState> {
        self.media.clone()
    }

    fn image_source(&self, target: TargetId) -> Option<String> {
        self.images
            .iter()
            .find(|i| i.target == target)
            .map(|i| i.src.clone())
    }

    fn link_href(&self, target: TargetId) -> Option<String> {
        self.links
            .iter()
            .find(|l| l.target == target)
            .map(|l| l.href.clone())
    }
}

/// Contact fields of a touch record.
#[derive(Debug, Clone, Deserialize)]
pub struct TouchRecord {
    pub t: u64,
    #[serde(default)]
    pub touches: Vec<Point>,
    #[serde(default)]
    pub changed: Vec<Point>,
    #[serde(default)]
    pub target: TargetId,
}

impl TouchRecord {
    fn contact(&self, kind: ContactKind) -> ContactEvent {
        ContactEvent {
            kind,
            t: self.t,
            touches: self.touches.clone(),
            changed: self.changed.clone(),
            target: self.target,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TraceRecord {
    Screen(Screen),
    Scene(SceneDocument),
    Start(TouchRecord),
    Move(TouchRecord),
    End(TouchRecord),
    Cancel(TouchRecord),
    Navigate { t: u64 },
    Hidden { t: u64 },
    /// Nested frame hands captured bytes to the top frame.
    Capture {
        t: u64,
        #[serde(default)]
        content: Vec<u8>,
        #[serde(default)]
        source: Option<String>,
    },
    /// Top frame removes the nested frame.
    Unmount { t: u64 },
}

impl TraceRecord {
    /// Live equivalent of this record. `screen` and `scene` records have
    /// none.
    pub fn to_host_event(&self) -> Option<HostEvent> {
        let contact = |r: &TouchRecord, kind| Some(HostEvent::Contact(r.contact(kind)));
        match self {
            TraceRecord::Start(r) => contact(r, ContactKind::Start),
            TraceRecord::Move(r) => contact(r, ContactKind::Move),
            TraceRecord::End(r) => contact(r, ContactKind::End),
            TraceRecord::Cancel(r) => contact(r, ContactKind::Cancel),
            TraceRecord::Navigate { .. } => Some(HostEvent::Navigate),
            TraceRecord::Hidden { .. } => Some(HostEvent::Hidden),
            TraceRecord::Screen(_)
            | TraceRecord::Scene(_)
            | TraceRecord::Capture { .. }
            | TraceRecord::Unmount { .. } => None,
        }
    }
}

/// Parse JSON-lines trace text. Blank lines and `#` comments are skipped.
pub fn parse_trace(text: &str) -> Result<Vec<TraceRecord>, ReplayError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| ReplayError::Parse {
                line: i + 1,
                source,
            })
        })
        .collect()
}

pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>, ReplayError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_trace(&text)
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Frame the trace was recorded in.
    pub role: FrameRole,
    /// Mount offset of the nested frame in top-frame coordinates.
    pub offset: Point,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            role: FrameRole::Top,
            offset: Point::default(),
        }
    }
}

/// One executed action and the frame that ran it.
#[derive(Debug, Clone, PartialEq)]
pub struct Replayed {
    pub frame: FrameRole,
    pub executed: Executed,
}

impl fmt::Display for Replayed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = match self.frame {
            FrameRole::Top => "top",
            FrameRole::Nested => "nested",
        };
        write!(f, "{frame} {} {}", self.executed.path, self.executed.name)?;
        if let Err(e) = &self.executed.result {
            write!(f, " failed: {e}")?;
        }
        Ok(())
    }
}

type SceneEngine = GestureEngine<SceneDocument, LogNotifier>;

struct Session {
    top: SceneEngine,
    nested: Option<(SceneEngine, RelayInbox)>,
    frame: Option<FrameId>,
    out: Vec<Replayed>,
}

impl Session {
    fn driven(&mut self) -> &mut SceneEngine {
        match &mut self.nested {
            Some((engine, _)) => engine,
            None => &mut self.top,
        }
    }

    /// Move nested events and relays across, then collect top events.
    fn pump(&mut self) {
        if let Some((nested, inbox)) = &mut self.nested {
            collect(FrameRole::Nested, nested.drain_events(), &mut self.out);
            while let Ok(envelope) = inbox.try_recv() {
                self.top.handle_envelope(envelope);
            }
        }
        collect(FrameRole::Top, self.top.drain_events(), &mut self.out);
    }
}

fn collect(frame: FrameRole, events: Vec<EngineEvent>, out: &mut Vec<Replayed>) {
    for event in events {
        match event {
            EngineEvent::Executed(executed) => out.push(Replayed { frame, executed }),
            other => debug!(?frame, event = ?other, "replay event"),
        }
    }
}

/// Replay `records` and return every executed action in order.
///
/// `host` is called once per engine.
pub fn replay(
    records: &[TraceRecord],
    settings: &Settings,
    options: &ReplayOptions,
    host: &dyn Fn() -> Box<dyn HostPrimitives>,
) -> Vec<Replayed> {
    let screen = records
        .iter()
        .find_map(|r| match r {
            TraceRecord::Screen(screen) => Some(*screen),
            _ => None,
        })
        .unwrap_or_default();

    let mut top = GestureEngine::from_settings(
        SceneDocument::default(),
        screen,
        settings,
        Endpoint::Top(RelayHub::new()),
        host(),
        LogNotifier,
    );
    let frame = match options.role {
        FrameRole::Top => None,
        FrameRole::Nested => top.mount_frame(options.offset),
    };
    let nested = frame.map(|frame| {
        let (bus, inbox) = relay::channel();
        let engine = GestureEngine::from_settings(
            SceneDocument::default(),
            screen,
            settings,
            Endpoint::Nested(bus.link(frame)),
            host(),
            LogNotifier,
        );
        (engine, inbox)
    });

    let mut session = Session {
        top,
        nested,
        frame,
        out: Vec::new(),
    };
    let mut now = 0;

    for record in records {
        let at = match record {
            TraceRecord::Start(r)
            | TraceRecord::Move(r)
            | TraceRecord::End(r)
            | TraceRecord::Cancel(r) => r.t,
            TraceRecord::Navigate { t }
            | TraceRecord::Hidden { t }
            | TraceRecord::Capture { t, .. }
            | TraceRecord::Unmount { t } => *t,
            TraceRecord::Screen(_) | TraceRecord::Scene(_) => now,
        };
        now = now.max(at);
        session.driven().advance(now);
        session.pump();

        if let TraceRecord::Unmount { .. } = record {
            match session.frame.take() {
                Some(frame) => session.top.unmount_frame(frame),
                None => debug!("unmount ignored: no nested frame"),
            }
            continue;
        }

        let engine = session.driven();
        match record {
            TraceRecord::Screen(_) => {}
            TraceRecord::Scene(scene) => *engine.document_mut() = scene.clone(),
            TraceRecord::Start(r) => engine.handle_contact(&r.contact(ContactKind::Start)),
            TraceRecord::Move(r) => engine.handle_contact(&r.contact(ContactKind::Move)),
            TraceRecord::End(r) => engine.handle_contact(&r.contact(ContactKind::End)),
            TraceRecord::Cancel(r) => engine.handle_contact(&r.contact(ContactKind::Cancel)),
            TraceRecord::Navigate { .. } | TraceRecord::Hidden { .. } => engine.cancel(),
            TraceRecord::Capture {
                content, source, ..
            } => engine.relay_capture(content.clone(), source.clone()),
            TraceRecord::Unmount { .. } => {}
        }
        session.pump();
    }

    session.driven().advance(now + SETTLE_MS);
    session.pump();
    session.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::host::LogHost;

    fn run(trace: &str, role: FrameRole) -> Vec<String> {
        let records = parse_trace(trace).unwrap();
        let options = ReplayOptions {
            role,
            ..Default::default()
        };
        let host = || -> Box<dyn HostPrimitives> { Box::new(LogHost) };
        replay(&records, &Settings::default(), &options, &host)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    const BACK: &str = r#"
# two quick opposite swipes
{"event":"screen","width":400,"height":800}
{"event":"start","t":0,"changed":[{"x":200,"y":400}],"touches":[{"x":200,"y":400}]}
{"event":"move","t":20,"touches":[{"x":280,"y":400}]}
{"event":"move","t":40,"touches":[{"x":220,"y":400}]}
{"event":"end","t":60,"changed":[{"x":220,"y":400}]}
"#;

    const CLOSE: &str = r#"
{"event":"start","t":0,"touches":[{"x":100,"y":100}]}
{"event":"move","t":20,"touches":[{"x":200,"y":100}]}
{"event":"move","t":40,"touches":[{"x":200,"y":200}]}
{"event":"end","t":60,"changed":[{"x":200,"y":200}]}
"#;

    #[test]
    fn top_frame_back_gesture() {
        assert_eq!(run(BACK, FrameRole::Top), vec!["top →← Back"]);
    }

    #[test]
    fn nested_top_only_action_runs_in_top_frame() {
        assert_eq!(run(CLOSE, FrameRole::Nested), vec!["top →↓ Close page"]);
    }

    #[test]
    fn nested_both_scope_action_runs_in_both_frames() {
        let trace = r#"
{"event":"scene","selection":"quoted"}
{"event":"start","t":0,"touches":[{"x":200,"y":400}]}
{"event":"move","t":20,"touches":[{"x":200,"y":300}]}
{"event":"end","t":40,"changed":[{"x":200,"y":300}]}
"#;
        assert_eq!(
            run(trace, FrameRole::Nested),
            vec!["nested T↑ Copy selection", "top T↑ Copy selection"]
        );
    }

    #[test]
    fn video_hold_dispatches_start_then_restore() {
        let trace = r#"
{"event":"scene","media":{"bounds":{"x":0,"y":0,"width":400,"height":300},"src":"v.mp4"}}
{"event":"start","t":0,"touches":[{"x":100,"y":100}]}
{"event":"end","t":400,"changed":[{"x":100,"y":100}]}
"#;
        assert_eq!(
            run(trace, FrameRole::Top),
            vec!["top V● Speed up", "top ●○ Restore speed"]
        );
    }

    #[test]
    fn navigation_drops_the_gesture() {
        let trace = r#"
{"event":"start","t":0,"touches":[{"x":100,"y":100}]}
{"event":"move","t":20,"touches":[{"x":200,"y":100}]}
{"event":"navigate","t":30}
{"event":"move","t":40,"touches":[{"x":200,"y":200}]}
{"event":"end","t":60,"changed":[{"x":200,"y":200}]}
"#;
        assert!(run(trace, FrameRole::Top).is_empty());
    }

    #[test]
    fn image_gesture_without_prefix_finds_image_action() {
        let trace = r#"
{"event":"scene","images":[{"target":5,"src":"https://example.com/a.png"}]}
{"event":"start","t":0,"target":5,"touches":[{"x":200,"y":200}]}
{"event":"move","t":20,"target":5,"touches":[{"x":200,"y":300}]}
{"event":"end","t":40,"target":5,"changed":[{"x":200,"y":300}]}
"#;
        assert_eq!(run(trace, FrameRole::Top), vec!["top I↓ Open image"]);
    }

    #[test]
    fn unmounted_frame_relays_are_dropped() {
        let trace = format!("{{\"event\":\"unmount\",\"t\":0}}\n{CLOSE}");
        assert!(run(&trace, FrameRole::Nested).is_empty());
    }

    #[test]
    fn only_touch_and_lifecycle_records_map_to_live_events() {
        let records = parse_trace(
            r#"
{"event":"capture","t":5,"content":[1,2,3],"source":"blob:x"}
{"event":"hidden","t":6}
{"event":"move","t":7,"touches":[{"x":1,"y":2}]}
"#,
        )
        .unwrap();
        assert!(records[0].to_host_event().is_none());
        assert!(matches!(records[1].to_host_event(), Some(HostEvent::Hidden)));
        assert!(matches!(
            records[2].to_host_event(),
            Some(HostEvent::Contact(ContactEvent {
                kind: ContactKind::Move,
                t: 7,
                ..
            }))
        ));
    }

    #[test]
    fn parse_error_reports_line() {
        let err = parse_trace("\n{\"event\":\"start\",\"t\":0}\n{\"event\":\"wiggle\"}\n").unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 3, .. }), "{err}");
    }
}
