//! Touch sampler: raw contact events to timestamped samples.
//!
//! Tracks the live contact count and merges a release that is followed
//! almost immediately by a nearby new contact into one logical gesture
//! (break-touch suppression). The release is therefore held back for
//! [`BREAK_TOUCH_MS`] before it is reported; the engine flushes it
//! through [`TouchSampler::flush`] once [`TouchSampler::next_deadline`]
//! passes.

use serde::{Deserialize, Serialize};

/// Hold-back window for a release that may be a finger micro-lift.
pub const BREAK_TOUCH_MS: u64 = 60;

/// A coordinate in document pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance. No square roots anywhere in the
    /// classifier; thresholds are squared too.
    pub fn dist_sq(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn offset(self, by: Point) -> Point {
        Point::new(self.x + by.x, self.y + by.y)
    }
}

/// Viewport size used to scale every threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub width: f64,
    pub height: f64,
}

impl Screen {
    pub fn min_dim(&self) -> f64 {
        self.width.min(self.height)
    }

    pub fn min_dim_sq(&self) -> f64 {
        self.min_dim() * self.min_dim()
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            width: 400.0,
            height: 800.0,
        }
    }
}

/// Opaque handle of the element a contact started on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub u64);

/// A normalized touch sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchSample {
    /// Host clock in milliseconds.
    pub t: u64,
    pub point: Point,
    pub target: TargetId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Start,
    Move,
    End,
    Cancel,
}

/// A raw contact event as delivered by the host document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub kind: ContactKind,
    pub t: u64,
    /// Contacts still on the surface after this event.
    #[serde(default)]
    pub touches: Vec<Point>,
    /// Contacts that changed in this event (the lifted one for `end`).
    #[serde(default)]
    pub changed: Vec<Point>,
    #[serde(default)]
    pub target: TargetId,
}

/// Normalized sampler output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplerEvent {
    Start { sample: TouchSample, contacts: usize },
    Move { sample: TouchSample, contacts: usize },
    /// Re-touch merged into the gesture whose release was held back.
    Resume { sample: TouchSample, contacts: usize },
    /// `contacts` is the count remaining after the release.
    End { sample: TouchSample, contacts: usize },
    Cancel,
}

#[derive(Debug)]
pub struct TouchSampler {
    screen: Screen,
    break_touch: bool,
    contacts: usize,
    pending_release: Option<TouchSample>,
}

impl TouchSampler {
    pub fn new(screen: Screen, break_touch: bool) -> Self {
        Self {
            screen,
            break_touch,
            contacts: 0,
            pending_release: None,
        }
    }

    #[allow(dead_code)]
    pub fn contacts(&self) -> usize {
        self.contacts
    }

    /// Time of the release currently held back, if any.
    pub fn held_release(&self) -> Option<u64> {
        self.pending_release.map(|s| s.t)
    }

    /// Deadline at which a held-back release must be reported.
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending_release.map(|s| s.t + BREAK_TOUCH_MS)
    }

    /// Report a held-back release whose window has expired.
    pub fn flush(&mut self, now: u64) -> Option<SamplerEvent> {
        let release = self.pending_release?;
        if now < release.t + BREAK_TOUCH_MS {
            return None;
        }
        self.pending_release = None;
        Some(SamplerEvent::End {
            sample: release,
            contacts: 0,
        })
    }

    /// Drop any held-back release without reporting it.
    pub fn reset(&mut self) {
        self.pending_release = None;
        self.contacts = 0;
    }

    /// Normalize one raw event. Malformed events (no coordinates where
    /// one is needed) produce nothing.
    pub fn process(&mut self, event: &ContactEvent) -> Vec<SamplerEvent> {
        let mut out = Vec::with_capacity(2);

        if event.kind == ContactKind::Cancel {
            self.reset();
            out.push(SamplerEvent::Cancel);
            return out;
        }

        let Some(point) = event
            .changed
            .first()
            .or_else(|| event.touches.first())
            .copied()
        else {
            tracing::trace!(kind = ?event.kind, t = event.t, "contact event without coordinates");
            return out;
        };
        let sample = TouchSample {
            t: event.t,
            point,
            target: event.target,
        };
        let contacts = match event.kind {
            // Some hosts omit the touch list on start; the new contact counts.
            ContactKind::Start => event.touches.len().max(self.contacts + 1),
            _ => event.touches.len(),
        };
        self.contacts = contacts;

        match event.kind {
            ContactKind::Start => {
                if let Some(release) = self.pending_release.take() {
                    if contacts == 1 && self.is_micro_lift(&release, &sample) {
                        tracing::trace!(t = sample.t, "break-touch merged into previous gesture");
                        out.push(SamplerEvent::Resume { sample, contacts });
                        return out;
                    }
                    out.push(SamplerEvent::End {
                        sample: release,
                        contacts: 0,
                    });
                }
                out.push(SamplerEvent::Start { sample, contacts });
            }
            ContactKind::Move => {
                if self.pending_release.is_none() {
                    out.push(SamplerEvent::Move { sample, contacts });
                }
            }
            ContactKind::End => {
                if contacts == 0 && self.break_touch {
                    self.pending_release = Some(sample);
                } else {
                    out.push(SamplerEvent::End { sample, contacts });
                }
            }
            ContactKind::Cancel => {}
        }
        out
    }

    fn is_micro_lift(&self, release: &TouchSample, sample: &TouchSample) -> bool {
        let limit = self.screen.min_dim() / 10.0;
        sample.t.saturating_sub(release.t) <= BREAK_TOUCH_MS
            && release.point.dist_sq(sample.point) <= limit * limit
    }
}
