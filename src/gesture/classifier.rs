//! Path classifier: the timing and distance state machine.
//!
//! [`GestureClassifier::classify`] is a pure transition: it consumes one
//! [`ClassifierInput`] and returns a [`Step`] describing the new state,
//! the glyph appended (if any), a path to dispatch (if any) and a
//! coordinate to mirror during long-press or slide. Timers are kept as
//! deadlines; the owner feeds them back as [`ClassifierInput::Timer`]
//! once [`GestureClassifier::next_deadline`] has passed. Rescheduling a
//! timer replaces its previous deadline, so at most one deadline per
//! category is pending.
//!
//! All distances are squared pixels scaled by the smaller screen
//! dimension.

use super::context::{Detection, GestureContext};
use super::glyph::{Direction, Glyph, ZonePrefix};
use super::path::GesturePath;
use super::sampler::{Point, Screen, TouchSample};

/// Stillness required before a long-press starts.
pub const LONG_PRESS_MS: u64 = 300;
/// A direction change this soon after a glyph needs no full slide limit.
pub const QUICK_REVERSAL_MS: u64 = 50;
/// Delay after a direction glyph before a continuous slide may start.
pub const SLIDE_ARM_MS: u64 = 400;
/// Motion must have been seen this recently for a slide to start.
pub const SLIDE_MOTION_WINDOW_MS: u64 = 100;
/// Re-dispatch cadence while sliding.
pub const SLIDE_REPEAT_MS: u64 = 100;
/// Slide-limit decay per accepted glyph.
pub const SLIDE_DECAY: f64 = 0.64;

/// Distance thresholds derived from the screen and sensitivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Initial slide limit, `min(w, h)² × sensitivity`.
    pub base: f64,
    /// Squared movement under which a contact is still a tap.
    pub tap: f64,
}

impl Thresholds {
    pub fn new(screen: Screen, sensitivity: f64) -> Self {
        let base = screen.min_dim_sq() * sensitivity;
        Self {
            base,
            tap: base / 4.0,
        }
    }

    pub fn floor(&self) -> f64 {
        self.base / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    Idle,
    Sampling,
    DirectionAccumulating,
    LongPress,
    ContinuousSlide,
    /// More than one contact; classification suspended until all lift.
    Interrupted,
    /// Reported by the release step that dispatched; the classifier
    /// itself is already back to `Idle`.
    Dispatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    LongPress,
    Slide,
}

#[derive(Debug, Clone)]
pub enum ClassifierInput {
    Start {
        sample: TouchSample,
        contacts: usize,
        detection: Detection,
    },
    Move {
        sample: TouchSample,
        contacts: usize,
    },
    /// `contacts` is the number still down after the release.
    End {
        sample: TouchSample,
        contacts: usize,
    },
    Timer {
        kind: TimerKind,
        now: u64,
    },
    Cancel,
}

/// A path ready for the dispatcher, with its context snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub path: GesturePath,
    pub context: GestureContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: ClassifierState,
    pub glyph: Option<Glyph>,
    pub dispatch: Option<Dispatch>,
    pub push: Option<Point>,
}

impl Step {
    fn state(state: ClassifierState) -> Self {
        Self {
            state,
            glyph: None,
            dispatch: None,
            push: None,
        }
    }
}

#[derive(Debug)]
pub struct GestureClassifier {
    thresholds: Thresholds,
    state: ClassifierState,
    path: GesturePath,
    context: GestureContext,

    start: Option<TouchSample>,
    anchor: Option<TouchSample>,
    latest: Option<TouchSample>,
    /// Last point that counted as qualifying movement.
    motion_ref: Point,
    last_motion: Option<(u64, Direction)>,

    slide_limit: f64,
    last_direction: Option<Direction>,
    last_glyph_t: Option<u64>,
    max_travel_sq: f64,

    long_press_deadline: Option<u64>,
    slide_deadline: Option<u64>,
}

impl GestureClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            state: ClassifierState::Idle,
            path: GesturePath::new(),
            context: GestureContext::default(),
            start: None,
            anchor: None,
            latest: None,
            motion_ref: Point::default(),
            last_motion: None,
            slide_limit: thresholds.base,
            last_direction: None,
            last_glyph_t: None,
            max_travel_sq: 0.0,
            long_press_deadline: None,
            slide_deadline: None,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> ClassifierState {
        self.state
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &GesturePath {
        &self.path
    }

    #[allow(dead_code)]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Current squared-distance limit for the next direction glyph.
    #[allow(dead_code)]
    pub fn slide_limit(&self) -> f64 {
        self.slide_limit
    }

    /// Whether a new contact would start a gesture right now.
    pub fn accepts_start(&self) -> bool {
        self.state == ClassifierState::Idle
    }

    /// Earliest pending timer.
    pub fn next_deadline(&self) -> Option<(TimerKind, u64)> {
        match (self.long_press_deadline, self.slide_deadline) {
            (Some(lp), Some(sl)) if sl < lp => Some((TimerKind::Slide, sl)),
            (Some(lp), _) => Some((TimerKind::LongPress, lp)),
            (None, Some(sl)) => Some((TimerKind::Slide, sl)),
            (None, None) => None,
        }
    }

    /// Contact came back at `t` after a merged micro-lift. Timers held
    /// back while the finger was up restart from the new contact.
    pub fn resume(&mut self, t: u64) {
        if self.long_press_deadline.is_some() {
            self.long_press_deadline = Some(t + LONG_PRESS_MS + self.slide_elapsed());
        }
        if let Some(d) = self.slide_deadline {
            self.slide_deadline = Some(d.max(t));
        }
    }

    /// Replace the in-flight path on behalf of a handler.
    ///
    /// This is the only way a different zone prefix can be installed
    /// mid-gesture. Ignored when no gesture is active.
    pub fn rebind(&mut self, path: GesturePath) {
        if matches!(
            self.state,
            ClassifierState::Idle | ClassifierState::Dispatched
        ) {
            return;
        }
        tracing::debug!(from = %self.path, to = %path, "path rebound");
        self.path = path;
    }

    pub fn classify(&mut self, input: ClassifierInput) -> Step {
        match input {
            ClassifierInput::Start {
                sample,
                contacts,
                detection,
            } => self.on_start(sample, contacts, detection),
            ClassifierInput::Move { sample, contacts } => self.on_move(sample, contacts),
            ClassifierInput::End { sample, contacts } => self.on_end(sample, contacts),
            ClassifierInput::Timer { kind, now } => self.on_timer(kind, now),
            ClassifierInput::Cancel => {
                if self.state != ClassifierState::Idle {
                    tracing::debug!(path = %self.path, "gesture cancelled");
                }
                self.reset();
                Step::state(ClassifierState::Idle)
            }
        }
    }

    fn on_start(&mut self, sample: TouchSample, contacts: usize, detection: Detection) -> Step {
        if self.state != ClassifierState::Idle {
            if contacts > 1 {
                return self.interrupt();
            }
            return Step::state(self.state);
        }

        self.reset();
        if let Some(prefix) = detection.prefix {
            self.path.assign_prefix(prefix);
        }
        self.context = detection.context;
        self.start = Some(sample);
        self.anchor = Some(sample);
        self.latest = Some(sample);
        self.motion_ref = sample.point;

        if contacts > 1 {
            return self.interrupt();
        }

        self.state = ClassifierState::Sampling;
        self.long_press_deadline = Some(sample.t + LONG_PRESS_MS);
        Step::state(self.state)
    }

    fn on_move(&mut self, sample: TouchSample, contacts: usize) -> Step {
        match self.state {
            ClassifierState::Idle | ClassifierState::Dispatched | ClassifierState::Interrupted => {
                return Step::state(self.state);
            }
            _ => {}
        }
        if contacts > 1 {
            return self.interrupt();
        }

        self.track(sample);

        match self.state {
            ClassifierState::LongPress => Step {
                push: Some(sample.point),
                ..Step::state(self.state)
            },
            ClassifierState::ContinuousSlide => {
                self.note_motion(sample);
                Step {
                    push: Some(sample.point),
                    ..Step::state(self.state)
                }
            }
            _ => self.accumulate(sample),
        }
    }

    fn accumulate(&mut self, sample: TouchSample) -> Step {
        if !self.note_motion(sample) {
            return Step::state(self.state);
        }

        let slide_elapsed = self.slide_elapsed();
        self.long_press_deadline = Some(sample.t + LONG_PRESS_MS + slide_elapsed);

        let Some(anchor) = self.anchor else {
            return Step::state(self.state);
        };
        let dist = anchor.point.dist_sq(sample.point);
        if dist <= self.thresholds.tap {
            return Step::state(self.state);
        }
        let dir = Direction::from_displacement(
            sample.point.x - anchor.point.x,
            sample.point.y - anchor.point.y,
        );

        if dist > self.slide_limit {
            if self.last_direction == Some(dir) {
                // Same stroke continuing; move the anchor along with it.
                self.anchor = Some(sample);
                return Step::state(self.state);
            }
            return self.append_direction(dir, sample);
        }

        let changed = self.last_direction.is_some_and(|prev| prev != dir);
        let quick = self
            .last_glyph_t
            .is_some_and(|t| sample.t.saturating_sub(t) <= QUICK_REVERSAL_MS);
        if changed && (quick || self.in_chained_context()) {
            return self.append_direction(dir, sample);
        }
        Step::state(self.state)
    }

    fn append_direction(&mut self, dir: Direction, sample: TouchSample) -> Step {
        let glyph = Glyph::Swipe(dir);
        self.path.push(glyph);
        self.anchor = Some(sample);
        self.last_direction = Some(dir);
        self.last_glyph_t = Some(sample.t);
        self.slide_limit = (self.slide_limit * SLIDE_DECAY).max(self.thresholds.floor());
        self.state = ClassifierState::DirectionAccumulating;
        self.slide_deadline = Some(sample.t + SLIDE_ARM_MS);
        self.long_press_deadline = Some(sample.t + LONG_PRESS_MS + self.slide_elapsed());

        tracing::trace!(path = %self.path, limit = self.slide_limit, "direction glyph");
        Step {
            glyph: Some(glyph),
            ..Step::state(self.state)
        }
    }

    fn on_end(&mut self, sample: TouchSample, contacts: usize) -> Step {
        match self.state {
            ClassifierState::Idle | ClassifierState::Dispatched => {
                return Step::state(ClassifierState::Idle);
            }
            ClassifierState::Interrupted => {
                if contacts == 0 {
                    self.reset();
                    return Step::state(ClassifierState::Idle);
                }
                return Step::state(self.state);
            }
            _ => {}
        }
        if contacts > 0 {
            return Step::state(self.state);
        }

        self.track(sample);

        let glyph = if let Some(pair) = self.path.last().and_then(Glyph::release_pair) {
            self.path.push(pair);
            Some(pair)
        } else if self.path.is_empty() && self.max_travel_sq < self.thresholds.tap {
            self.path.push(Glyph::Tap);
            Some(Glyph::Tap)
        } else if self.path.is_empty() {
            tracing::trace!("release without glyphs discarded");
            self.reset();
            return Step::state(ClassifierState::Idle);
        } else {
            None
        };

        let dispatch = self.snapshot();
        self.reset();
        Step {
            glyph,
            dispatch: Some(dispatch),
            ..Step::state(ClassifierState::Dispatched)
        }
    }

    fn on_timer(&mut self, kind: TimerKind, now: u64) -> Step {
        match kind {
            TimerKind::LongPress => {
                if !self.long_press_deadline.is_some_and(|d| now >= d) {
                    return Step::state(self.state);
                }
                self.long_press_deadline = None;
                let eligible = matches!(
                    self.state,
                    ClassifierState::Sampling | ClassifierState::DirectionAccumulating
                );
                if !eligible || self.path.awaits_release() {
                    return Step::state(self.state);
                }
                self.path.push(Glyph::LongPressStart);
                self.anchor = self.latest;
                self.state = ClassifierState::LongPress;
                self.slide_deadline = None;
                tracing::trace!(path = %self.path, "long press");
                Step {
                    glyph: Some(Glyph::LongPressStart),
                    dispatch: Some(self.snapshot()),
                    ..Step::state(self.state)
                }
            }
            TimerKind::Slide => {
                if !self.slide_deadline.is_some_and(|d| now >= d) {
                    return Step::state(self.state);
                }
                match self.state {
                    ClassifierState::DirectionAccumulating => {
                        let moving = self.last_motion.is_some_and(|(t, dir)| {
                            now.saturating_sub(t) <= SLIDE_MOTION_WINDOW_MS
                                && Some(dir) == self.last_direction
                        });
                        if !moving || self.path.awaits_release() {
                            self.slide_deadline = None;
                            return Step::state(self.state);
                        }
                        self.path.push(Glyph::SlideStart);
                        self.state = ClassifierState::ContinuousSlide;
                        self.long_press_deadline = None;
                        self.slide_deadline = Some(now + SLIDE_REPEAT_MS);
                        tracing::trace!(path = %self.path, "continuous slide");
                        Step {
                            glyph: Some(Glyph::SlideStart),
                            dispatch: Some(self.snapshot()),
                            ..Step::state(self.state)
                        }
                    }
                    ClassifierState::ContinuousSlide => {
                        self.slide_deadline = Some(now + SLIDE_REPEAT_MS);
                        Step {
                            dispatch: Some(self.snapshot()),
                            ..Step::state(self.state)
                        }
                    }
                    _ => {
                        self.slide_deadline = None;
                        Step::state(self.state)
                    }
                }
            }
        }
    }

    /// Collapse the gesture into a bare interrupt path, flushing an open
    /// start glyph first.
    fn interrupt(&mut self) -> Step {
        let mut step = Step::state(ClassifierState::Interrupted);
        if let Some(pair) = self.path.last().and_then(Glyph::release_pair) {
            self.path.push(pair);
            step.glyph = Some(pair);
            step.dispatch = Some(self.snapshot());
        }
        tracing::debug!(path = %self.path, "multi-finger interrupt");
        self.path = GesturePath::with_prefix(ZonePrefix::Interrupt);
        self.state = ClassifierState::Interrupted;
        self.long_press_deadline = None;
        self.slide_deadline = None;
        step
    }

    fn track(&mut self, sample: TouchSample) {
        self.latest = Some(sample);
        self.context.end = sample.point;
        if let Some(start) = self.start {
            self.max_travel_sq = self.max_travel_sq.max(start.point.dist_sq(sample.point));
        }
    }

    /// Record qualifying movement. Returns `false` for jitter.
    fn note_motion(&mut self, sample: TouchSample) -> bool {
        let dist = self.motion_ref.dist_sq(sample.point);
        if dist <= self.thresholds.tap {
            return false;
        }
        let dir = Direction::from_displacement(
            sample.point.x - self.motion_ref.x,
            sample.point.y - self.motion_ref.y,
        );
        self.motion_ref = sample.point;
        self.last_motion = Some((sample.t, dir));
        true
    }

    fn slide_elapsed(&self) -> u64 {
        match (self.start, self.last_glyph_t) {
            (Some(start), Some(t)) => t.saturating_sub(start.t),
            _ => 0,
        }
    }

    fn in_chained_context(&self) -> bool {
        self.path.prefix().is_some() || self.path.contains(Glyph::Tap)
    }

    fn snapshot(&self) -> Dispatch {
        Dispatch {
            path: self.path.clone(),
            context: self.context.clone(),
        }
    }

    fn reset(&mut self) {
        self.state = ClassifierState::Idle;
        self.path = GesturePath::new();
        self.context = GestureContext::default();
        self.start = None;
        self.anchor = None;
        self.latest = None;
        self.last_motion = None;
        self.slide_limit = self.thresholds.base;
        self.last_direction = None;
        self.last_glyph_t = None;
        self.max_travel_sq = 0.0;
        self.long_press_deadline = None;
        self.slide_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::sampler::TargetId;

    // 400x800 screen, sensitivity 0.02: base 3200, tap 800, floor 1600.
    fn classifier() -> GestureClassifier {
        GestureClassifier::new(Thresholds::new(Screen::default(), 0.02))
    }

    fn sample(t: u64, x: f64, y: f64) -> TouchSample {
        TouchSample {
            t,
            point: Point::new(x, y),
            target: TargetId(1),
        }
    }

    fn start(c: &mut GestureClassifier, t: u64, x: f64, y: f64, prefix: Option<ZonePrefix>) -> Step {
        c.classify(ClassifierInput::Start {
            sample: sample(t, x, y),
            contacts: 1,
            detection: Detection {
                prefix,
                context: GestureContext::default(),
            },
        })
    }

    fn mv(c: &mut GestureClassifier, t: u64, x: f64, y: f64) -> Step {
        c.classify(ClassifierInput::Move {
            sample: sample(t, x, y),
            contacts: 1,
        })
    }

    fn end(c: &mut GestureClassifier, t: u64, x: f64, y: f64) -> Step {
        c.classify(ClassifierInput::End {
            sample: sample(t, x, y),
            contacts: 0,
        })
    }

    /// Fire every timer due at or before `now`, collecting dispatches.
    fn advance(c: &mut GestureClassifier, now: u64) -> Vec<String> {
        let mut out = Vec::new();
        while let Some((kind, at)) = c.next_deadline() {
            if at > now {
                break;
            }
            let step = c.classify(ClassifierInput::Timer { kind, now: at });
            if let Some(d) = step.dispatch {
                out.push(d.path.to_string());
            }
        }
        out
    }

    fn dispatched(step: &Step) -> Option<String> {
        step.dispatch.as_ref().map(|d| d.path.to_string())
    }

    #[test]
    fn still_short_contact_is_a_tap() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 100.0, None);
        mv(&mut c, 40, 103.0, 101.0);
        assert!(advance(&mut c, 80).is_empty());
        let step = end(&mut c, 80, 103.0, 101.0);
        assert_eq!(step.state, ClassifierState::Dispatched);
        assert_eq!(step.glyph, Some(Glyph::Tap));
        assert_eq!(dispatched(&step).as_deref(), Some("◆"));
        assert_eq!(c.state(), ClassifierState::Idle);
    }

    #[test]
    fn resume_restarts_long_press_from_retouch() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 100.0, None);
        c.resume(280);
        assert_eq!(c.next_deadline(), Some((TimerKind::LongPress, 580)));
        assert!(advance(&mut c, 579).is_empty());
        assert_eq!(advance(&mut c, 580), vec!["●"]);
    }

    #[test]
    fn sub_tap_jitter_never_yields_directions() {
        for offsets in [[1.0, -2.0, 3.0], [10.0, -10.0, 5.0], [0.0, 15.0, -15.0]] {
            let mut c = classifier();
            start(&mut c, 0, 200.0, 200.0, None);
            for (i, dx) in offsets.iter().enumerate() {
                mv(&mut c, 10 * (i as u64 + 1), 200.0 + dx, 200.0 - dx);
            }
            let step = end(&mut c, 60, 200.0, 200.0);
            let path = step.dispatch.unwrap().path;
            assert_eq!(path.glyphs(), &[Glyph::Tap]);
        }
    }

    #[test]
    fn quick_reversal_yields_back_path() {
        let mut c = classifier();
        start(&mut c, 0, 200.0, 400.0, None);
        let s = mv(&mut c, 20, 280.0, 400.0);
        assert_eq!(s.glyph, Some(Glyph::Swipe(Direction::Right)));
        let s = mv(&mut c, 40, 220.0, 400.0);
        assert_eq!(s.glyph, Some(Glyph::Swipe(Direction::Left)));
        let step = end(&mut c, 60, 220.0, 400.0);
        assert_eq!(dispatched(&step).as_deref(), Some("→←"));
    }

    #[test]
    fn slow_short_reversal_needs_full_limit() {
        let mut c = classifier();
        start(&mut c, 0, 200.0, 400.0, None);
        mv(&mut c, 20, 280.0, 400.0);
        // 35px back (1225 sq) after 200ms: above tap, below decayed limit 2048.
        let s = mv(&mut c, 220, 245.0, 400.0);
        assert_eq!(s.glyph, None);
        let step = end(&mut c, 230, 245.0, 400.0);
        assert_eq!(dispatched(&step).as_deref(), Some("→"));
    }

    #[test]
    fn prefixed_context_accepts_short_reversal() {
        let mut c = classifier();
        start(&mut c, 0, 200.0, 400.0, Some(ZonePrefix::Video));
        mv(&mut c, 20, 280.0, 400.0);
        let s = mv(&mut c, 220, 245.0, 400.0);
        assert_eq!(s.glyph, Some(Glyph::Swipe(Direction::Left)));
        let step = end(&mut c, 230, 245.0, 400.0);
        assert_eq!(dispatched(&step).as_deref(), Some("V→←"));
    }

    #[test]
    fn slide_limit_decays_monotonically_to_floor() {
        let mut c = classifier();
        let base = c.thresholds().base;
        let floor = c.thresholds().floor();
        start(&mut c, 0, 200.0, 400.0, None);

        let mut limits = vec![c.slide_limit()];
        let mut x = 200.0;
        let mut t = 0;
        for i in 0..8 {
            t += 10;
            // Alternate right/left far enough to beat any limit.
            x += if i % 2 == 0 { 90.0 } else { -90.0 };
            let s = mv(&mut c, t, x, 400.0);
            assert!(s.glyph.is_some(), "stroke {i} should append");
            limits.push(c.slide_limit());
        }
        assert_eq!(limits[0], base);
        for pair in limits.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        assert_eq!(*limits.last().unwrap(), floor);
    }

    #[test]
    fn same_direction_does_not_repeat_glyph() {
        let mut c = classifier();
        start(&mut c, 0, 0.0, 400.0, None);
        mv(&mut c, 20, 80.0, 400.0);
        mv(&mut c, 40, 160.0, 400.0);
        mv(&mut c, 60, 240.0, 400.0);
        assert_eq!(c.path().to_string(), "→");
    }

    #[test]
    fn long_press_pair_is_dispatched_separately() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 100.0, Some(ZonePrefix::Video));
        assert!(advance(&mut c, 299).is_empty());
        assert_eq!(advance(&mut c, 400), vec!["V●".to_string()]);
        assert_eq!(c.state(), ClassifierState::LongPress);

        let s = mv(&mut c, 410, 150.0, 150.0);
        assert_eq!(s.push, Some(Point::new(150.0, 150.0)));
        assert_eq!(s.glyph, None);

        let step = end(&mut c, 420, 150.0, 150.0);
        assert_eq!(step.glyph, Some(Glyph::LongPressStop));
        assert_eq!(dispatched(&step).as_deref(), Some("V●○"));
    }

    #[test]
    fn movement_postpones_long_press() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 100.0, None);
        // 30px moves count as motion but stay under the slide limit.
        mv(&mut c, 200, 130.0, 100.0);
        assert!(advance(&mut c, 400).is_empty());
        assert_eq!(advance(&mut c, 500), vec!["●".to_string()]);
    }

    #[test]
    fn long_press_after_swipe_waits_for_slide_elapsed() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 400.0, None);
        mv(&mut c, 100, 200.0, 400.0); // → at t=100, slide elapsed 100
        // Deadline 100 + 300 + 100 = 500; slide arm at 500 finds no motion.
        assert!(advance(&mut c, 499).is_empty());
        assert_eq!(advance(&mut c, 500), vec!["→●".to_string()]);
        let step = end(&mut c, 600, 200.0, 400.0);
        assert_eq!(dispatched(&step).as_deref(), Some("→●○"));
    }

    #[test]
    fn no_stop_glyph_without_start() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 400.0, None);
        mv(&mut c, 20, 200.0, 400.0);
        let step = end(&mut c, 40, 200.0, 400.0);
        let path = step.dispatch.unwrap().path;
        assert!(!path.contains(Glyph::LongPressStop));
        assert!(!path.contains(Glyph::LongPressStart));
    }

    #[test]
    fn sustained_motion_enters_continuous_slide() {
        let mut c = classifier();
        start(&mut c, 0, 0.0, 400.0, None);
        let mut x = 0.0;
        let mut fired = Vec::new();
        for t in (20..=700).step_by(20) {
            fired.extend(advance(&mut c, t - 1));
            x += 30.0;
            mv(&mut c, t, x, 400.0);
        }
        // Glyph at t=40 arms the slide for 440; it then repeats every 100ms.
        assert_eq!(fired.first().map(String::as_str), Some("→▶"));
        assert!(fired.len() >= 3);
        assert!(fired.iter().all(|p| p == "→▶"));
        assert_eq!(c.state(), ClassifierState::ContinuousSlide);

        let step = end(&mut c, 710, x, 400.0);
        assert_eq!(dispatched(&step).as_deref(), Some("→▶▷"));
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn swipe_then_stop_does_not_slide() {
        let mut c = classifier();
        start(&mut c, 0, 0.0, 400.0, None);
        mv(&mut c, 20, 90.0, 400.0);
        // Slide timer at 420 sees no recent motion; long press at 340 wins.
        let fired = advance(&mut c, 420);
        assert_eq!(fired, vec!["→●".to_string()]);
    }

    #[test]
    fn release_without_glyphs_is_discarded() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 100.0, None);
        // 40px drift (1600 sq): beyond tap, below slide limit.
        mv(&mut c, 30, 140.0, 100.0);
        let step = end(&mut c, 50, 140.0, 100.0);
        assert_eq!(step.state, ClassifierState::Idle);
        assert!(step.dispatch.is_none());
    }

    #[test]
    fn second_contact_interrupts_and_flushes_long_press() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 100.0, None);
        advance(&mut c, 300);
        assert_eq!(c.path().to_string(), "●");

        let step = c.classify(ClassifierInput::Move {
            sample: sample(350, 100.0, 100.0),
            contacts: 2,
        });
        assert_eq!(step.state, ClassifierState::Interrupted);
        assert_eq!(dispatched(&step).as_deref(), Some("●○"));
        assert_eq!(c.path().to_string(), "X");

        // Classification stays suppressed until every contact lifts.
        let s = mv(&mut c, 360, 300.0, 100.0);
        assert_eq!(s.glyph, None);
        let s = c.classify(ClassifierInput::End {
            sample: sample(370, 300.0, 100.0),
            contacts: 1,
        });
        assert_eq!(s.state, ClassifierState::Interrupted);
        let s = end(&mut c, 380, 300.0, 100.0);
        assert_eq!(s.state, ClassifierState::Idle);
        assert!(s.dispatch.is_none());
    }

    #[test]
    fn cancel_clears_timers() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 100.0, None);
        assert!(c.next_deadline().is_some());
        let s = c.classify(ClassifierInput::Cancel);
        assert_eq!(s.state, ClassifierState::Idle);
        assert_eq!(c.next_deadline(), None);
        assert!(advance(&mut c, 1000).is_empty());
    }

    #[test]
    fn stale_timer_is_ignored() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 100.0, None);
        mv(&mut c, 200, 140.0, 100.0);
        // Original deadline (300) was replaced by 500.
        let s = c.classify(ClassifierInput::Timer {
            kind: TimerKind::LongPress,
            now: 300,
        });
        assert_eq!(s.glyph, None);
        assert_eq!(c.path().to_string(), "");
    }

    #[test]
    fn rebind_replaces_in_flight_path() {
        let mut c = classifier();
        start(&mut c, 0, 100.0, 100.0, None);
        advance(&mut c, 300);
        c.rebind("◆".parse().unwrap());
        assert_eq!(c.path().to_string(), "◆");
        assert_eq!(c.state(), ClassifierState::LongPress);
    }

    #[test]
    fn rebind_is_ignored_when_idle() {
        let mut c = classifier();
        c.rebind("→".parse().unwrap());
        assert_eq!(c.path().to_string(), "");
    }
}
