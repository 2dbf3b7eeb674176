//! Per-document gesture runtime.
//!
//! Wires sampler → context detector → classifier → dispatcher for one
//! frame and connects it to the relay: a top frame owns the
//! [`RelayHub`], a nested frame owns a [`FrameLink`]. All state lives
//! in one [`GestureEngine`] driven from a single task; time only moves
//! when the owner calls [`GestureEngine::advance`].

pub mod replay;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{Features, Settings};
use crate::dispatch::handler::{Executor, LoggedPlugin};
use crate::dispatch::host::{HostPrimitives, Notifier};
use crate::dispatch::registry::{ActionRegistry, FrameRequest};
use crate::dispatch::{Dispatcher, Executed, FrameRole};
use crate::gesture::classifier::{
    ClassifierInput, GestureClassifier, Step, Thresholds, TimerKind,
};
use crate::gesture::context::{ContextDetector, Detection, DocumentView, GestureContext};
use crate::gesture::path::GesturePath;
use crate::gesture::sampler::{ContactEvent, Point, SamplerEvent, Screen, TouchSampler};
use crate::relay::{Envelope, FrameId, FrameLink, HubAction, RelayHub, RelayInbox};

/// Upper bound on timer firings handled by one `advance` call.
const MAX_TIMER_STEPS: usize = 4096;

/// The frame's side of the relay.
#[derive(Debug)]
pub enum Endpoint {
    Top(RelayHub),
    Nested(FrameLink),
}

/// Something the host document should see or do.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Executed(Executed),
    /// Live position to mirror during a long-press or slide.
    Track(Point),
    /// Top-frame request produced by a local action.
    Request(FrameRequest),
    /// Effect requested by a nested frame.
    Relay(HubAction),
}

/// Input from the host document.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Contact(ContactEvent),
    Navigate,
    Hidden,
}

pub struct GestureEngine<D: DocumentView, N: Notifier> {
    document: D,
    sampler: TouchSampler,
    detector: ContextDetector,
    classifier: GestureClassifier,
    dispatcher: Dispatcher<N>,
    endpoint: Endpoint,
    permission_requested: bool,
    events: Vec<EngineEvent>,
}

impl<D: DocumentView, N: Notifier> GestureEngine<D, N> {
    pub fn new(
        document: D,
        screen: Screen,
        features: &Features,
        dispatcher: Dispatcher<N>,
        endpoint: Endpoint,
    ) -> Self {
        let role = match endpoint {
            Endpoint::Top(_) => FrameRole::Top,
            Endpoint::Nested(_) => FrameRole::Nested,
        };
        debug_assert_eq!(role, dispatcher.role());
        Self {
            document,
            sampler: TouchSampler::new(screen, features.break_touch),
            detector: ContextDetector::new(screen, features),
            classifier: GestureClassifier::new(Thresholds::new(
                screen,
                features.sensitivity.current,
            )),
            dispatcher,
            endpoint,
            permission_requested: false,
            events: Vec::new(),
        }
    }

    /// Engine with the registry from `settings`. Every plugin the table
    /// names gets a [`LoggedPlugin`] handler; feature modules register
    /// their own through [`Executor::register`] instead.
    pub fn from_settings(
        document: D,
        screen: Screen,
        settings: &Settings,
        endpoint: Endpoint,
        host: Box<dyn HostPrimitives>,
        notifier: N,
    ) -> Self {
        let role = match endpoint {
            Endpoint::Top(_) => FrameRole::Top,
            Endpoint::Nested(_) => FrameRole::Nested,
        };
        let registry = ActionRegistry::from_table(&settings.actions);
        let mut executor = Executor::new(host);
        let plugins: Vec<String> = registry.plugin_names().map(String::from).collect();
        for name in plugins {
            if !executor.has_plugin(&name) {
                executor.register(name, Box::new(LoggedPlugin));
            }
        }
        let dispatcher = Dispatcher::new(
            registry,
            executor,
            notifier,
            role,
            settings.features.image_gestures,
        );
        Self::new(document, screen, &settings.features, dispatcher, endpoint)
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn role(&self) -> FrameRole {
        self.dispatcher.role()
    }

    /// Mount a nested frame embedded at `offset`. Top frames only.
    pub fn mount_frame(&mut self, offset: Point) -> Option<FrameId> {
        match &mut self.endpoint {
            Endpoint::Top(hub) => Some(hub.mount(offset)),
            Endpoint::Nested(_) => None,
        }
    }

    pub fn unmount_frame(&mut self, frame: FrameId) {
        if let Endpoint::Top(hub) = &mut self.endpoint {
            hub.unmount(frame);
        }
    }

    pub fn handle_contact(&mut self, event: &ContactEvent) {
        for normalized in self.sampler.process(event) {
            self.feed(normalized);
        }
    }

    /// Fire every sampler and classifier deadline due at or before `now`,
    /// in time order.
    pub fn advance(&mut self, now: u64) {
        for _ in 0..MAX_TIMER_STEPS {
            let sampler_due = self.sampler.next_deadline().filter(|&t| t <= now);
            let timer_due = self.classifier_deadline().filter(|&(_, t)| t <= now);
            match (sampler_due, timer_due) {
                (Some(s), Some((_, t))) if s <= t => self.flush_sampler(now),
                (Some(_), None) => self.flush_sampler(now),
                (_, Some((kind, at))) => {
                    let step = self.classifier.classify(ClassifierInput::Timer { kind, now: at });
                    self.apply(step);
                }
                (None, None) => return,
            }
        }
        tracing::warn!(now, "timer loop did not settle");
    }

    /// Earliest pending deadline in host milliseconds.
    pub fn next_deadline(&self) -> Option<u64> {
        let timer = self.classifier_deadline().map(|(_, t)| t);
        match (self.sampler.next_deadline(), timer) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Navigation or visibility change: drop the gesture and its timers.
    pub fn cancel(&mut self) {
        self.sampler.reset();
        let step = self.classifier.classify(ClassifierInput::Cancel);
        self.apply(step);
    }

    /// Inbound relay envelope. Ignored by nested frames.
    pub fn handle_envelope(&mut self, envelope: Envelope) {
        let Endpoint::Top(hub) = &mut self.endpoint else {
            debug!(from = %envelope.from, "nested frame ignores relays");
            return;
        };
        let Some(action) = hub.handle(envelope) else {
            return;
        };
        match action {
            HubAction::Execute { path, snapshot } => {
                debug!(%path, "executing relayed path");
                let context = snapshot.into_context();
                self.dispatch(&path, &context, false);
            }
            HubAction::Mirror(point) => self.events.push(EngineEvent::Track(point)),
            other => self.events.push(EngineEvent::Relay(other)),
        }
    }

    /// Hand captured media bytes to the top frame. Nested frames only.
    pub fn relay_capture(&mut self, content: Vec<u8>, source: Option<String>) {
        if let Endpoint::Nested(link) = &mut self.endpoint {
            link.relay_capture(content, source);
        }
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Classifier timer that may fire now. While a release is held back
    /// the finger is up, so timers past the release wait for the sampler:
    /// the flushed release ends the gesture and a merged re-touch
    /// restarts them.
    fn classifier_deadline(&self) -> Option<(TimerKind, u64)> {
        let held = self.sampler.held_release();
        self.classifier
            .next_deadline()
            .filter(|&(_, t)| held.is_none_or(|r| t <= r))
    }

    fn flush_sampler(&mut self, now: u64) {
        if let Some(release) = self.sampler.flush(now) {
            self.feed(release);
        }
    }

    fn feed(&mut self, event: SamplerEvent) {
        let step = match event {
            SamplerEvent::Start { sample, contacts } => {
                let detection = if self.classifier.accepts_start() {
                    let detection = self.detector.detect(&self.document, &sample);
                    self.on_gesture_start(&detection);
                    detection
                } else {
                    Detection {
                        prefix: None,
                        context: GestureContext::default(),
                    }
                };
                self.classifier.classify(ClassifierInput::Start {
                    sample,
                    contacts,
                    detection,
                })
            }
            SamplerEvent::Move { sample, contacts } => {
                self.classifier.classify(ClassifierInput::Move { sample, contacts })
            }
            SamplerEvent::Resume { sample, contacts } => {
                self.classifier.resume(sample.t);
                self.classifier.classify(ClassifierInput::Move { sample, contacts })
            }
            SamplerEvent::End { sample, contacts } => {
                if contacts == 0
                    && let Endpoint::Nested(link) = &mut self.endpoint
                {
                    link.notify_release();
                }
                self.classifier.classify(ClassifierInput::End { sample, contacts })
            }
            SamplerEvent::Cancel => self.classifier.classify(ClassifierInput::Cancel),
        };
        self.apply(step);
    }

    fn on_gesture_start(&mut self, detection: &Detection) {
        let Endpoint::Nested(link) = &mut self.endpoint else {
            return;
        };
        link.begin_gesture();
        let on_media = detection
            .context
            .media
            .as_ref()
            .is_some_and(|m| m.bounds.contains(detection.context.start));
        if !self.permission_requested && on_media {
            link.request_fullscreen_permission();
            self.permission_requested = true;
        }
    }

    fn apply(&mut self, step: Step) {
        if let Some(point) = step.push {
            match &mut self.endpoint {
                Endpoint::Top(_) => self.events.push(EngineEvent::Track(point)),
                Endpoint::Nested(link) => link.push_coordinate(point),
            }
        }
        if let Some(dispatch) = step.dispatch {
            self.dispatch(&dispatch.path, &dispatch.context, true);
        }
    }

    /// Run the dispatcher. `local` gestures may rebind the classifier's
    /// in-flight path; relayed ones have no local gesture to rebind.
    fn dispatch(&mut self, path: &GesturePath, context: &GestureContext, local: bool) {
        let report = self.dispatcher.dispatch(path, context);

        for executed in report.executed {
            info!(path = %executed.path, action = %executed.name, ok = executed.result.is_ok(), "action");
            self.events.push(EngineEvent::Executed(executed));
        }
        if local && let Some(rebound) = report.rebound {
            self.classifier.rebind(rebound);
        }

        match &mut self.endpoint {
            Endpoint::Top(_) => {
                self.events
                    .extend(report.requests.into_iter().map(EngineEvent::Request));
            }
            Endpoint::Nested(link) => {
                if let Some(forward) = report.forward {
                    link.request_path(&forward, context);
                }
                for request in &report.requests {
                    link.request(request);
                }
            }
        }
    }
}

async fn next_envelope(inbox: &mut Option<RelayInbox>) -> Option<Envelope> {
    match inbox {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn elapsed_ms(origin: Instant) -> u64 {
    u64::try_from(origin.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Drive `engine` from live host input until the host channel closes.
///
/// Contacts are re-stamped with the loop clock so their times share an
/// epoch with the timer deadlines. Relay envelopes are read from
/// `inbox` when given. Every engine event is forwarded to `events`.
pub async fn run<D: DocumentView, N: Notifier>(
    engine: &mut GestureEngine<D, N>,
    mut host: mpsc::Receiver<HostEvent>,
    mut inbox: Option<RelayInbox>,
    events: mpsc::UnboundedSender<EngineEvent>,
) {
    let origin = Instant::now();
    let mut inbox_open = inbox.is_some();

    loop {
        let deadline = engine
            .next_deadline()
            .map(|t| origin + Duration::from_millis(t));

        tokio::select! {
            event = host.recv() => match event {
                Some(HostEvent::Contact(mut contact)) => {
                    contact.t = elapsed_ms(origin);
                    engine.handle_contact(&contact);
                }
                Some(HostEvent::Navigate) => {
                    debug!("navigation, cancelling gesture");
                    engine.cancel();
                }
                Some(HostEvent::Hidden) => {
                    debug!("document hidden, cancelling gesture");
                    engine.cancel();
                }
                None => break,
            },

            envelope = next_envelope(&mut inbox), if inbox_open => match envelope {
                Some(envelope) => engine.handle_envelope(envelope),
                None => inbox_open = false,
            },

            _ = sleep_until_deadline(deadline) => engine.advance(elapsed_ms(origin)),
        }

        for event in engine.drain_events() {
            if events.send(event).is_err() {
                debug!("event receiver gone");
            }
        }
    }

    debug!("host input closed, engine loop stopped");
}

/// Run `engine` on JSON-lines host input from stdin until EOF or a
/// shutdown signal. Records use the trace format; executed actions are
/// printed like a replay.
pub async fn listen<D: DocumentView, N: Notifier>(
    engine: &mut GestureEngine<D, N>,
) -> std::io::Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::signal::unix::{SignalKind, signal};

    let frame = engine.role();
    let (host_tx, host_rx) = mpsc::channel(64);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let reader = async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut line_no = 0usize;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record: replay::TraceRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(line = line_no, error = %e, "skipping input record");
                    continue;
                }
            };
            let Some(event) = record.to_host_event() else {
                tracing::warn!(line = line_no, "record has no live meaning, skipped");
                continue;
            };
            if host_tx.send(event).await.is_err() {
                break;
            }
        }
        Ok::<(), std::io::Error>(())
    };

    let printer = async move {
        while let Some(event) = events_rx.recv().await {
            if let EngineEvent::Executed(executed) = event {
                let failed = executed.result.is_err();
                let line = replay::Replayed { frame, executed };
                if failed {
                    eprintln!("{line}");
                } else {
                    println!("{line}");
                }
            }
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        joined = async { tokio::join!(reader, run(engine, host_rx, None, events_tx), printer) } => joined.0,
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
            Ok(())
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
            Ok(())
        }
    }
}
