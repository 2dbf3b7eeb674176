//! Action dispatch: completed paths to handlers.
//!
//! Lookup order for a path:
//! 1. exact match;
//! 2. if the path carries a zone prefix, the same glyphs without it
//!    (penetration);
//! 3. if it carries none and the gesture started inside an image, the
//!    same glyphs under the image prefix.
//!
//! A handler may rebind the path, in which case the dispatcher runs
//! again with the new path. Each dispatch works on its own snapshot of
//! the gesture context, so a chain never observes coordinates that
//! moved underneath it.
//!
//! In a nested frame, top-only entries are forwarded instead of run;
//! entries for both levels run locally and are forwarded.

pub mod handler;
pub mod host;
pub mod registry;

use crate::gesture::context::GestureContext;
use crate::gesture::glyph::ZonePrefix;
use crate::gesture::path::GesturePath;

use handler::{ActionContext, ActionError, ActionOutcome, Channel, Executor};
use host::Notifier;
use registry::{ActionEntry, ActionRegistry, FrameRequest, Scope};

/// Maximum re-entries caused by rebinding within one dispatch.
pub const MAX_CHAIN_DEPTH: usize = 8;

/// Which level of the frame tree this dispatcher serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRole {
    Top,
    Nested,
}

/// One handler run.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    /// The path the entry was found under.
    pub path: GesturePath,
    pub name: String,
    pub result: Result<(), ActionError>,
}

/// Everything one dispatch did or asks the caller to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub executed: Vec<Executed>,
    /// Path to send to the top frame (nested frames only).
    pub forward: Option<GesturePath>,
    /// Requests only the top frame can satisfy.
    pub requests: Vec<FrameRequest>,
    /// Last path a handler rebound to, for the classifier.
    pub rebound: Option<GesturePath>,
}

#[derive(Debug)]
pub struct Dispatcher<N: Notifier> {
    registry: ActionRegistry,
    executor: Executor,
    notifier: N,
    role: FrameRole,
    image_gestures: bool,
}

impl<N: Notifier> Dispatcher<N> {
    pub fn new(
        registry: ActionRegistry,
        executor: Executor,
        notifier: N,
        role: FrameRole,
        image_gestures: bool,
    ) -> Self {
        Self {
            registry,
            executor,
            notifier,
            role,
            image_gestures,
        }
    }

    pub fn role(&self) -> FrameRole {
        self.role
    }

    #[allow(dead_code)]
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Find the entry for `path`, applying the fallback rules.
    pub fn resolve(
        &self,
        path: &GesturePath,
        context: &GestureContext,
    ) -> Option<(GesturePath, &ActionEntry)> {
        if let Some(entry) = self.registry.get(path) {
            return Some((path.clone(), entry));
        }
        let fallback = match path.prefix() {
            Some(_) => path.stripped(),
            None if self.image_gestures && context.image.is_some() => {
                path.reprefixed(ZonePrefix::Image)
            }
            None => return None,
        };
        if fallback.is_empty() && fallback.prefix().is_none() {
            return None;
        }
        let entry = self.registry.get(&fallback)?;
        tracing::trace!(from = %path, to = %fallback, "penetration fallback");
        Some((fallback, entry))
    }

    /// Dispatch a completed (or in-flight) path.
    pub fn dispatch(&self, path: &GesturePath, context: &GestureContext) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut current = path.clone();

        for depth in 0..=MAX_CHAIN_DEPTH {
            let snapshot = context.clone();
            let Some((matched, entry)) = self.resolve(&current, &snapshot) else {
                tracing::debug!(path = %current, "no action registered");
                break;
            };

            if self.role == FrameRole::Nested {
                // The physical path is forwarded; the top frame replays
                // the whole chain, so a top-only link ends it here.
                if depth == 0 {
                    report.forward = Some(matched.clone());
                }
                if entry.scope == Scope::TopOnly {
                    tracing::debug!(path = %matched, action = %entry.name, depth, "left to top frame");
                    break;
                }
            }

            let cx = ActionContext {
                path: &matched,
                gesture: &snapshot,
                role: self.role,
            };
            let outcome = self.run(entry, &cx);
            report.executed.push(Executed {
                path: matched.clone(),
                name: entry.name.clone(),
                result: outcome.as_ref().map(|_| ()).map_err(Clone::clone),
            });

            match outcome {
                Ok(ActionOutcome::Rebind(next)) => {
                    if depth == MAX_CHAIN_DEPTH {
                        tracing::warn!(path = %next, "action chain too deep, stopping");
                        break;
                    }
                    report.rebound = Some(next.clone());
                    current = next;
                }
                Ok(ActionOutcome::Frame(request)) => {
                    report.requests.push(request);
                    break;
                }
                Ok(ActionOutcome::Done) | Err(_) => break,
            }
        }
        report
    }

    /// Run one entry, retrying once on the alternate channel when the
    /// primary one is restricted. Failures are reported, never raised.
    fn run(&self, entry: &ActionEntry, cx: &ActionContext<'_>) -> Result<ActionOutcome, ActionError> {
        tracing::debug!(path = %cx.path, action = %entry.name, "dispatching");

        let result = match self.executor.execute(&entry.body, cx, Channel::Primary) {
            Err(ActionError::Restricted(reason)) => {
                tracing::debug!(path = %cx.path, %reason, "retrying on alternate channel");
                self.executor.execute(&entry.body, cx, Channel::Alternate)
            }
            other => other,
        };

        if let Err(e) = &result {
            self.notifier.notify(&cx.path.to_string(), &e.to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use handler::ActionHandler;
    use host::HostPrimitives;
    use registry::ActionBody;

    #[derive(Default, Clone)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut self.0.borrow_mut())
        }
        fn push(&self, s: String) {
            self.0.borrow_mut().push(s);
        }
    }

    impl Notifier for Recorder {
        fn notify(&self, path: &str, message: &str) {
            self.push(format!("notify {path}: {message}"));
        }
    }

    /// Host whose primary channel is restricted for clipboard writes.
    struct SandboxedHost(Recorder);

    impl HostPrimitives for SandboxedHost {
        fn open_url(&self, url: &str, _channel: Channel) -> Result<(), ActionError> {
            self.0.push(format!("open {url}"));
            Ok(())
        }

        fn copy_text(&self, text: &str, channel: Channel) -> Result<(), ActionError> {
            match channel {
                Channel::Primary => Err(ActionError::Restricted("sandbox".into())),
                Channel::Alternate => {
                    self.0.push(format!("copy {text}"));
                    Ok(())
                }
            }
        }

        fn close_tab(&self, _channel: Channel) -> Result<(), ActionError> {
            Err(ActionError::Restricted("sandbox".into()))
        }
    }

    struct Named(&'static str, Recorder);

    impl ActionHandler for Named {
        fn invoke(
            &self,
            cx: &ActionContext<'_>,
            _args: &BTreeMap<String, String>,
            _channel: Channel,
        ) -> Result<ActionOutcome, ActionError> {
            self.1.push(format!("{} {}", self.0, cx.path));
            Ok(ActionOutcome::Done)
        }
    }

    fn entry(name: &str, plugin: &str, scope: Scope) -> ActionEntry {
        ActionEntry::new(
            name,
            ActionBody::Plugin {
                name: plugin.into(),
                args: BTreeMap::new(),
            },
            scope,
        )
    }

    fn dispatcher(role: FrameRole, rec: &Recorder) -> Dispatcher<Recorder> {
        let mut registry = ActionRegistry::new();
        registry.insert("◆", entry("Tap", "tap", Scope::Both)).unwrap();
        registry.insert("→←", entry("Back", "back", Scope::TopOnly)).unwrap();
        registry.insert("V●", entry("Rewind start", "rewind", Scope::Both)).unwrap();
        registry.insert("●○", entry("Rewind stop", "rewind.stop", Scope::Both)).unwrap();
        registry.insert("I●", entry("Save image", "image", Scope::Both)).unwrap();
        registry
            .insert(
                "→↓",
                ActionEntry::new("Close page", ActionBody::CloseTab, Scope::TopOnly),
            )
            .unwrap();
        registry
            .insert(
                "↑◆",
                ActionEntry::new("Chain", ActionBody::Chain { path: "◆".into() }, Scope::Both),
            )
            .unwrap();
        registry
            .insert(
                "T↑",
                ActionEntry::new(
                    "Copy",
                    ActionBody::CopyText {
                        source: registry::TextSource::Selection,
                    },
                    Scope::Both,
                ),
            )
            .unwrap();

        let mut executor = Executor::new(Box::new(SandboxedHost(rec.clone())));
        for name in ["tap", "back", "rewind", "rewind.stop", "image"] {
            executor.register(name, Box::new(Named(name, rec.clone())));
        }
        Dispatcher::new(registry, executor, rec.clone(), role, true)
    }

    fn p(s: &str) -> GesturePath {
        s.parse().unwrap()
    }

    #[test]
    fn exact_match_runs_handler() {
        let rec = Recorder::default();
        let d = dispatcher(FrameRole::Top, &rec);
        let report = d.dispatch(&p("◆"), &GestureContext::default());
        assert_eq!(report.executed.len(), 1);
        assert_eq!(rec.take(), vec!["tap ◆"]);
    }

    #[test]
    fn prefixed_miss_penetrates_to_global() {
        let rec = Recorder::default();
        let d = dispatcher(FrameRole::Top, &rec);
        d.dispatch(&p("V●"), &GestureContext::default());
        d.dispatch(&p("V●○"), &GestureContext::default());
        assert_eq!(rec.take(), vec!["rewind V●", "rewind.stop ●○"]);
    }

    #[test]
    fn unprefixed_miss_inside_image_tries_image_zone() {
        let rec = Recorder::default();
        let d = dispatcher(FrameRole::Top, &rec);
        let ctx = GestureContext {
            image: Some("a.png".into()),
            ..Default::default()
        };
        d.dispatch(&p("●"), &ctx);
        // Outside an image the same path has no handler.
        d.dispatch(&p("●"), &GestureContext::default());
        assert_eq!(rec.take(), vec!["image I●"]);
    }

    #[test]
    fn rebind_reenters_dispatch() {
        let rec = Recorder::default();
        let d = dispatcher(FrameRole::Top, &rec);
        let report = d.dispatch(&p("↑◆"), &GestureContext::default());
        assert_eq!(report.rebound, Some(p("◆")));
        assert_eq!(report.executed.len(), 2);
        assert_eq!(rec.take(), vec!["tap ◆"]);
    }

    #[test]
    fn self_rebinding_chain_is_bounded() {
        let rec = Recorder::default();
        let mut d = dispatcher(FrameRole::Top, &rec);
        d.registry
            .insert(
                "↓",
                ActionEntry::new("Loop", ActionBody::Chain { path: "↓".into() }, Scope::Both),
            )
            .unwrap();
        let report = d.dispatch(&p("↓"), &GestureContext::default());
        assert_eq!(report.executed.len(), MAX_CHAIN_DEPTH + 1);
    }

    #[test]
    fn nested_top_only_is_forwarded_not_run() {
        let rec = Recorder::default();
        let d = dispatcher(FrameRole::Nested, &rec);
        let report = d.dispatch(&p("→←"), &GestureContext::default());
        assert_eq!(report.forward, Some(p("→←")));
        assert!(report.executed.is_empty());
        assert!(rec.take().is_empty());
    }

    #[test]
    fn nested_both_levels_runs_and_forwards() {
        let rec = Recorder::default();
        let d = dispatcher(FrameRole::Nested, &rec);
        let report = d.dispatch(&p("◆"), &GestureContext::default());
        assert_eq!(report.forward, Some(p("◆")));
        assert_eq!(rec.take(), vec!["tap ◆"]);
    }

    #[test]
    fn nested_chain_stops_before_top_only_link() {
        let rec = Recorder::default();
        let mut d = dispatcher(FrameRole::Nested, &rec);
        d.registry
            .insert(
                "↑",
                ActionEntry::new("Up", ActionBody::Chain { path: "→↓".into() }, Scope::Both),
            )
            .unwrap();
        let report = d.dispatch(&p("↑"), &GestureContext::default());
        assert_eq!(report.forward, Some(p("↑")));
        assert_eq!(report.executed.len(), 1);
        assert_eq!(report.executed[0].name, "Up");
        // Close page belongs to the top frame and never runs here.
        assert!(rec.take().is_empty());

        // The top frame replays the forwarded path through the whole chain.
        let mut top = dispatcher(FrameRole::Top, &rec);
        top.registry
            .insert(
                "↑",
                ActionEntry::new("Up", ActionBody::Chain { path: "→↓".into() }, Scope::Both),
            )
            .unwrap();
        let report = top.dispatch(&p("↑"), &GestureContext::default());
        let names: Vec<_> = report.executed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Up", "Close page"]);
    }

    #[test]
    fn restricted_failure_retries_on_alternate_channel() {
        let rec = Recorder::default();
        let d = dispatcher(FrameRole::Top, &rec);
        let ctx = GestureContext {
            selection: Some("hello".into()),
            ..Default::default()
        };
        let report = d.dispatch(&p("T↑"), &ctx);
        assert_eq!(report.executed[0].result, Ok(()));
        assert_eq!(rec.take(), vec!["copy hello"]);
    }

    #[test]
    fn failure_after_retry_is_notified() {
        let rec = Recorder::default();
        let d = dispatcher(FrameRole::Top, &rec);
        let report = d.dispatch(&p("→↓"), &GestureContext::default());
        assert!(report.executed[0].result.is_err());
        let log = rec.take();
        assert_eq!(log.len(), 1);
        assert!(log[0].starts_with("notify →↓: restricted environment"));
    }

    #[test]
    fn missing_path_does_nothing() {
        let rec = Recorder::default();
        let d = dispatcher(FrameRole::Top, &rec);
        let report = d.dispatch(&p("↓↓"), &GestureContext::default());
        assert_eq!(report, DispatchReport::default());
        assert!(rec.take().is_empty());
    }
}
