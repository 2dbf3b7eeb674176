//! Action execution: declarative bodies and the plugin interface.
//!
//! Pure dispatch of one [`ActionBody`] against a context snapshot. The
//! only capabilities a body can reach are the [`HostPrimitives`], the
//! plugins registered at startup, and rebinding the path.

use std::collections::HashMap;

use crate::gesture::context::GestureContext;
use crate::gesture::path::{GesturePath, PathError};

use super::FrameRole;
use super::host::HostPrimitives;
use super::registry::{ActionBody, FrameRequest, TextSource};

/// Execution channel for one attempt.
///
/// A handler failing with [`ActionError::Restricted`] on the primary
/// channel is retried once on the alternate one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Primary,
    Alternate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("restricted environment: {0}")]
    Restricted(String),
    #[error("{0}")]
    Failed(String),
    #[error("no handler registered for plugin {0:?}")]
    UnknownPlugin(String),
    #[error("gesture has no {0}")]
    MissingInput(&'static str),
    #[error("invalid chained path: {0}")]
    InvalidChain(#[from] PathError),
}

/// What a handler asks the dispatcher to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Done,
    /// Re-enter the dispatcher with this path.
    Rebind(GesturePath),
    /// Needs the top frame.
    Frame(FrameRequest),
}

/// Read-only view a handler gets of the gesture that triggered it.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub path: &'a GesturePath,
    pub gesture: &'a GestureContext,
    pub role: FrameRole,
}

/// Handler registered by a feature module under a plugin name.
pub trait ActionHandler {
    fn invoke(
        &self,
        cx: &ActionContext<'_>,
        args: &std::collections::BTreeMap<String, String>,
        channel: Channel,
    ) -> Result<ActionOutcome, ActionError>;
}

/// Plugin handler that only logs its invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggedPlugin;

impl ActionHandler for LoggedPlugin {
    fn invoke(
        &self,
        cx: &ActionContext<'_>,
        args: &std::collections::BTreeMap<String, String>,
        channel: Channel,
    ) -> Result<ActionOutcome, ActionError> {
        tracing::info!(path = %cx.path, ?args, ?channel, role = ?cx.role, "plugin invoked");
        Ok(ActionOutcome::Done)
    }
}

/// Runs action bodies against the host and registered plugins.
pub struct Executor {
    host: Box<dyn HostPrimitives>,
    plugins: HashMap<String, Box<dyn ActionHandler>>,
}

impl Executor {
    pub fn new(host: Box<dyn HostPrimitives>) -> Self {
        Self {
            host,
            plugins: HashMap::new(),
        }
    }

    /// Register a plugin handler, replacing any with the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: Box<dyn ActionHandler>) {
        self.plugins.insert(name.into(), handler);
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn execute(
        &self,
        body: &ActionBody,
        cx: &ActionContext<'_>,
        channel: Channel,
    ) -> Result<ActionOutcome, ActionError> {
        match body {
            ActionBody::OpenUrl { source } => {
                let url = resolve_text(source, cx.gesture)?;
                self.host.open_url(&url, channel)?;
                Ok(ActionOutcome::Done)
            }
            ActionBody::CopyText { source } => {
                let text = resolve_text(source, cx.gesture)?;
                self.host.copy_text(&text, channel)?;
                Ok(ActionOutcome::Done)
            }
            ActionBody::CloseTab => {
                self.host.close_tab(channel)?;
                Ok(ActionOutcome::Done)
            }
            ActionBody::Plugin { name, args } => {
                let handler = self
                    .plugins
                    .get(name)
                    .ok_or_else(|| ActionError::UnknownPlugin(name.clone()))?;
                handler.invoke(cx, args, channel)
            }
            ActionBody::Chain { path } => Ok(ActionOutcome::Rebind(path.parse()?)),
            ActionBody::Frame { request } => Ok(ActionOutcome::Frame(request.clone())),
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn resolve_text(source: &TextSource, gesture: &GestureContext) -> Result<String, ActionError> {
    let text = match source {
        TextSource::Selection => gesture.selection.clone(),
        TextSource::TargetLink => gesture.link.clone(),
        TextSource::TargetImage => gesture.image.clone(),
        TextSource::MediaSource => gesture.media.as_ref().and_then(|m| m.src.clone()),
        TextSource::Literal(s) => Some(s.clone()),
    };
    text.filter(|s| !s.is_empty())
        .ok_or(ActionError::MissingInput(match source {
            TextSource::Selection => "selection",
            TextSource::TargetLink => "link target",
            TextSource::TargetImage => "image target",
            TextSource::MediaSource => "media source",
            TextSource::Literal(_) => "text",
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::host::LogHost;

    fn cx<'a>(path: &'a GesturePath, gesture: &'a GestureContext) -> ActionContext<'a> {
        ActionContext {
            path,
            gesture,
            role: FrameRole::Top,
        }
    }

    #[test]
    fn chain_parses_target_path() {
        let exec = Executor::new(Box::new(LogHost));
        let path: GesturePath = "◆".parse().unwrap();
        let gesture = GestureContext::default();
        let out = exec
            .execute(
                &ActionBody::Chain { path: "→←".into() },
                &cx(&path, &gesture),
                Channel::Primary,
            )
            .unwrap();
        assert_eq!(out, ActionOutcome::Rebind("→←".parse().unwrap()));

        let err = exec
            .execute(
                &ActionBody::Chain { path: "nope".into() },
                &cx(&path, &gesture),
                Channel::Primary,
            )
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidChain(_)));
    }

    #[test]
    fn unknown_plugin_is_an_error() {
        let exec = Executor::new(Box::new(LogHost));
        let path: GesturePath = "◆".parse().unwrap();
        let gesture = GestureContext::default();
        let err = exec
            .execute(
                &ActionBody::Plugin {
                    name: "missing".into(),
                    args: Default::default(),
                },
                &cx(&path, &gesture),
                Channel::Primary,
            )
            .unwrap_err();
        assert_eq!(err, ActionError::UnknownPlugin("missing".into()));
    }

    #[test]
    fn copy_requires_selection() {
        let exec = Executor::new(Box::new(LogHost));
        let path: GesturePath = "T↑".parse().unwrap();
        let mut gesture = GestureContext::default();
        let body = ActionBody::CopyText {
            source: TextSource::Selection,
        };
        let err = exec
            .execute(&body, &cx(&path, &gesture), Channel::Primary)
            .unwrap_err();
        assert_eq!(err, ActionError::MissingInput("selection"));

        gesture.selection = Some("words".into());
        assert_eq!(
            exec.execute(&body, &cx(&path, &gesture), Channel::Primary),
            Ok(ActionOutcome::Done)
        );
    }

    #[test]
    fn frame_request_is_passed_up() {
        let exec = Executor::new(Box::new(LogHost));
        let path: GesturePath = "V↑".parse().unwrap();
        let gesture = GestureContext::default();
        let request = FrameRequest::Fullscreen { enter: true };
        let out = exec
            .execute(
                &ActionBody::Frame {
                    request: request.clone(),
                },
                &cx(&path, &gesture),
                Channel::Primary,
            )
            .unwrap();
        assert_eq!(out, ActionOutcome::Frame(request));
    }
}
