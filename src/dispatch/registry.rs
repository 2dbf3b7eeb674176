//! Action registry: gesture path to action entry.
//!
//! Keys are legacy path strings (`V●`, `→←`), the form user tables are
//! written in. Entries are declarative: an [`ActionBody`] names what to
//! do, never arbitrary code.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::gesture::path::{GesturePath, PathError};
use crate::relay::protocol::Orientation;

/// Where a handler may run when the gesture happens in a nested frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// Forwarded to the top frame; never run inside the nested frame.
    TopOnly,
    /// Run locally and forwarded.
    #[default]
    Both,
}

/// Where a host command takes its text from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextSource {
    Selection,
    TargetLink,
    TargetImage,
    MediaSource,
    Literal(String),
}

/// Requests only the top frame can satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "kebab-case")]
pub enum FrameRequest {
    Fullscreen { enter: bool },
    OrientationLock { orientation: Orientation },
}

/// What an action does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ActionBody {
    OpenUrl {
        source: TextSource,
    },
    CopyText {
        source: TextSource,
    },
    CloseTab,
    /// Handler provided by a feature module at startup.
    Plugin {
        name: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        args: BTreeMap<String, String>,
    },
    /// Rebind the in-flight path and dispatch again.
    Chain {
        path: String,
    },
    Frame {
        #[serde(flatten)]
        request: FrameRequest,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub name: String,
    pub body: ActionBody,
    #[serde(default)]
    pub scope: Scope,
}

impl ActionEntry {
    pub fn new(name: impl Into<String>, body: ActionBody, scope: Scope) -> Self {
        Self {
            name: name.into(),
            body,
            scope,
        }
    }
}

/// Path-keyed action table with unique keys.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    entries: HashMap<String, ActionEntry>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a persisted table, skipping invalid keys.
    pub fn from_table(table: &BTreeMap<String, ActionEntry>) -> Self {
        let mut registry = Self::new();
        for (key, entry) in table {
            if let Err(e) = registry.insert(key, entry.clone()) {
                tracing::warn!(path = %key, error = %e, "skipping action with invalid path");
            }
        }
        registry
    }

    /// Register `entry` under `path`, replacing any previous entry.
    ///
    /// The key is normalized through the path parser so that lookups
    /// by rendered [`GesturePath`] always match.
    pub fn insert(&mut self, path: &str, entry: ActionEntry) -> Result<(), PathError> {
        let parsed: GesturePath = path.parse()?;
        self.entries.insert(parsed.to_string(), entry);
        Ok(())
    }

    pub fn get(&self, path: &GesturePath) -> Option<&ActionEntry> {
        self.entries.get(&path.to_string())
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plugin names referenced by any entry.
    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().filter_map(|e| match &e.body {
            ActionBody::Plugin { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}

fn plugin(name: &str) -> ActionBody {
    ActionBody::Plugin {
        name: name.into(),
        args: BTreeMap::new(),
    }
}

fn plugin_with(name: &str, key: &str, value: &str) -> ActionBody {
    ActionBody::Plugin {
        name: name.into(),
        args: BTreeMap::from([(key.to_string(), value.to_string())]),
    }
}

/// Built-in action table merged under user edits at startup.
pub fn default_actions() -> BTreeMap<String, ActionEntry> {
    use Scope::{Both, TopOnly};

    let entries = [
        ("→←", ActionEntry::new("Back", plugin("history.back"), TopOnly)),
        ("←→", ActionEntry::new("Forward", plugin("history.forward"), TopOnly)),
        ("→↓", ActionEntry::new("Close page", ActionBody::CloseTab, TopOnly)),
        ("↓↑", ActionEntry::new("Reload", plugin("page.reload"), TopOnly)),
        (
            "T↑",
            ActionEntry::new(
                "Copy selection",
                ActionBody::CopyText {
                    source: TextSource::Selection,
                },
                Both,
            ),
        ),
        (
            "I↓",
            ActionEntry::new(
                "Open image",
                ActionBody::OpenUrl {
                    source: TextSource::TargetImage,
                },
                TopOnly,
            ),
        ),
        (
            "V←",
            ActionEntry::new("Seek back", plugin_with("media.seek", "seconds", "-10"), Both),
        ),
        (
            "V→",
            ActionEntry::new("Seek forward", plugin_with("media.seek", "seconds", "10"), Both),
        ),
        (
            "V●",
            ActionEntry::new("Speed up", plugin_with("media.rate", "rate", "3"), Both),
        ),
        ("●○", ActionEntry::new("Restore speed", plugin("media.rate.restore"), Both)),
        (
            "V↑",
            ActionEntry::new(
                "Fullscreen",
                ActionBody::Frame {
                    request: FrameRequest::Fullscreen { enter: true },
                },
                TopOnly,
            ),
        ),
        (
            "V↓",
            ActionEntry::new(
                "Lock landscape",
                ActionBody::Frame {
                    request: FrameRequest::OrientationLock {
                        orientation: Orientation::Landscape,
                    },
                },
                TopOnly,
            ),
        ),
    ];

    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
