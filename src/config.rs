//! Persisted settings: two key-value entries.
//!
//! `gesture.actions` maps legacy path strings to [`ActionEntry`] values;
//! `gesture.features` maps feature names to a boolean toggle or the
//! sensitivity 4-tuple. Both are merged over built-in defaults at
//! startup. Bad entries are reported and skipped, never fatal.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::dispatch::registry::{ActionEntry, default_actions};
use crate::gesture::path::GesturePath;

pub const ACTIONS_KEY: &str = "gesture.actions";
pub const FEATURES_KEY: &str = "gesture.features";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no config directory: set $TOUCHPATH_CONFIG, $XDG_CONFIG_HOME or $HOME")]
    NoConfigDir,
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("config encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Slide-limit sensitivity, persisted as `[current, min, max, precision]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Sensitivity {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub precision: f64,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self::from([0.02, 0.005, 0.1, 0.001])
    }
}

impl From<[f64; 4]> for Sensitivity {
    /// Clamps `current` into `[min, max]` and rounds it to `precision`.
    fn from([current, min, max, precision]: [f64; 4]) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let mut value = current.clamp(min, max);
        if precision > 0.0 {
            value = ((value / precision).round() * precision).clamp(min, max);
        }
        Self {
            current: value,
            min,
            max,
            precision,
        }
    }
}

impl From<Sensitivity> for [f64; 4] {
    fn from(s: Sensitivity) -> Self {
        [s.current, s.min, s.max, s.precision]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Features {
    pub text_gestures: bool,
    pub media_gestures: bool,
    pub image_gestures: bool,
    pub break_touch: bool,
    pub sensitivity: Sensitivity,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            text_gestures: true,
            media_gestures: true,
            image_gestures: true,
            break_touch: true,
            sensitivity: Sensitivity::default(),
        }
    }
}

/// One stored feature value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureValue {
    Toggle(bool),
    Range([f64; 4]),
}

/// A stored entry that was skipped during load.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub key: String,
    pub reason: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

impl ConfigIssue {
    fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub actions: BTreeMap<String, ActionEntry>,
    pub features: Features,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            actions: default_actions(),
            features: Features::default(),
        }
    }
}

impl Settings {
    /// Load from `store`, logging every skipped entry.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let (settings, issues) = Self::load_checked(store);
        for issue in &issues {
            warn!(key = %issue.key, reason = %issue.reason, "config entry skipped");
        }
        settings
    }

    /// Load from `store`, returning skipped entries alongside.
    pub fn load_checked(store: &dyn KeyValueStore) -> (Self, Vec<ConfigIssue>) {
        let mut settings = Self::default();
        let mut issues = Vec::new();

        match store.get(ACTIONS_KEY) {
            None => debug!("no stored actions, using defaults"),
            Some(Value::Object(table)) => {
                for (path, raw) in table {
                    let key = format!("{ACTIONS_KEY}.{path}");
                    let parsed: GesturePath = match path.parse() {
                        Ok(p) => p,
                        Err(e) => {
                            issues.push(ConfigIssue::new(key, e.to_string()));
                            continue;
                        }
                    };
                    match serde_json::from_value::<ActionEntry>(raw) {
                        Ok(entry) => {
                            settings.actions.insert(parsed.to_string(), entry);
                        }
                        Err(e) => issues.push(ConfigIssue::new(key, e.to_string())),
                    }
                }
            }
            Some(_) => issues.push(ConfigIssue::new(ACTIONS_KEY, "expected an object")),
        }

        match store.get(FEATURES_KEY) {
            None => debug!("no stored features, using defaults"),
            Some(Value::Object(table)) => {
                for (name, raw) in table {
                    let key = format!("{FEATURES_KEY}.{name}");
                    match serde_json::from_value::<FeatureValue>(raw) {
                        Ok(value) => {
                            if let Err(reason) = settings.features.apply(&name, value) {
                                issues.push(ConfigIssue::new(key, reason));
                            }
                        }
                        Err(_) => issues.push(ConfigIssue::new(
                            key,
                            "expected a boolean or a 4-element number array",
                        )),
                    }
                }
            }
            Some(_) => issues.push(ConfigIssue::new(FEATURES_KEY, "expected an object")),
        }

        (settings, issues)
    }

    /// Write both entries back to `store`.
    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), ConfigError> {
        store.set(ACTIONS_KEY, serde_json::to_value(&self.actions)?)?;
        store.set(FEATURES_KEY, serde_json::to_value(&self.features)?)?;
        Ok(())
    }
}

impl Features {
    fn apply(&mut self, name: &str, value: FeatureValue) -> Result<(), String> {
        let flag = match name {
            "text_gestures" => &mut self.text_gestures,
            "media_gestures" => &mut self.media_gestures,
            "image_gestures" => &mut self.image_gestures,
            "break_touch" => &mut self.break_touch,
            "sensitivity" => {
                return match value {
                    FeatureValue::Range(range) => {
                        self.sensitivity = Sensitivity::from(range);
                        Ok(())
                    }
                    FeatureValue::Toggle(_) => Err("sensitivity must be a 4-tuple".into()),
                };
            }
            _ => return Err("unknown feature".into()),
        };
        match value {
            FeatureValue::Toggle(on) => {
                *flag = on;
                Ok(())
            }
            FeatureValue::Range(_) => Err("expected a boolean".into()),
        }
    }
}

/// Persistent key-value storage for settings entries.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), ConfigError>;
}

impl KeyValueStore for serde_json::Map<String, Value> {
    fn get(&self, key: &str) -> Option<Value> {
        serde_json::Map::get(self, key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), ConfigError> {
        self.insert(key.to_string(), value);
        Ok(())
    }
}

/// JSON object file holding every entry. A missing file is an empty
/// store; writes rewrite the whole file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: serde_json::Map<String, Value>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| ConfigError::Json {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::Map::new(),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        std::fs::write(&self.path, bytes).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), ConfigError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }
}

/// Settings file location.
///
/// `$TOUCHPATH_CONFIG` if set, else `$XDG_CONFIG_HOME/touchpath/settings.json`,
/// else `$HOME/.config/touchpath/settings.json`.
pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var("TOUCHPATH_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let home = std::env::var("HOME").map_err(|_| ConfigError::NoConfigDir)?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(base.join("touchpath").join("settings.json"))
}
