use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// The type tag of a [`SettingValue`], used in type-mismatch diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    Float,
    Bool,
    String,
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKind::Float => write!(f, "float"),
            SettingKind::Bool => write!(f, "bool"),
            SettingKind::String => write!(f, "string"),
        }
    }
}

/// A single session or trial setting.
///
/// Settings arrive from JSON/TOML files or from trial tables; integers are
/// stored as [`SettingValue::Float`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Float(f32),
    String(String),
}

impl SettingValue {
    /// Return the type tag of this value.
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Float(_) => SettingKind::Float,
            SettingValue::Bool(_) => SettingKind::Bool,
            SettingValue::String(_) => SettingKind::String,
        }
    }

    /// Infer a typed value from a raw table cell.
    ///
    /// `"true"`/`"false"` (any case) become [`SettingValue::Bool`], anything
    /// that parses as a number becomes [`SettingValue::Float`], everything
    /// else is kept as a string.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return SettingValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return SettingValue::Bool(false);
        }
        match trimmed.parse::<f32>() {
            Ok(v) if !trimmed.is_empty() => SettingValue::Float(v),
            _ => SettingValue::String(raw.to_string()),
        }
    }
}

impl From<f32> for SettingValue {
    fn from(v: f32) -> Self {
        SettingValue::Float(v)
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::String(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::String(v)
    }
}

/// A value recorded into a trial's results map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    Number(f64),
    Text(String),
}

impl ResultValue {
    /// The numeric value, if this is a [`ResultValue::Number`].
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ResultValue::Number(v) => Some(*v),
            ResultValue::Text(_) => None,
        }
    }

    /// The text value, if this is a [`ResultValue::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResultValue::Text(s) => Some(s),
            ResultValue::Number(_) => None,
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Number(v) => write!(f, "{v}"),
            ResultValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f32> for ResultValue {
    fn from(v: f32) -> Self {
        ResultValue::Number(f64::from(v))
    }
}

impl From<f64> for ResultValue {
    fn from(v: f64) -> Self {
        ResultValue::Number(v)
    }
}

impl From<&str> for ResultValue {
    fn from(v: &str) -> Self {
        ResultValue::Text(v.to_string())
    }
}

impl From<String> for ResultValue {
    fn from(v: String) -> Self {
        ResultValue::Text(v)
    }
}

/// Measurements recorded for one trial, keyed by result column name.
///
/// Values are only ever added, never removed.  Writing a column twice keeps
/// the newer value and is logged, since every column is meant to be written
/// once per trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialResults(BTreeMap<String, ResultValue>);

impl TrialResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `key`, returning the value it replaced.
    pub fn record(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ResultValue>,
    ) -> Option<ResultValue> {
        let key = key.into();
        let previous = self.0.insert(key.clone(), value.into());
        if let Some(old) = &previous {
            warn!(column = %key, previous = %old, "result column written twice");
        }
        previous
    }

    pub fn get(&self, key: &str) -> Option<&ResultValue> {
        self.0.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ResultValue::as_number)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ResultValue::as_text)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// How the participant reports the remembered target location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Place a spawned, grabbable copy of the target.
    Object,
    /// Place a fixed reference cube.
    Cube,
    /// Point with the controller; the marker follows the hand.
    #[default]
    Point,
    /// Aim a ray-cast laser pointer.
    Laser,
    /// Aim a short stick attached to the controller.
    Stick,
}

impl ResponseMode {
    pub const ALL: [ResponseMode; 5] = [
        ResponseMode::Object,
        ResponseMode::Cube,
        ResponseMode::Point,
        ResponseMode::Laser,
        ResponseMode::Stick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Object => "object",
            ResponseMode::Cube => "cube",
            ResponseMode::Point => "point",
            ResponseMode::Laser => "laser",
            ResponseMode::Stick => "stick",
        }
    }

    /// Placement modes require the participant to grab the proxy at least
    /// once before a confirm is accepted, and record a bounding box.
    pub fn is_placement(&self) -> bool {
        matches!(self, ResponseMode::Object | ResponseMode::Cube)
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseMode {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "object" => Ok(ResponseMode::Object),
            "cube" => Ok(ResponseMode::Cube),
            "point" => Ok(ResponseMode::Point),
            "laser" => Ok(ResponseMode::Laser),
            "stick" => Ok(ResponseMode::Stick),
            other => Err(ExperimentError::UnknownResponseMode(other.to_string())),
        }
    }
}

/// An RGBA colour with components in `[0, 1]`, used as fade target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const GRAY: Rgba = Rgba::new(0.5, 0.5, 0.5, 1.0);
    pub const CLEAR: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// `true` when the colour fully covers the view.
    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }
}

/// Auditory cues played by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cue {
    /// Played when the participant confirms while misaligned.
    Error,
    /// Played at the end of each trial.
    Confirm,
}

/// Input edges observed during one scheduling tick.
///
/// An edge is `true` only on the tick the button went down, not while it is
/// held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputEdges {
    pub confirm: bool,
    pub grip: bool,
}

/// Continuous controller state, sampled by the motion tracker.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerState {
    /// Analog grip squeeze in `[0, 1]`.
    pub squeeze: f32,
    pub grip_held: bool,
    pub trigger_held: bool,
}

/// Workspace-wide error type for setup, configuration, and trial execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExperimentError {
    #[error("setting '{key}' is a {found}, expected a {expected}")]
    TypeMismatch {
        key: String,
        expected: SettingKind,
        found: SettingKind,
    },

    #[error("required setting '{0}' is missing")]
    MissingSetting(String),

    #[error("unknown scene '{0}'")]
    UnknownScene(String),

    #[error("scene backend fault on '{scene}': {details}")]
    SceneFault { scene: String, details: String },

    #[error("arrangements file {0} does not exist")]
    ArrangementFileMissing(String),

    #[error("arrangement table row {row}: {details}")]
    ArrangementParse { row: usize, details: String },

    #[error("unknown response mode '{0}'")]
    UnknownResponseMode(String),

    #[error("object '{0}' not found in the active scene")]
    ObjectNotFound(String),

    #[error("trial {0} has already ended")]
    TrialAlreadyEnded(usize),

    #[error("session has no trials")]
    EmptySession,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {path}: {details}")]
    Io { path: String, details: String },
}
