//! Session and trial settings.
//!
//! Settings are a flat key → [`SettingValue`] dictionary.  The session
//! carries one store with experiment-wide defaults; each trial carries its
//! own, and [`LayeredSettings`] reads the trial first and falls back to the
//! session.
//!
//! Typed reads go through [`SettingsView`].  A key that is absent reads as
//! `Ok(None)`; a key holding the wrong type is an error rather than a silent
//! default.
//!
//! # Example
//!
//! ```rust
//! use roomrecall_protocol::settings::{LayeredSettings, SettingsStore, SettingsView};
//!
//! let session = SettingsStore::from_json_str(r#"{"fade_duration": 0.5, "show_mask_scene": false}"#).unwrap();
//! let trial = SettingsStore::new().with("show_mask_scene", true);
//!
//! let view = LayeredSettings::new(&trial, &session);
//! assert_eq!(view.bool_or("show_mask_scene", false).unwrap(), true);
//! assert_eq!(view.float_or("fade_duration", 1.0).unwrap(), 0.5);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use roomrecall_types::{ExperimentError, SettingKind, SettingValue};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Typed access
// ────────────────────────────────────────────────────────────────────────────

/// Read access to a settings dictionary with typed, fail-fast accessors.
pub trait SettingsView {
    /// Raw value stored under `key`.
    fn get(&self, key: &str) -> Option<&SettingValue>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// # Errors
    ///
    /// [`ExperimentError::TypeMismatch`] if `key` holds a non-float value.
    fn float(&self, key: &str) -> Result<Option<f32>, ExperimentError> {
        match self.get(key) {
            None => Ok(None),
            Some(SettingValue::Float(v)) => Ok(Some(*v)),
            Some(other) => Err(mismatch(key, SettingKind::Float, other)),
        }
    }

    /// # Errors
    ///
    /// [`ExperimentError::TypeMismatch`] if `key` holds a non-bool value.
    fn bool(&self, key: &str) -> Result<Option<bool>, ExperimentError> {
        match self.get(key) {
            None => Ok(None),
            Some(SettingValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(mismatch(key, SettingKind::Bool, other)),
        }
    }

    /// # Errors
    ///
    /// [`ExperimentError::TypeMismatch`] if `key` holds a non-string value.
    fn string(&self, key: &str) -> Result<Option<&str>, ExperimentError> {
        match self.get(key) {
            None => Ok(None),
            Some(SettingValue::String(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(mismatch(key, SettingKind::String, other)),
        }
    }

    fn float_or(&self, key: &str, default: f32) -> Result<f32, ExperimentError> {
        Ok(self.float(key)?.unwrap_or(default))
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool, ExperimentError> {
        Ok(self.bool(key)?.unwrap_or(default))
    }

    fn string_or(&self, key: &str, default: &str) -> Result<String, ExperimentError> {
        Ok(self.string(key)?.unwrap_or(default).to_string())
    }
}

fn mismatch(key: &str, expected: SettingKind, found: &SettingValue) -> ExperimentError {
    ExperimentError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SettingsStore
// ────────────────────────────────────────────────────────────────────────────

/// An owned settings dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsStore {
    values: BTreeMap<String, SettingValue>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`][Self::insert].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a JSON object of scalar values.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Config`] if the text is not a JSON object of
    /// numbers, booleans and strings.
    pub fn from_json_str(raw: &str) -> Result<Self, ExperimentError> {
        serde_json::from_str(raw)
            .map_err(|e| ExperimentError::Config(format!("invalid settings JSON: {e}")))
    }

    /// Parse a TOML table of scalar values.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Config`] if the text is not a flat TOML table of
    /// numbers, booleans and strings.
    pub fn from_toml_str(raw: &str) -> Result<Self, ExperimentError> {
        toml::from_str(raw)
            .map_err(|e| ExperimentError::Config(format!("invalid settings TOML: {e}")))
    }

    /// Load a settings file, choosing the format by extension (`.json` or
    /// `.toml`).
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Io`] if the file cannot be read,
    /// [`ExperimentError::Config`] for an unsupported extension or bad
    /// content.
    pub fn load(path: &Path) -> Result<Self, ExperimentError> {
        let raw = fs::read_to_string(path).map_err(|e| ExperimentError::Io {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            Some("toml") => Self::from_toml_str(&raw),
            _ => Err(ExperimentError::Config(format!(
                "unsupported settings file format: {}",
                path.display()
            ))),
        }
    }
}

impl SettingsView for SettingsStore {
    fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LayeredSettings
// ────────────────────────────────────────────────────────────────────────────

/// Trial settings layered over session settings.
#[derive(Debug, Clone, Copy)]
pub struct LayeredSettings<'a> {
    trial: &'a SettingsStore,
    session: &'a SettingsStore,
}

impl<'a> LayeredSettings<'a> {
    pub fn new(trial: &'a SettingsStore, session: &'a SettingsStore) -> Self {
        Self { trial, session }
    }

    pub fn trial(&self) -> &'a SettingsStore {
        self.trial
    }

    pub fn session(&self) -> &'a SettingsStore {
        self.session
    }
}

impl SettingsView for LayeredSettings<'_> {
    fn get(&self, key: &str) -> Option<&SettingValue> {
        self.trial.get(key).or_else(|| self.session.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn absent_key_reads_as_none() {
        let s = SettingsStore::new();
        assert_eq!(s.float("fade_duration").unwrap(), None);
        assert_eq!(s.float_or("fade_duration", 0.5).unwrap(), 0.5);
        assert!(!s.contains("fade_duration"));
    }

    #[test]
    fn wrong_type_fails_fast() {
        let s = SettingsStore::new().with("fade_duration", "slow");
        let err = s.float("fade_duration").unwrap_err();
        assert_eq!(
            err,
            ExperimentError::TypeMismatch {
                key: "fade_duration".to_string(),
                expected: SettingKind::Float,
                found: SettingKind::String,
            }
        );
        assert!(s.float_or("fade_duration", 0.5).is_err());
    }

    #[test]
    fn json_integers_become_floats() {
        let s = SettingsStore::from_json_str(
            r#"{"iti_duration": 2, "randomize_trials": false, "trial_specification_name": "pilot"}"#,
        )
        .unwrap();
        assert_eq!(s.float("iti_duration").unwrap(), Some(2.0));
        assert_eq!(s.bool("randomize_trials").unwrap(), Some(false));
        assert_eq!(s.string("trial_specification_name").unwrap(), Some("pilot"));
    }

    #[test]
    fn toml_settings_parse() {
        let s = SettingsStore::from_toml_str("blank_duration = 0.5\nshow_mask_scene = true\n").unwrap();
        assert_eq!(s.float("blank_duration").unwrap(), Some(0.5));
        assert_eq!(s.bool("show_mask_scene").unwrap(), Some(true));
    }

    #[test]
    fn nested_values_are_rejected() {
        let err = SettingsStore::from_json_str(r#"{"scene": {"name": "K01"}}"#).unwrap_err();
        assert!(matches!(err, ExperimentError::Config(_)));
    }

    #[test]
    fn trial_overrides_session() {
        let session = SettingsStore::new()
            .with("show_mask_scene", false)
            .with("fade_duration", 0.5_f32);
        let trial = SettingsStore::new().with("show_mask_scene", true);
        let view = LayeredSettings::new(&trial, &session);
        assert_eq!(view.bool("show_mask_scene").unwrap(), Some(true));
        assert_eq!(view.float("fade_duration").unwrap(), Some(0.5));
        assert_eq!(view.string("scene").unwrap(), None);
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "preview_duration = 3").unwrap();
        drop(f);
        let s = SettingsStore::load(&path).unwrap();
        assert_eq!(s.float("preview_duration").unwrap(), Some(3.0));

        let yaml = dir.path().join("session.yaml");
        fs::write(&yaml, "a: 1").unwrap();
        assert!(matches!(
            SettingsStore::load(&yaml),
            Err(ExperimentError::Config(_))
        ));

        let missing = dir.path().join("nope.json");
        assert!(matches!(
            SettingsStore::load(&missing),
            Err(ExperimentError::Io { .. })
        ));
    }
}
