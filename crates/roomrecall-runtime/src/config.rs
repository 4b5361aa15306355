//! Experiment configuration derived from the session settings.
//!
//! Every key is optional; absent keys fall back to the defaults below.  A key
//! that is present with the wrong type aborts setup.
//!
//! | key | default |
//! |---|---|
//! | `randomize_trials` | `true` |
//! | `fade_duration` | `0.5` s |
//! | `iti_duration` | `1.0` s |
//! | `preview_duration` | `5.0` s |
//! | `preview_wait_for_trigger` | `true` |
//! | `preview_target_label` | `false` |
//! | `sound_on_view_misalignment` | `true` |
//! | `sound_on_trial_end` | `true` |
//! | `show_mask_scene` | `false` |
//! | `blank_duration` | `2.0` s; values below 1 s become `2 × fade_duration` |
//! | `max_distance_from_origin` | `0.3` m |
//! | `max_view_direction_error` | `40` ° |
//! | `arrangements_csv` | none |
//! | `calibrate_eye_tracker` | `false` |

use std::path::PathBuf;

use roomrecall_protocol::SettingsView;
use roomrecall_types::{ExperimentError, Rgba};
use tracing::debug;

/// Assets root used when `ROOMRECALL_ASSETS_ROOT` is not set.
pub const DEFAULT_ASSETS_ROOT: &str = "StreamingAssets";

/// Shortest blank period taken verbatim; anything shorter is replaced so the
/// fades still fit.
const MIN_BLANK_DURATION: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub trial_specification_name: Option<String>,
    pub randomize_trials: bool,
    pub fade_duration: f32,
    pub iti_duration: f32,
    pub preview_duration: f32,
    pub preview_wait_for_trigger: bool,
    pub preview_target_label: bool,
    pub sound_on_view_misalignment: bool,
    pub sound_on_trial_end: bool,
    pub show_mask_scene: bool,
    pub blank_duration: f32,
    pub max_distance_from_origin: f32,
    pub max_view_direction_error: f32,
    /// Arrangement table, relative to [`assets_root`][Self::assets_root].
    pub arrangements_csv: Option<String>,
    pub calibrate_eye_tracker: bool,
    /// Colour faded to while the scene is hidden.
    pub fade_color: Rgba,
    pub assets_root: PathBuf,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            trial_specification_name: None,
            randomize_trials: true,
            fade_duration: 0.5,
            iti_duration: 1.0,
            preview_duration: 5.0,
            preview_wait_for_trigger: true,
            preview_target_label: false,
            sound_on_view_misalignment: true,
            sound_on_trial_end: true,
            show_mask_scene: false,
            blank_duration: 2.0,
            max_distance_from_origin: 0.3,
            max_view_direction_error: 40.0,
            arrangements_csv: None,
            calibrate_eye_tracker: false,
            fade_color: Rgba::GRAY,
            assets_root: PathBuf::from(DEFAULT_ASSETS_ROOT),
        }
    }
}

impl ExperimentConfig {
    /// Read the configuration from the session settings.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::TypeMismatch`] for a key holding the wrong type.
    pub fn from_settings<S: SettingsView + ?Sized>(settings: &S) -> Result<Self, ExperimentError> {
        let d = Self::default();
        let fade_duration = settings.float_or("fade_duration", d.fade_duration)?;
        let blank_duration = match settings.float("blank_duration")? {
            Some(v) if v >= MIN_BLANK_DURATION => v,
            Some(_) => 2.0 * fade_duration,
            None => d.blank_duration,
        };

        let mut cfg = Self {
            trial_specification_name: settings
                .string("trial_specification_name")?
                .map(str::to_string),
            randomize_trials: settings.bool_or("randomize_trials", d.randomize_trials)?,
            fade_duration,
            iti_duration: settings.float_or("iti_duration", d.iti_duration)?,
            preview_duration: settings.float_or("preview_duration", d.preview_duration)?,
            preview_wait_for_trigger: settings
                .bool_or("preview_wait_for_trigger", d.preview_wait_for_trigger)?,
            preview_target_label: settings
                .bool_or("preview_target_label", d.preview_target_label)?,
            sound_on_view_misalignment: settings
                .bool_or("sound_on_view_misalignment", d.sound_on_view_misalignment)?,
            sound_on_trial_end: settings.bool_or("sound_on_trial_end", d.sound_on_trial_end)?,
            show_mask_scene: settings.bool_or("show_mask_scene", d.show_mask_scene)?,
            blank_duration,
            max_distance_from_origin: settings
                .float_or("max_distance_from_origin", d.max_distance_from_origin)?,
            max_view_direction_error: settings
                .float_or("max_view_direction_error", d.max_view_direction_error)?,
            arrangements_csv: settings.string("arrangements_csv")?.map(str::to_string),
            calibrate_eye_tracker: settings
                .bool_or("calibrate_eye_tracker", d.calibrate_eye_tracker)?,
            fade_color: d.fade_color,
            assets_root: d.assets_root,
        };
        apply_env_overrides(&mut cfg);
        debug!(?cfg, "experiment configuration");
        Ok(cfg)
    }

    /// Absolute-or-relative path of the arrangement table, if configured.
    pub fn arrangements_path(&self) -> Option<PathBuf> {
        self.arrangements_csv
            .as_ref()
            .map(|file| self.assets_root.join(file))
    }
}

/// Apply `ROOMRECALL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROOMRECALL_ASSETS_ROOT` | `assets_root` |
pub fn apply_env_overrides(cfg: &mut ExperimentConfig) {
    if let Ok(v) = std::env::var("ROOMRECALL_ASSETS_ROOT")
        && !v.is_empty()
    {
        cfg.assets_root = PathBuf::from(v);
    }
}
