//! `roomrecall-runtime` – plays an experiment session on a VR rig.
//!
//! # Modules
//!
//! - [`config`] – [`ExperimentConfig`][config::ExperimentConfig]: the
//!   session-level settings (fade, ITI, preview and blank durations, start
//!   tolerances, arrangement table) with their defaults.
//! - [`sequencer`] – [`TrialSequencer`][sequencer::TrialSequencer]: the
//!   non-blocking per-trial state machine.  It is ticked once per frame and
//!   walks a trial from the start gate through preview, concealment, response
//!   and error computation back to the base scene.
//! - [`session`] – [`Session`][session::Session] and
//!   [`SessionRunner`][session::SessionRunner]: block and trial bookkeeping,
//!   trial order, the inter-trial interval and the closing message.
//! - [`tracker`] – [`MotionTracker`][tracker::MotionTracker] and
//!   [`GazeTracker`][tracker::GazeTracker]: per-frame head, controller and
//!   eye-tracker samples with CSV export.
//! - [`results`] – the trial results table as CSV, and single trials as JSON.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   `tracing` subscriber with optional OTLP span export.

pub mod config;
pub mod results;
pub mod sequencer;
pub mod session;
pub mod telemetry;
pub mod tracker;

pub use config::{ExperimentConfig, apply_env_overrides};
pub use results::{save_results_csv, trial_results_json, write_results_csv};
pub use sequencer::{INSTRUCTION_TEXT, Phase, TrialPlan, TrialSequencer, TrialStatus, Wait};
pub use session::{
    Block, CLOSING_TEXT, ExperimentBuilder, RunnerState, Session, SessionEvent, SessionInfo,
    SessionRunner, Trial,
};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
pub use tracker::{
    GazeRecord, GazeTracker, MotionSample, MotionTracker, save_gaze_csv, save_motion_csv,
    write_gaze_csv, write_motion_csv,
};
