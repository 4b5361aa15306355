//! `roomrecall-protocol` – the building blocks of a trial.
//!
//! Each module owns one concern of the trial protocol and is driven by the
//! sequencer in `roomrecall-runtime`.  None of them keeps time or polls input
//! on its own; they are handed the current time and the rig when they need
//! them.
//!
//! # Modules
//!
//! - [`settings`] – [`SettingsStore`][settings::SettingsStore] and the
//!   trial-over-session [`LayeredSettings`][settings::LayeredSettings] view,
//!   with typed accessors that fail fast on a type mismatch.
//! - [`scene_cache`] – [`SceneCache`][scene_cache::SceneCache]: keeps at most
//!   one experiment scene resident and publishes its objects into the
//!   [`ObjectRegistry`][roomrecall_rig::ObjectRegistry].
//! - [`arrangement`] – [`ArrangementTable`][arrangement::ArrangementTable]:
//!   named object layouts loaded from CSV and applied per trial.
//! - [`start_gate`] – [`StartGate`][start_gate::StartGate]: holds the trial
//!   until the participant stands on the marker facing the right way.
//! - [`target`] – resolving the trial's target object and its extent.
//! - [`shift`] – [`ShiftedObjects`][shift::ShiftedObjects]: temporary
//!   displacement of scene objects between preview and response.
//! - [`response`] – [`ResponseCapture`][response::ResponseCapture]: cursor
//!   proxies for the five response modes.
//! - [`metrics`] – the trial results schema and the error computation.
//! - [`labels`] – [`LabelTable`][labels::LabelTable]: human-readable object
//!   names per scene.

pub mod arrangement;
pub mod labels;
pub mod metrics;
pub mod response;
pub mod scene_cache;
pub mod settings;
pub mod shift;
pub mod start_gate;
pub mod target;

pub use arrangement::{ArrangementReport, ArrangementTable};
pub use labels::LabelTable;
pub use metrics::{ErrorMetrics, RESULT_COLUMNS};
pub use response::{Cursor, ResponseCapture, ResponseRecord, spawn_point};
pub use scene_cache::SceneCache;
pub use settings::{LayeredSettings, SettingsStore, SettingsView};
pub use shift::ShiftedObjects;
pub use start_gate::{GateState, StartGate, StartRequirement};
pub use target::{Target, object_bounds, resolve_target};
