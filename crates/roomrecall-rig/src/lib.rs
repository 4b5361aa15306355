//! `roomrecall-rig` – the boundary between trial logic and the VR host.
//!
//! Everything the experiment needs from the outside world (scene streaming,
//! object transforms, tracked poses, controller buttons, fades and cues, the
//! occluder, pointer devices, the eye tracker) is expressed as a small trait.
//! The trial logic only ever talks to these traits, so the same sequencer
//! drives the headset build and the headless [`SimRig`][sim::SimRig] used in
//! tests.
//!
//! # Modules
//!
//! - [`scene`] – [`SceneBackend`][scene::SceneBackend]: additive scene loading
//!   and unloading with a pollable [`LoadState`][scene::LoadState].
//! - [`objects`] – [`ObjectStore`][objects::ObjectStore]: world-object
//!   transforms, visibility, mesh bounds, duplication.
//! - [`tracking`] – [`PoseSource`][tracking::PoseSource] and
//!   [`InputSource`][tracking::InputSource].
//! - [`presentation`] – fades, cues, instruction text, standing marker,
//!   occluder, pointer devices, eye-tracker calibration and gaze samples.
//! - [`registry`] – [`ObjectRegistry`][registry::ObjectRegistry]: name →
//!   handle lookup, published per loaded scene.
//! - [`sim`] – [`SimRig`][sim::SimRig]: an in-process rig for CI.

pub mod objects;
pub mod presentation;
pub mod registry;
pub mod scene;
pub mod sim;
pub mod tracking;

pub use objects::{ObjectHandle, ObjectStore};
pub use presentation::{
    EyeTracker, GazeFocus, GazeSample, Occluder, PointerDevices, PointerKind, Presentation,
};
pub use registry::ObjectRegistry;
pub use scene::{BASE_SCENE, LoadState, SceneBackend};
pub use tracking::{InputSource, PoseSource};

/// Every capability the trial sequencer needs, as a single bound.
///
/// Implemented automatically for any type that provides all of them.
pub trait Rig:
    SceneBackend + ObjectStore + PoseSource + InputSource + Presentation + Occluder + PointerDevices + EyeTracker
{
}

impl<T> Rig for T where
    T: SceneBackend
        + ObjectStore
        + PoseSource
        + InputSource
        + Presentation
        + Occluder
        + PointerDevices
        + EyeTracker
{
}
