//! Scene streaming.

use roomrecall_types::ExperimentError;

use crate::objects::ObjectHandle;

/// The always-resident staging scene (instruction board, cursor proxies).
pub const BASE_SCENE: &str = "BaseScene";

/// Progress of an additive scene load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// A host that can stream named scenes in and out of the world.
///
/// Loads are additive and asynchronous: [`begin_load`][Self::begin_load]
/// returns immediately and [`load_state`][Self::load_state] is polled until
/// it reports [`LoadState::Loaded`].
pub trait SceneBackend: Send {
    /// Every scene the host can load, including [`BASE_SCENE`].
    fn scene_names(&self) -> Vec<String>;

    /// Start loading `scene` additively.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::UnknownScene`] if the host has no such
    /// scene, or [`ExperimentError::SceneFault`] if the load cannot start.
    fn begin_load(&mut self, scene: &str) -> Result<(), ExperimentError>;

    fn load_state(&self, scene: &str) -> LoadState;

    /// Unload `scene` and every object in it.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::SceneFault`] if the scene is not resident.
    fn unload(&mut self, scene: &str) -> Result<(), ExperimentError>;

    /// Make `scene` the target of scene-relative queries and instantiation.
    fn set_active_scene(&mut self, scene: &str);

    /// Named objects of a loaded scene.  Empty while the scene is not loaded.
    fn scene_objects(&self, scene: &str) -> Vec<(String, ObjectHandle)>;
}
