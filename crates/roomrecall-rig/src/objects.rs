//! World objects.

use std::fmt;

use roomrecall_spatial::{Aabb, Pose, Quaternion, Vec3};
use roomrecall_types::ExperimentError;

/// Opaque reference to an object living in the host's world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u32);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transform, visibility and geometry access for world objects.
///
/// Positions and rotations are in world space.  Moving or rotating an object
/// carries its descendants along.
pub trait ObjectStore: Send {
    /// Current world pose, or `None` if the handle no longer exists.
    fn pose(&self, object: ObjectHandle) -> Option<Pose>;

    /// # Errors
    ///
    /// Returns [`ExperimentError::ObjectNotFound`] for a stale handle.
    fn set_position(&mut self, object: ObjectHandle, position: Vec3) -> Result<(), ExperimentError>;

    /// # Errors
    ///
    /// Returns [`ExperimentError::ObjectNotFound`] for a stale handle.
    fn set_rotation(
        &mut self,
        object: ObjectHandle,
        rotation: Quaternion,
    ) -> Result<(), ExperimentError>;

    /// Show or hide an object (and implicitly its subtree).
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::ObjectNotFound`] for a stale handle.
    fn set_active(&mut self, object: ObjectHandle, active: bool) -> Result<(), ExperimentError>;

    fn is_active(&self, object: ObjectHandle) -> bool;

    /// World-space bounds of the object's own mesh, if it has one.
    fn mesh_bounds(&self, object: ObjectHandle) -> Option<Aabb>;

    /// All objects below `object` in the hierarchy, depth first.
    fn descendants(&self, object: ObjectHandle) -> Vec<ObjectHandle>;

    /// Instantiate a copy of `object` (with its subtree) at `pose`.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::ObjectNotFound`] for a stale handle.
    fn duplicate(&mut self, object: ObjectHandle, pose: Pose) -> Result<ObjectHandle, ExperimentError>;

    /// Destroy `object` and its subtree.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::ObjectNotFound`] for a stale handle.
    fn destroy(&mut self, object: ObjectHandle) -> Result<(), ExperimentError>;
}
