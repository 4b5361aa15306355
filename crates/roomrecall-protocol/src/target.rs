//! Target resolution.
//!
//! A trial's `target` setting names the object the participant has to
//! remember.  Resolving it captures everything the error computation needs
//! before the object is hidden: its pose, its extent and its label.

use roomrecall_rig::{ObjectHandle, ObjectRegistry, ObjectStore};
use roomrecall_spatial::{Aabb, Pose};
use tracing::warn;

use crate::labels::LabelTable;

/// The resolved target of a trial.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    pub handle: ObjectHandle,
    pub label: String,
    pub pose: Pose,
    pub bounds: Aabb,
}

/// World-space extent of an object.
///
/// The union of the meshes below `object`; the object's own mesh when it has
/// no mesh-bearing descendants; a zero-sized box at its position when it has
/// no mesh at all.  `None` only for a stale handle.
pub fn object_bounds<S: ObjectStore + ?Sized>(store: &S, object: ObjectHandle) -> Option<Aabb> {
    let pose = store.pose(object)?;
    let meshes: Vec<Aabb> = store
        .descendants(object)
        .into_iter()
        .filter_map(|h| store.mesh_bounds(h))
        .collect();
    Some(
        Aabb::union_all(&meshes)
            .or_else(|| store.mesh_bounds(object))
            .unwrap_or_else(|| Aabb::at_point(pose.position)),
    )
}

/// Resolve `name` through the registry and snapshot the object.
///
/// Returns `None` (logged at warn) if the name is not published.
pub fn resolve_target<S: ObjectStore + ?Sized>(
    name: &str,
    registry: &ObjectRegistry,
    store: &S,
    labels: &LabelTable,
) -> Option<Target> {
    let Some(handle) = registry.resolve(name) else {
        warn!(target_object = %name, "target object not found");
        return None;
    };
    let pose = store.pose(handle)?;
    let bounds = object_bounds(store, handle)?;
    Some(Target {
        name: name.to_string(),
        handle,
        label: labels.label_or_unknown(registry.active_scene(), name),
        pose,
        bounds,
    })
}
