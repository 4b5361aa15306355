//! [`ShiftedObjects`] – temporary displacement of scene objects.
//!
//! Some trials move context objects between preview and response to probe
//! whether participants encode the target relative to its surroundings.  The
//! ids come from the `shift_objects` setting (space separated); every object
//! is translated by the same world-space offset and put back at cleanup.

use roomrecall_rig::{ObjectHandle, ObjectRegistry, ObjectStore};
use roomrecall_spatial::Vec3;
use tracing::{debug, warn};

/// Original positions of shifted objects.
#[derive(Debug, Clone, Default)]
pub struct ShiftedObjects {
    originals: Vec<(ObjectHandle, Vec3)>,
}

impl ShiftedObjects {
    /// Translate every object named in `ids` by `offset`.
    ///
    /// Names that do not resolve are logged and skipped.
    pub fn apply<S: ObjectStore + ?Sized>(
        ids: &str,
        offset: Vec3,
        registry: &ObjectRegistry,
        store: &mut S,
    ) -> Self {
        let mut originals = Vec::new();
        for id in ids.split_whitespace() {
            let Some(handle) = registry.resolve(id) else {
                warn!(object = %id, "shift object not found");
                continue;
            };
            let Some(pose) = store.pose(handle) else {
                continue;
            };
            match store.set_position(handle, pose.position.add(offset)) {
                Ok(()) => originals.push((handle, pose.position)),
                Err(e) => warn!(object = %id, error = %e, "shifting object failed"),
            }
        }
        debug!(count = originals.len(), "objects shifted");
        Self { originals }
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    /// Put every shifted object back where it was.
    pub fn restore<S: ObjectStore + ?Sized>(self, store: &mut S) {
        for (handle, position) in self.originals {
            if let Err(e) = store.set_position(handle, position) {
                warn!(object = %handle, error = %e, "restoring shifted object failed");
            }
        }
    }
}
