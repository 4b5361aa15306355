//! [`ObjectRegistry`] – name → handle lookup for world objects.
//!
//! Objects are looked up by the names the experiment designer gave them in
//! the trial table (`target`, `shift_objects`, arrangement rows).  The
//! registry holds two layers:
//!
//! - **base** objects, registered once from the always-resident base scene
//!   (cursor proxies and the like);
//! - **scene** objects, published by the scene cache each time a scene
//!   becomes active and cleared when it is left.
//!
//! [`resolve`][ObjectRegistry::resolve] searches the active scene first, so a
//! scene object shadows a base object of the same name.

use std::collections::HashMap;

use crate::objects::ObjectHandle;

#[derive(Debug, Default, Clone)]
pub struct ObjectRegistry {
    base: HashMap<String, ObjectHandle>,
    scene: HashMap<String, ObjectHandle>,
    active_scene: Option<String>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object of the base scene.  Replaces any previous entry
    /// with the same name.
    pub fn register_base(&mut self, name: impl Into<String>, handle: ObjectHandle) {
        self.base.insert(name.into(), handle);
    }

    /// Replace the scene layer with the objects of `scene`.
    pub fn publish_scene<I>(&mut self, scene: &str, objects: I)
    where
        I: IntoIterator<Item = (String, ObjectHandle)>,
    {
        self.scene = objects.into_iter().collect();
        self.active_scene = Some(scene.to_string());
    }

    /// Drop the scene layer; only base objects stay resolvable.
    pub fn clear_scene(&mut self) {
        self.scene.clear();
        self.active_scene = None;
    }

    /// Look `name` up in the active scene, then in the base scene.
    pub fn resolve(&self, name: &str) -> Option<ObjectHandle> {
        self.scene
            .get(name)
            .or_else(|| self.base.get(name))
            .copied()
    }

    /// Name of the scene whose objects are currently published.
    pub fn active_scene(&self) -> Option<&str> {
        self.active_scene.as_deref()
    }

    /// Number of resolvable names (scene and base, shadowed names counted
    /// once).
    pub fn len(&self) -> usize {
        self.scene.len() + self.base.keys().filter(|k| !self.scene.contains_key(*k)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
