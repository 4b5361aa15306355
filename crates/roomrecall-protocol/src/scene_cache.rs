//! [`SceneCache`] – keeps at most one experiment scene resident.
//!
//! Switching scenes is load-new-then-unload-old: [`select`][SceneCache::select]
//! starts an additive load of the requested scene and unloads the previous
//! one, then [`poll`][SceneCache::poll] is called once per tick until the new
//! scene is ready.  Only then are its objects published into the
//! [`ObjectRegistry`] and its roots cached, so no trial step ever sees a
//! half-loaded scene.
//!
//! Requesting the scene that is already current skips the backend entirely
//! and just shows the cached roots again ([`reuse`][SceneCache::reuse]).
//!
//! # Example
//!
//! ```rust
//! use roomrecall_protocol::scene_cache::SceneCache;
//! use roomrecall_rig::sim::SimRig;
//!
//! let mut rig = SimRig::builder().with_scene("K01", vec![]).build();
//! let mut cache = SceneCache::new(&rig);
//!
//! cache.request("K01", &mut rig).unwrap();
//! assert!(cache.poll(&mut rig));
//! assert_eq!(cache.current(), Some("K01"));
//!
//! // Same scene again: no load.
//! cache.request("K01", &mut rig).unwrap();
//! assert_eq!(rig.loads("K01"), 1);
//! ```

use std::collections::BTreeSet;

use roomrecall_rig::{BASE_SCENE, LoadState, ObjectHandle, ObjectRegistry, ObjectStore, SceneBackend};
use roomrecall_types::ExperimentError;
use tracing::{debug, error, info, warn};

/// Light sources shipped with every experiment scene.  Together with the
/// scene's root object they are the scene's "roots".
pub const SCENE_LIGHTS: [&str; 2] = ["LightSourceSun", "LightSourceRoom"];

pub struct SceneCache {
    scenes: BTreeSet<String>,
    current: Option<String>,
    pending: Option<String>,
    roots: Vec<ObjectHandle>,
    registry: ObjectRegistry,
}

impl SceneCache {
    /// Capture the scene set of `backend` and register the base scene's
    /// objects.
    pub fn new<B: SceneBackend + ?Sized>(backend: &B) -> Self {
        let scenes: BTreeSet<String> = backend
            .scene_names()
            .into_iter()
            .filter(|s| s != BASE_SCENE)
            .collect();
        let mut registry = ObjectRegistry::new();
        for (name, handle) in backend.scene_objects(BASE_SCENE) {
            registry.register_base(name, handle);
        }
        debug!(scenes = scenes.len(), "scene cache initialised");
        Self {
            scenes,
            current: None,
            pending: None,
            roots: Vec::new(),
            registry,
        }
    }

    /// Unload every registered scene.  Run once at start-up so the session
    /// begins from the base scene alone; scenes that are not loaded are
    /// logged and skipped.
    pub fn sweep<B: SceneBackend + ?Sized>(&self, backend: &mut B) {
        for scene in &self.scenes {
            if let Err(e) = backend.unload(scene) {
                warn!(scene = %scene, error = %e, "start-up unload failed");
            }
        }
    }

    /// Load `name`, replacing the current scene.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::UnknownScene`] if `name` is not a registered
    /// scene; the cache is left untouched.  Backend load failures are
    /// propagated.
    pub fn select<B: SceneBackend + ?Sized>(
        &mut self,
        name: &str,
        backend: &mut B,
    ) -> Result<(), ExperimentError> {
        if !self.scenes.contains(name) {
            error!(scene = %name, "scene is not registered");
            return Err(ExperimentError::UnknownScene(name.to_string()));
        }

        if self.pending.as_deref() == Some(name) {
            debug!(scene = %name, "scene load already underway");
            return Ok(());
        }

        backend.begin_load(name)?;
        // A load still in flight is abandoned along with the current scene.
        for previous in [self.pending.take(), self.current.take()].into_iter().flatten() {
            if let Err(e) = backend.unload(&previous) {
                warn!(scene = %previous, error = %e, "unloading previous scene failed");
            }
        }
        self.registry.clear_scene();
        self.roots.clear();
        self.pending = Some(name.to_string());
        info!(scene = %name, "scene load started");
        Ok(())
    }

    /// Show the current scene again without touching the backend.
    pub fn reuse<B: SceneBackend + ObjectStore + ?Sized>(&mut self, backend: &mut B) {
        let Some(scene) = self.current.clone() else {
            debug!("no current scene to reuse");
            return;
        };
        self.set_roots_visible(true, backend);
        backend.set_active_scene(&scene);
        self.registry.publish_scene(&scene, backend.scene_objects(&scene));
        debug!(scene = %scene, "scene reused");
    }

    /// [`reuse`][Self::reuse] when `name` is already current, otherwise
    /// [`select`][Self::select].
    ///
    /// # Errors
    ///
    /// See [`select`][Self::select].
    pub fn request<B: SceneBackend + ObjectStore + ?Sized>(
        &mut self,
        name: &str,
        backend: &mut B,
    ) -> Result<(), ExperimentError> {
        if self.current.as_deref() == Some(name) && self.pending.is_none() {
            self.reuse(backend);
            Ok(())
        } else {
            self.select(name, backend)
        }
    }

    /// Finish a pending load if the backend reports it ready.
    ///
    /// Returns `true` once no load is pending.
    pub fn poll<B: SceneBackend + ?Sized>(&mut self, backend: &mut B) -> bool {
        let Some(scene) = self.pending.clone() else {
            return true;
        };
        if backend.load_state(&scene) != LoadState::Loaded {
            return false;
        }

        backend.set_active_scene(&scene);
        let objects = backend.scene_objects(&scene);
        self.roots = std::iter::once(scene.as_str())
            .chain(SCENE_LIGHTS)
            .filter_map(|root| {
                let found = objects.iter().find(|(n, _)| n == root).map(|(_, h)| *h);
                if found.is_none() {
                    warn!(scene = %scene, object = %root, "scene root missing");
                }
                found
            })
            .collect();
        self.registry.publish_scene(&scene, objects);
        self.current = Some(scene.clone());
        self.pending = None;
        info!(scene = %scene, "scene ready");
        true
    }

    /// Show or hide the current scene's roots.
    pub fn set_roots_visible<S: ObjectStore + ?Sized>(&self, visible: bool, store: &mut S) {
        for root in &self.roots {
            if let Err(e) = store.set_active(*root, visible) {
                warn!(object = %root, error = %e, "toggling scene root failed");
            }
        }
    }

    /// Hand the view back to the base scene: hide the current scene's roots
    /// and make the base scene active.  The scene itself stays resident.
    pub fn deactivate_to_base<B: SceneBackend + ObjectStore + ?Sized>(&self, backend: &mut B) {
        backend.set_active_scene(BASE_SCENE);
        self.set_roots_visible(false, backend);
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Registered experiment scenes (the base scene excluded).
    pub fn scenes(&self) -> impl Iterator<Item = &str> {
        self.scenes.iter().map(String::as_str)
    }

    pub fn roots(&self) -> &[ObjectHandle] {
        &self.roots
    }
}
