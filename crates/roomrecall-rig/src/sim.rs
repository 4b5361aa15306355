//! In-process simulated rig for headless testing.
//!
//! [`SimRig`] implements every capability trait of this crate with plain
//! in-memory state: scenes are lists of [`SimObjectSpec`]s instantiated on
//! load, poses and buttons are set by the test, and every fade, cue and
//! instruction change is recorded so tests can assert on it.
//!
//! Scene loads take a configurable number of [`SimRig::step`] calls to
//! complete, which lets tests observe the pending state of the scene cache.
//!
//! # Scene layout
//!
//! Every scene added with [`SimRigBuilder::with_scene`] gets a root object
//! named like the scene plus the two light sources `LightSourceSun` and
//! `LightSourceRoom`.  The objects given by the test become children of the
//! root.  The base scene always holds the `CursorCube` and `CursorSphere`
//! proxies.
//!
//! # Example
//!
//! ```rust
//! use roomrecall_rig::sim::{SimObjectSpec, SimRig};
//! use roomrecall_rig::{LoadState, SceneBackend};
//! use roomrecall_spatial::Vec3;
//!
//! let mut rig = SimRig::builder()
//!     .with_scene("K01", vec![SimObjectSpec::new("K01_G03", Vec3::new(0.0, 1.0, 0.0))])
//!     .with_load_latency(2)
//!     .build();
//!
//! rig.begin_load("K01").unwrap();
//! assert_eq!(rig.load_state("K01"), LoadState::Loading);
//! rig.step();
//! rig.step();
//! assert_eq!(rig.load_state("K01"), LoadState::Loaded);
//! assert!(rig.find("K01_G03").is_some());
//! ```

use std::collections::{BTreeMap, HashMap};

use roomrecall_spatial::{Aabb, Pose, Quaternion, Vec3};
use roomrecall_types::{ControllerState, Cue, ExperimentError, InputEdges, Rgba};
use tracing::debug;

use crate::objects::{ObjectHandle, ObjectStore};
use crate::presentation::{
    EyeTracker, GazeSample, Occluder, PointerDevices, PointerKind, Presentation,
};
use crate::scene::{BASE_SCENE, LoadState, SceneBackend};
use crate::tracking::{InputSource, PoseSource};

/// Names of the light sources every simulated scene carries.
pub const SCENE_LIGHTS: [&str; 2] = ["LightSourceSun", "LightSourceRoom"];

/// Names of the cursor proxies in the base scene.
pub const CURSOR_CUBE: &str = "CursorCube";
pub const CURSOR_SPHERE: &str = "CursorSphere";

// ────────────────────────────────────────────────────────────────────────────
// Object specs
// ────────────────────────────────────────────────────────────────────────────

/// Blueprint for an object instantiated when its scene loads.
#[derive(Debug, Clone)]
pub struct SimObjectSpec {
    name: String,
    pose: Pose,
    mesh_size: Option<Vec3>,
    children: Vec<SimObjectSpec>,
}

impl SimObjectSpec {
    /// An object without a mesh at `position` in world space.
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            pose: Pose::at(position),
            mesh_size: None,
            children: Vec::new(),
        }
    }

    pub fn with_rotation(mut self, rotation: Quaternion) -> Self {
        self.pose.rotation = rotation;
        self
    }

    /// Give the object a box-shaped mesh of `size` centred on its position.
    pub fn with_mesh(mut self, size: Vec3) -> Self {
        self.mesh_size = Some(size);
        self
    }

    /// Attach a child.  Its position is in world space, like the parent's.
    pub fn with_child(mut self, child: SimObjectSpec) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
struct SimObject {
    name: String,
    scene: String,
    pose: Pose,
    mesh_size: Option<Vec3>,
    active: bool,
    parent: Option<ObjectHandle>,
    children: Vec<ObjectHandle>,
}

#[derive(Debug)]
struct SimScene {
    blueprint: Vec<SimObjectSpec>,
    state: LoadState,
    ticks_left: u32,
    objects: Vec<(String, ObjectHandle)>,
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder for a [`SimRig`].
#[derive(Default)]
pub struct SimRigBuilder {
    scenes: Vec<(String, Vec<SimObjectSpec>)>,
    base_objects: Vec<SimObjectSpec>,
    load_latency: u32,
}

impl SimRigBuilder {
    /// Add a loadable scene holding `objects` below its root.
    pub fn with_scene(mut self, name: impl Into<String>, objects: Vec<SimObjectSpec>) -> Self {
        self.scenes.push((name.into(), objects));
        self
    }

    /// Add an extra object to the base scene.
    pub fn with_base_object(mut self, object: SimObjectSpec) -> Self {
        self.base_objects.push(object);
        self
    }

    /// Number of [`SimRig::step`] calls a scene load takes.  `0` loads
    /// synchronously inside `begin_load`.
    pub fn with_load_latency(mut self, ticks: u32) -> Self {
        self.load_latency = ticks;
        self
    }

    pub fn build(self) -> SimRig {
        let mut rig = SimRig {
            scenes: BTreeMap::new(),
            objects: HashMap::new(),
            next_handle: 1,
            load_latency: self.load_latency,
            active_scene: Some(BASE_SCENE.to_string()),
            head: Pose::at(Vec3::new(0.0, 1.7, 0.0)),
            left_hand: Pose::at(Vec3::new(-0.2, 1.2, 0.3)),
            right_hand: Pose::at(Vec3::new(0.2, 1.2, 0.3)),
            controller: ControllerState::default(),
            pending: InputEdges::default(),
            auto_confirm: false,
            auto_grip: false,
            fades: Vec::new(),
            cues: Vec::new(),
            instruction: None,
            standing_marker: None,
            occluder_visible: false,
            occluder_randomizations: 0,
            pointer_visible: HashMap::new(),
            pointer_endpoints: HashMap::new(),
            calibrations: 0,
            gaze: GazeSample::default(),
            loads: HashMap::new(),
            unloads: HashMap::new(),
        };

        let mut base = vec![
            SimObjectSpec::new(CURSOR_CUBE, Vec3::zero()).with_mesh(Vec3::new(0.1, 0.1, 0.1)),
            SimObjectSpec::new(CURSOR_SPHERE, Vec3::zero()).with_mesh(Vec3::new(0.05, 0.05, 0.05)),
        ];
        base.extend(self.base_objects);
        rig.scenes.insert(
            BASE_SCENE.to_string(),
            SimScene {
                blueprint: base,
                state: LoadState::Unloaded,
                ticks_left: 0,
                objects: Vec::new(),
            },
        );
        rig.instantiate(BASE_SCENE);

        for (name, objects) in self.scenes {
            let root = objects.into_iter().fold(
                SimObjectSpec::new(name.clone(), Vec3::zero()),
                SimObjectSpec::with_child,
            );
            let mut blueprint = vec![root];
            blueprint.extend(
                SCENE_LIGHTS
                    .iter()
                    .map(|light| SimObjectSpec::new(*light, Vec3::new(0.0, 3.0, 0.0))),
            );
            rig.scenes.insert(
                name,
                SimScene {
                    blueprint,
                    state: LoadState::Unloaded,
                    ticks_left: 0,
                    objects: Vec::new(),
                },
            );
        }

        rig
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig
// ────────────────────────────────────────────────────────────────────────────

/// A fully simulated VR rig.  See the [module docs][self].
#[derive(Debug)]
pub struct SimRig {
    scenes: BTreeMap<String, SimScene>,
    objects: HashMap<ObjectHandle, SimObject>,
    next_handle: u32,
    load_latency: u32,
    active_scene: Option<String>,
    head: Pose,
    left_hand: Pose,
    right_hand: Pose,
    controller: ControllerState,
    pending: InputEdges,
    auto_confirm: bool,
    auto_grip: bool,
    fades: Vec<(Rgba, f32)>,
    cues: Vec<Cue>,
    instruction: Option<String>,
    standing_marker: Option<(Vec3, f32)>,
    occluder_visible: bool,
    occluder_randomizations: usize,
    pointer_visible: HashMap<PointerKind, bool>,
    pointer_endpoints: HashMap<PointerKind, Pose>,
    calibrations: usize,
    gaze: GazeSample,
    loads: HashMap<String, usize>,
    unloads: HashMap<String, usize>,
}

impl Default for SimRig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SimRig {
    pub fn builder() -> SimRigBuilder {
        SimRigBuilder::default()
    }

    /// Advance pending scene loads by one tick.
    pub fn step(&mut self) {
        let finished: Vec<String> = self
            .scenes
            .iter_mut()
            .filter(|(_, s)| s.state == LoadState::Loading)
            .filter_map(|(name, s)| {
                s.ticks_left = s.ticks_left.saturating_sub(1);
                (s.ticks_left == 0).then(|| name.clone())
            })
            .collect();
        for name in finished {
            self.instantiate(&name);
        }
    }

    // ── Object inspection ───────────────────────────────────────────────────

    /// Handle of the oldest live object called `name`.
    pub fn find(&self, name: &str) -> Option<ObjectHandle> {
        self.objects
            .iter()
            .filter(|(_, o)| o.name == name)
            .map(|(h, _)| *h)
            .min()
    }

    pub fn object_name(&self, object: ObjectHandle) -> Option<&str> {
        self.objects.get(&object).map(|o| o.name.as_str())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// `true` when the object and all its ancestors are active.
    pub fn is_visible(&self, object: ObjectHandle) -> bool {
        let mut cursor = Some(object);
        while let Some(h) = cursor {
            match self.objects.get(&h) {
                Some(o) if o.active => cursor = o.parent,
                _ => return false,
            }
        }
        true
    }

    // ── Scene inspection ────────────────────────────────────────────────────

    /// Non-base scenes that are loading or loaded.
    pub fn resident_scenes(&self) -> Vec<String> {
        self.scenes
            .iter()
            .filter(|(name, s)| name.as_str() != BASE_SCENE && s.state != LoadState::Unloaded)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn active_scene(&self) -> Option<&str> {
        self.active_scene.as_deref()
    }

    /// Number of loads started for `scene`.
    pub fn loads(&self, scene: &str) -> usize {
        self.loads.get(scene).copied().unwrap_or(0)
    }

    /// Number of successful unloads of `scene`.
    pub fn unloads(&self, scene: &str) -> usize {
        self.unloads.get(scene).copied().unwrap_or(0)
    }

    // ── Tracking and input ──────────────────────────────────────────────────

    pub fn set_head(&mut self, pose: Pose) {
        self.head = pose;
    }

    pub fn set_left_controller(&mut self, pose: Pose) {
        self.left_hand = pose;
    }

    pub fn set_right_controller(&mut self, pose: Pose) {
        self.right_hand = pose;
    }

    pub fn set_controller_state(&mut self, state: ControllerState) {
        self.controller = state;
    }

    /// Queue a trigger press for the next poll.
    pub fn press_confirm(&mut self) {
        self.pending.confirm = true;
    }

    /// Queue a grip press for the next poll.
    pub fn press_grip(&mut self) {
        self.pending.grip = true;
    }

    /// Report a confirm edge on every poll.
    pub fn set_auto_confirm(&mut self, on: bool) {
        self.auto_confirm = on;
    }

    /// Report a grip edge on every poll.
    pub fn set_auto_grip(&mut self, on: bool) {
        self.auto_grip = on;
    }

    pub fn set_pointer_endpoint(&mut self, kind: PointerKind, pose: Pose) {
        self.pointer_endpoints.insert(kind, pose);
    }

    // ── Presentation log ────────────────────────────────────────────────────

    /// Every fade started so far, oldest first.
    pub fn fades(&self) -> &[(Rgba, f32)] {
        &self.fades
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    pub fn standing_marker(&self) -> Option<(Vec3, f32)> {
        self.standing_marker
    }

    pub fn occluder_visible(&self) -> bool {
        self.occluder_visible
    }

    pub fn occluder_randomizations(&self) -> usize {
        self.occluder_randomizations
    }

    pub fn pointer_visible(&self, kind: PointerKind) -> bool {
        self.pointer_visible.get(&kind).copied().unwrap_or(false)
    }

    pub fn calibrations(&self) -> usize {
        self.calibrations
    }

    /// Reading returned by every later [`EyeTracker::gaze_sample`].
    pub fn set_gaze(&mut self, sample: GazeSample) {
        self.gaze = sample;
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn allocate(&mut self) -> ObjectHandle {
        let h = ObjectHandle(self.next_handle);
        self.next_handle += 1;
        h
    }

    fn instantiate(&mut self, scene: &str) {
        let Some(blueprint) = self.scenes.get(scene).map(|s| s.blueprint.clone()) else {
            return;
        };
        let mut named = Vec::new();
        for spec in &blueprint {
            self.spawn(spec, scene, None, &mut named);
        }
        if let Some(s) = self.scenes.get_mut(scene) {
            s.state = LoadState::Loaded;
            s.ticks_left = 0;
            s.objects = named;
        }
        debug!(scene = %scene, "sim scene instantiated");
    }

    fn spawn(
        &mut self,
        spec: &SimObjectSpec,
        scene: &str,
        parent: Option<ObjectHandle>,
        named: &mut Vec<(String, ObjectHandle)>,
    ) -> ObjectHandle {
        let h = self.allocate();
        self.objects.insert(
            h,
            SimObject {
                name: spec.name.clone(),
                scene: scene.to_string(),
                pose: spec.pose,
                mesh_size: spec.mesh_size,
                active: true,
                parent,
                children: Vec::new(),
            },
        );
        named.push((spec.name.clone(), h));
        for child in &spec.children {
            let c = self.spawn(child, scene, Some(h), named);
            if let Some(o) = self.objects.get_mut(&h) {
                o.children.push(c);
            }
        }
        h
    }

    fn get(&self, object: ObjectHandle) -> Result<&SimObject, ExperimentError> {
        self.objects
            .get(&object)
            .ok_or_else(|| ExperimentError::ObjectNotFound(object.to_string()))
    }

    /// Copy `object`'s subtree, re-posed so that `object` lands on `pose`.
    fn clone_subtree(
        &mut self,
        object: ObjectHandle,
        anchor: Pose,
        pose: Pose,
        parent: Option<ObjectHandle>,
    ) -> Result<ObjectHandle, ExperimentError> {
        let source = self.get(object)?.clone();
        let new_pose = if parent.is_none() {
            pose
        } else {
            let turn = pose.rotation.mul(anchor.rotation.conjugate());
            let offset = source.pose.position.sub(anchor.position);
            Pose::new(
                pose.position.add(turn.rotate(offset)),
                turn.mul(source.pose.rotation),
            )
        };

        let h = self.allocate();
        let name = if parent.is_none() {
            format!("{}(Clone)", source.name)
        } else {
            source.name.clone()
        };
        self.objects.insert(
            h,
            SimObject {
                name,
                scene: source.scene.clone(),
                pose: new_pose,
                mesh_size: source.mesh_size,
                active: true,
                parent,
                children: Vec::new(),
            },
        );
        for child in source.children {
            let c = self.clone_subtree(child, anchor, pose, Some(h))?;
            if let Some(o) = self.objects.get_mut(&h) {
                o.children.push(c);
            }
        }
        Ok(h)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Capability impls
// ────────────────────────────────────────────────────────────────────────────

impl SceneBackend for SimRig {
    fn scene_names(&self) -> Vec<String> {
        self.scenes.keys().cloned().collect()
    }

    fn begin_load(&mut self, scene: &str) -> Result<(), ExperimentError> {
        let latency = self.load_latency;
        let entry = self
            .scenes
            .get_mut(scene)
            .ok_or_else(|| ExperimentError::UnknownScene(scene.to_string()))?;
        if entry.state != LoadState::Unloaded {
            return Err(ExperimentError::SceneFault {
                scene: scene.to_string(),
                details: "scene is already resident".to_string(),
            });
        }
        entry.state = LoadState::Loading;
        entry.ticks_left = latency;
        *self.loads.entry(scene.to_string()).or_default() += 1;
        if latency == 0 {
            self.instantiate(scene);
        }
        Ok(())
    }

    fn load_state(&self, scene: &str) -> LoadState {
        self.scenes
            .get(scene)
            .map(|s| s.state)
            .unwrap_or(LoadState::Unloaded)
    }

    fn unload(&mut self, scene: &str) -> Result<(), ExperimentError> {
        if scene == BASE_SCENE {
            return Err(ExperimentError::SceneFault {
                scene: scene.to_string(),
                details: "the base scene cannot be unloaded".to_string(),
            });
        }
        let entry = self
            .scenes
            .get_mut(scene)
            .ok_or_else(|| ExperimentError::UnknownScene(scene.to_string()))?;
        if entry.state == LoadState::Unloaded {
            return Err(ExperimentError::SceneFault {
                scene: scene.to_string(),
                details: "scene is not loaded".to_string(),
            });
        }
        entry.state = LoadState::Unloaded;
        entry.ticks_left = 0;
        entry.objects.clear();
        self.objects.retain(|_, o| o.scene != scene);
        *self.unloads.entry(scene.to_string()).or_default() += 1;
        if self.active_scene.as_deref() == Some(scene) {
            self.active_scene = Some(BASE_SCENE.to_string());
        }
        Ok(())
    }

    fn set_active_scene(&mut self, scene: &str) {
        self.active_scene = Some(scene.to_string());
    }

    fn scene_objects(&self, scene: &str) -> Vec<(String, ObjectHandle)> {
        self.scenes
            .get(scene)
            .filter(|s| s.state == LoadState::Loaded)
            .map(|s| s.objects.clone())
            .unwrap_or_default()
    }
}

impl ObjectStore for SimRig {
    fn pose(&self, object: ObjectHandle) -> Option<Pose> {
        self.objects.get(&object).map(|o| o.pose)
    }

    fn set_position(&mut self, object: ObjectHandle, position: Vec3) -> Result<(), ExperimentError> {
        let delta = position.sub(self.get(object)?.pose.position);
        for h in self.descendants(object) {
            if let Some(o) = self.objects.get_mut(&h) {
                o.pose.position = o.pose.position.add(delta);
            }
        }
        if let Some(o) = self.objects.get_mut(&object) {
            o.pose.position = position;
        }
        Ok(())
    }

    fn set_rotation(
        &mut self,
        object: ObjectHandle,
        rotation: Quaternion,
    ) -> Result<(), ExperimentError> {
        let pivot = self.get(object)?.pose;
        let turn = rotation.mul(pivot.rotation.conjugate());
        for h in self.descendants(object) {
            if let Some(o) = self.objects.get_mut(&h) {
                let offset = o.pose.position.sub(pivot.position);
                o.pose.position = pivot.position.add(turn.rotate(offset));
                o.pose.rotation = turn.mul(o.pose.rotation);
            }
        }
        if let Some(o) = self.objects.get_mut(&object) {
            o.pose.rotation = rotation;
        }
        Ok(())
    }

    fn set_active(&mut self, object: ObjectHandle, active: bool) -> Result<(), ExperimentError> {
        let o = self
            .objects
            .get_mut(&object)
            .ok_or_else(|| ExperimentError::ObjectNotFound(object.to_string()))?;
        o.active = active;
        Ok(())
    }

    fn is_active(&self, object: ObjectHandle) -> bool {
        self.objects.get(&object).is_some_and(|o| o.active)
    }

    fn mesh_bounds(&self, object: ObjectHandle) -> Option<Aabb> {
        let o = self.objects.get(&object)?;
        o.mesh_size
            .map(|size| Aabb::from_center_size(o.pose.position, size))
    }

    fn descendants(&self, object: ObjectHandle) -> Vec<ObjectHandle> {
        let mut out = Vec::new();
        let mut stack: Vec<ObjectHandle> = self
            .objects
            .get(&object)
            .map(|o| o.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(h) = stack.pop() {
            out.push(h);
            if let Some(o) = self.objects.get(&h) {
                stack.extend(o.children.iter().rev().copied());
            }
        }
        out
    }

    fn duplicate(&mut self, object: ObjectHandle, pose: Pose) -> Result<ObjectHandle, ExperimentError> {
        let anchor = self.get(object)?.pose;
        self.clone_subtree(object, anchor, pose, None)
    }

    fn destroy(&mut self, object: ObjectHandle) -> Result<(), ExperimentError> {
        let parent = self.get(object)?.parent;
        let mut doomed = self.descendants(object);
        doomed.push(object);
        for h in &doomed {
            self.objects.remove(h);
        }
        if let Some(p) = parent.and_then(|p| self.objects.get_mut(&p)) {
            p.children.retain(|c| *c != object);
        }
        for scene in self.scenes.values_mut() {
            scene.objects.retain(|(_, h)| !doomed.contains(h));
        }
        Ok(())
    }
}

impl PoseSource for SimRig {
    fn head(&self) -> Pose {
        self.head
    }

    fn left_controller(&self) -> Pose {
        self.left_hand
    }

    fn right_controller(&self) -> Pose {
        self.right_hand
    }
}

impl InputSource for SimRig {
    fn poll_edges(&mut self) -> InputEdges {
        let mut edges = std::mem::take(&mut self.pending);
        edges.confirm |= self.auto_confirm;
        edges.grip |= self.auto_grip;
        edges
    }

    fn controller_state(&self) -> ControllerState {
        self.controller
    }
}

impl Presentation for SimRig {
    fn fade_to(&mut self, color: Rgba, duration: f32) {
        self.fades.push((color, duration));
    }

    fn play_cue(&mut self, cue: Cue) {
        self.cues.push(cue);
    }

    fn show_instruction(&mut self, text: &str) {
        self.instruction = Some(text.to_string());
    }

    fn hide_instruction(&mut self) {
        self.instruction = None;
    }

    fn show_standing_marker(&mut self, position: Vec3, yaw_deg: f32) {
        self.standing_marker = Some((position, yaw_deg));
    }

    fn hide_standing_marker(&mut self) {
        self.standing_marker = None;
    }
}

impl Occluder for SimRig {
    fn randomize_occluder(&mut self) {
        self.occluder_randomizations += 1;
    }

    fn set_occluder_visible(&mut self, visible: bool) {
        self.occluder_visible = visible;
    }
}

impl PointerDevices for SimRig {
    fn set_pointer_visible(&mut self, kind: PointerKind, visible: bool) {
        self.pointer_visible.insert(kind, visible);
    }

    fn pointer_endpoint(&self, kind: PointerKind) -> Pose {
        self.pointer_endpoints
            .get(&kind)
            .copied()
            .unwrap_or(self.right_hand)
    }
}

impl EyeTracker for SimRig {
    fn launch_calibration(&mut self) {
        self.calibrations += 1;
    }

    fn gaze_sample(&self) -> GazeSample {
        self.gaze.clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kitchen() -> SimRig {
        SimRig::builder()
            .with_scene(
                "K01",
                vec![
                    SimObjectSpec::new("K01_G03", Vec3::new(0.0, 1.0, 0.0))
                        .with_child(
                            SimObjectSpec::new("lid", Vec3::new(0.0, 1.1, 0.0))
                                .with_mesh(Vec3::new(0.2, 0.02, 0.2)),
                        ),
                ],
            )
            .with_scene("B01", vec![])
            .build()
    }

    #[test]
    fn base_scene_is_resident_with_cursor_proxies() {
        let rig = SimRig::default();
        assert!(rig.find(CURSOR_CUBE).is_some());
        assert!(rig.find(CURSOR_SPHERE).is_some());
        assert_eq!(rig.load_state(BASE_SCENE), LoadState::Loaded);
        assert!(rig.resident_scenes().is_empty());
    }

    #[test]
    fn scene_carries_root_and_lights() {
        let mut rig = kitchen();
        rig.begin_load("K01").unwrap();
        let names: Vec<String> = rig.scene_objects("K01").into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"K01".to_string()));
        assert!(names.contains(&"LightSourceSun".to_string()));
        assert!(names.contains(&"LightSourceRoom".to_string()));
        assert!(names.contains(&"lid".to_string()));
    }

    #[test]
    fn unknown_scene_is_rejected() {
        let mut rig = kitchen();
        let err = rig.begin_load("Z99").unwrap_err();
        assert_eq!(err, ExperimentError::UnknownScene("Z99".to_string()));
    }

    #[test]
    fn unloading_a_cold_scene_faults() {
        let mut rig = kitchen();
        assert!(matches!(
            rig.unload("B01"),
            Err(ExperimentError::SceneFault { .. })
        ));
        assert_eq!(rig.unloads("B01"), 0);
    }

    #[test]
    fn unload_removes_scene_objects() {
        let mut rig = kitchen();
        let before = rig.object_count();
        rig.begin_load("K01").unwrap();
        assert!(rig.object_count() > before);
        rig.unload("K01").unwrap();
        assert_eq!(rig.object_count(), before);
        assert!(rig.find("K01_G03").is_none());
    }

    #[test]
    fn moving_parent_moves_children() {
        let mut rig = kitchen();
        rig.begin_load("K01").unwrap();
        let pot = rig.find("K01_G03").unwrap();
        let lid = rig.find("lid").unwrap();
        rig.set_position(pot, Vec3::new(1.0, 1.0, 0.0)).unwrap();
        let lid_pos = rig.pose(lid).unwrap().position;
        assert!((lid_pos.x - 1.0).abs() < 1e-5);
        assert!((lid_pos.y - 1.1).abs() < 1e-5);
    }

    #[test]
    fn duplicate_copies_subtree_and_destroy_removes_it() {
        let mut rig = kitchen();
        rig.begin_load("K01").unwrap();
        let pot = rig.find("K01_G03").unwrap();
        let count = rig.object_count();

        let copy = rig
            .duplicate(pot, Pose::at(Vec3::new(0.0, 1.0, 0.6)))
            .unwrap();
        assert_eq!(rig.object_name(copy), Some("K01_G03(Clone)"));
        assert_eq!(rig.descendants(copy).len(), 1);
        let child = rig.descendants(copy)[0];
        let bounds = rig.mesh_bounds(child).unwrap();
        assert!((bounds.center().z - 0.6).abs() < 1e-5);
        assert!((bounds.center().y - 1.1).abs() < 1e-5);

        rig.destroy(copy).unwrap();
        assert_eq!(rig.object_count(), count);
        assert!(rig.pose(copy).is_none());
    }

    #[test]
    fn visibility_follows_ancestors() {
        let mut rig = kitchen();
        rig.begin_load("K01").unwrap();
        let root = rig.find("K01").unwrap();
        let pot = rig.find("K01_G03").unwrap();
        rig.set_active(root, false).unwrap();
        assert!(rig.is_active(pot));
        assert!(!rig.is_visible(pot));
    }

    #[test]
    fn queued_edges_are_reported_once() {
        let mut rig = SimRig::default();
        rig.press_confirm();
        assert!(rig.poll_edges().confirm);
        assert!(!rig.poll_edges().confirm);
        rig.set_auto_grip(true);
        assert!(rig.poll_edges().grip);
        assert!(rig.poll_edges().grip);
    }

    #[test]
    fn pointer_endpoint_defaults_to_right_hand() {
        let mut rig = SimRig::default();
        let hand = Pose::at(Vec3::new(0.3, 1.0, 0.5));
        rig.set_right_controller(hand);
        assert_eq!(rig.pointer_endpoint(PointerKind::Stick), hand);
        let hit = Pose::at(Vec3::new(0.0, 0.0, 2.0));
        rig.set_pointer_endpoint(PointerKind::Laser, hit);
        assert_eq!(rig.pointer_endpoint(PointerKind::Laser), hit);
    }
}
