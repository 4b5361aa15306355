//! [`ResponseCapture`] – the cursor a participant answers with.
//!
//! Each [`ResponseMode`] maps to a different cursor proxy:
//!
//! | mode | cursor | grip before confirm | bounds recorded |
//! |---|---|---|---|
//! | `object` | grabbable copy of the target at the spawn point | yes | yes |
//! | `cube` | the base scene's `CursorCube` at the spawn point | yes | yes |
//! | `point` | `CursorSphere` following the right controller | no | no |
//! | `laser` | laser pointer ray hit | no | no |
//! | `stick` | tip of the pointer stick | no | no |
//!
//! Placement cursors spawn in front of the standing participant, in the
//! quadrant they were asked to face (see [`spawn_point`]).

use roomrecall_rig::{ObjectHandle, ObjectRegistry, PointerKind, Rig};
use roomrecall_spatial::{Aabb, Pose, Quaternion, Vec3, normalize_degrees};
use roomrecall_types::{ExperimentError, ResponseMode};
use tracing::{debug, warn};

use crate::target::{Target, object_bounds};

pub const CURSOR_CUBE: &str = "CursorCube";
pub const CURSOR_SPHERE: &str = "CursorSphere";

/// Horizontal distance of the spawn point from the room origin.
const SPAWN_DISTANCE: f32 = 0.6;
/// Spawn height as a fraction of the participant's head height.
const SPAWN_HEIGHT_FACTOR: f32 = 0.75;

/// Spawn position for placement cursors.
///
/// The heading is wrapped into `[0, 360)` and bucketed into four quadrants
/// centred on the axes; the cursor appears 0.6 m along that axis at three
/// quarters of the head height.
pub fn spawn_point(required_yaw: f32, head_height: f32) -> Vec3 {
    let yaw = normalize_degrees(required_yaw);
    let h = head_height * SPAWN_HEIGHT_FACTOR;
    if yaw > 315.0 || yaw <= 45.0 {
        Vec3::new(0.0, h, SPAWN_DISTANCE)
    } else if yaw <= 135.0 {
        Vec3::new(SPAWN_DISTANCE, h, 0.0)
    } else if yaw <= 225.0 {
        Vec3::new(0.0, h, -SPAWN_DISTANCE)
    } else {
        Vec3::new(-SPAWN_DISTANCE, h, 0.0)
    }
}

/// The active cursor proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// A copy of the target, destroyed on release.
    Spawned(ObjectHandle),
    /// The fixed reference cube.
    ReferenceProxy(ObjectHandle),
    /// The marker sphere that tracks the right hand.
    HandMarker(ObjectHandle),
    Laser,
    Stick,
}

/// Pose (and, for placement modes, extent) of the cursor at confirm time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseRecord {
    pub pose: Pose,
    pub bounds: Option<Aabb>,
}

#[derive(Debug, Clone)]
pub struct ResponseCapture {
    mode: ResponseMode,
    cursor: Cursor,
}

impl ResponseCapture {
    /// Bring up the cursor for `mode`.
    ///
    /// `object` mode without a resolved target falls back to the reference
    /// cube.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::ObjectNotFound`] when a required proxy is not
    /// registered; backend failures are propagated.
    pub fn activate<R: Rig + ?Sized>(
        mode: ResponseMode,
        target: Option<&Target>,
        spawn: Vec3,
        registry: &ObjectRegistry,
        rig: &mut R,
    ) -> Result<Self, ExperimentError> {
        let (mode, cursor) = match (mode, target) {
            (ResponseMode::Object, Some(t)) => {
                let copy = rig.duplicate(t.handle, Pose::new(spawn, t.pose.rotation))?;
                rig.set_active(copy, true)?;
                (mode, Cursor::Spawned(copy))
            }
            (ResponseMode::Object, None) | (ResponseMode::Cube, _) => {
                if mode == ResponseMode::Object {
                    warn!("object response without a target, using the reference cube");
                }
                let cube = proxy(registry, CURSOR_CUBE)?;
                rig.set_position(cube, spawn)?;
                rig.set_rotation(cube, Quaternion::identity())?;
                rig.set_active(cube, true)?;
                (ResponseMode::Cube, Cursor::ReferenceProxy(cube))
            }
            (ResponseMode::Point, _) => {
                let sphere = proxy(registry, CURSOR_SPHERE)?;
                rig.set_active(sphere, true)?;
                let cursor = Cursor::HandMarker(sphere);
                follow_hand(sphere, rig)?;
                (mode, cursor)
            }
            (ResponseMode::Laser, _) => {
                rig.set_pointer_visible(PointerKind::Laser, true);
                (mode, Cursor::Laser)
            }
            (ResponseMode::Stick, _) => {
                rig.set_pointer_visible(PointerKind::Stick, true);
                (mode, Cursor::Stick)
            }
        };
        debug!(mode = %mode, ?cursor, "response cursor active");
        Ok(Self { mode, cursor })
    }

    /// The mode actually in effect (after any fallback).
    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Placement cursors must be grabbed before a confirm counts.
    pub fn needs_grip(&self) -> bool {
        self.mode.is_placement()
    }

    /// Per-tick update: the hand marker tracks the right controller.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn follow<R: Rig + ?Sized>(&self, rig: &mut R) -> Result<(), ExperimentError> {
        match self.cursor {
            Cursor::HandMarker(sphere) => follow_hand(sphere, rig),
            _ => Ok(()),
        }
    }

    /// Snapshot the cursor.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::ObjectNotFound`] if the cursor object vanished.
    pub fn capture<R: Rig + ?Sized>(&self, rig: &R) -> Result<ResponseRecord, ExperimentError> {
        let pose = match self.cursor {
            Cursor::Spawned(h) | Cursor::ReferenceProxy(h) | Cursor::HandMarker(h) => rig
                .pose(h)
                .ok_or_else(|| ExperimentError::ObjectNotFound(h.to_string()))?,
            Cursor::Laser => rig.pointer_endpoint(PointerKind::Laser),
            Cursor::Stick => rig.pointer_endpoint(PointerKind::Stick),
        };
        let bounds = match self.cursor {
            Cursor::Spawned(h) | Cursor::ReferenceProxy(h) => object_bounds(rig, h),
            _ => None,
        };
        Ok(ResponseRecord { pose, bounds })
    }

    /// Take the cursor down again.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn release<R: Rig + ?Sized>(self, rig: &mut R) -> Result<(), ExperimentError> {
        match self.cursor {
            Cursor::Spawned(h) => rig.destroy(h),
            Cursor::ReferenceProxy(h) | Cursor::HandMarker(h) => rig.set_active(h, false),
            Cursor::Laser => {
                rig.set_pointer_visible(PointerKind::Laser, false);
                Ok(())
            }
            Cursor::Stick => {
                rig.set_pointer_visible(PointerKind::Stick, false);
                Ok(())
            }
        }
    }
}

fn proxy(registry: &ObjectRegistry, name: &str) -> Result<ObjectHandle, ExperimentError> {
    registry
        .resolve(name)
        .ok_or_else(|| ExperimentError::ObjectNotFound(name.to_string()))
}

fn follow_hand<R: Rig + ?Sized>(sphere: ObjectHandle, rig: &mut R) -> Result<(), ExperimentError> {
    let hand = rig.right_controller();
    rig.set_position(sphere, hand.position)?;
    rig.set_rotation(sphere, hand.rotation)
}
