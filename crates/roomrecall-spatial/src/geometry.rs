//! Vectors, rotations and poses.
//!
//! Euler angles follow the VR host's convention: degrees, applied in Z, X, Y
//! order (so a rotation is `yaw * pitch * roll`), each reported in
//! `[0, 360)`.
//!
//! # Example
//!
//! ```rust
//! use roomrecall_spatial::geometry::{Quaternion, Vec3};
//!
//! let facing_east = Quaternion::from_euler_degrees(0.0, 90.0, 0.0);
//! assert!((facing_east.yaw_degrees() - 90.0).abs() < 1e-3);
//!
//! // Forward (+Z) turned 90 degrees around Y points along +X.
//! let v = facing_east.rotate(Vec3::new(0.0, 0.0, 1.0));
//! assert!((v.x - 1.0).abs() < 1e-5);
//! ```

use serde::{Deserialize, Serialize};

use crate::angles::normalize_degrees;

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D position or displacement in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance between two points.
    pub fn distance(self, other: Self) -> f32 {
        other.sub(self).length()
    }

    /// Distance between two points projected onto the floor (x/z) plane.
    pub fn planar_distance(self, other: Self) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// Dot products above this are treated as the same rotation.
const SAME_ROTATION_DOT: f32 = 1.0 - 1e-6;

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_deg` degrees around a unit `axis`.
    pub fn from_axis_angle(axis: Vec3, angle_deg: f32) -> Self {
        let half = angle_deg.to_radians() * 0.5;
        let s = half.sin();
        Self::new(half.cos(), axis.x * s, axis.y * s, axis.z * s)
    }

    /// Build a rotation from Euler angles in degrees, applied Z, then X,
    /// then Y.
    pub fn from_euler_degrees(x: f32, y: f32, z: f32) -> Self {
        let qx = Self::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), x);
        let qy = Self::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), y);
        let qz = Self::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), z);
        qy.mul(qx).mul(qz)
    }

    /// Rotation around the vertical axis only.
    pub fn from_yaw_degrees(yaw: f32) -> Self {
        Self::from_euler_degrees(0.0, yaw, 0.0)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.w * rhs.w + self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Euler angles in degrees (Z-X-Y order), each in `[0, 360)`.
    pub fn to_euler_degrees(self) -> Vec3 {
        let Self { w, x, y, z } = self;

        let m00 = 1.0 - 2.0 * (y * y + z * z);
        let m02 = 2.0 * (x * z + w * y);
        let m10 = 2.0 * (x * y + w * z);
        let m11 = 1.0 - 2.0 * (x * x + z * z);
        let m12 = 2.0 * (y * z - w * x);
        let m20 = 2.0 * (x * z - w * y);
        let m22 = 1.0 - 2.0 * (x * x + y * y);

        let pitch = (-m12).clamp(-1.0, 1.0).asin();
        let (yaw, roll) = if m12.abs() < 0.999_999 {
            (m02.atan2(m22), m10.atan2(m11))
        } else {
            // Gimbal lock: roll folds into yaw.
            ((-m20).atan2(m00), 0.0)
        };

        Vec3::new(
            normalize_degrees(pitch.to_degrees()),
            normalize_degrees(yaw.to_degrees()),
            normalize_degrees(roll.to_degrees()),
        )
    }

    /// Heading around the vertical axis in `[0, 360)`.
    pub fn yaw_degrees(self) -> f32 {
        self.to_euler_degrees().y
    }

    /// The shortest angle in degrees that rotates `self` onto `other`.
    ///
    /// Rotations that are numerically the same yield exactly `0.0`.
    pub fn angle_degrees(self, other: Self) -> f32 {
        let dot = self.dot(other).abs().min(1.0);
        if dot > SAME_ROTATION_DOT {
            0.0
        } else {
            (dot.acos() * 2.0).to_degrees()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose
// ────────────────────────────────────────────────────────────────────────────

/// Position and orientation of a tracked device or world object.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quaternion,
}

impl Pose {
    pub const fn new(position: Vec3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }

    /// A pose at `position` with no rotation.
    pub const fn at(position: Vec3) -> Self {
        Self::new(position, Quaternion::identity())
    }

    /// Heading of this pose in `[0, 360)`.
    pub fn yaw_degrees(&self) -> f32 {
        self.rotation.yaw_degrees()
    }
}
