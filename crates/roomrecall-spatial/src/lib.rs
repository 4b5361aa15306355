//! `roomrecall-spatial` – geometry for the tracked room.
//!
//! The experiment reasons about where things are in a metric, left-handed,
//! y-up world (the convention of the VR host).  This crate holds the small
//! amount of math the trial logic needs.
//!
//! # Modules
//!
//! - [`geometry`] – [`Vec3`][geometry::Vec3], [`Quaternion`][geometry::Quaternion]
//!   and [`Pose`][geometry::Pose], including Euler-angle conversion in the
//!   host's Z-X-Y order and the shortest angle between two rotations.
//! - [`bounds`] – [`Aabb`][bounds::Aabb]: axis-aligned bounding boxes that can
//!   be grown to enclose other boxes (used for target and response extents).
//! - [`angles`] – degree helpers: wrap into `[0, 360)` and the shortest signed
//!   difference between two headings.

pub mod angles;
pub mod bounds;
pub mod geometry;

pub use angles::{delta_angle, normalize_degrees, repeat};
pub use bounds::Aabb;
pub use geometry::{Pose, Quaternion, Vec3};
