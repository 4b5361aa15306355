//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;

/// An axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.scale(0.5);
        Self::new(center.sub(half), center.add(half))
    }

    /// A zero-sized box at `point`.
    pub fn at_point(point: Vec3) -> Self {
        Self { min: point, max: point }
    }

    pub fn center(&self) -> Vec3 {
        self.min.add(self.max).scale(0.5)
    }

    pub fn size(&self) -> Vec3 {
        self.max.sub(self.min)
    }

    /// Grow this box so it also contains `other`.
    pub fn encapsulate(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Union of all boxes, or `None` for an empty iterator.
    pub fn union_all<'a, I>(boxes: I) -> Option<Aabb>
    where
        I: IntoIterator<Item = &'a Aabb>,
    {
        let mut iter = boxes.into_iter();
        let mut acc = *iter.next()?;
        for b in iter {
            acc.encapsulate(b);
        }
        Some(acc)
    }

    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min.add(offset),
            max: self.max.add(offset),
        }
    }
}
