//! Axis-aligned volumes and the categories used for collision filtering
//!
//! Every simulated thing (blocks, obstacles, landing markers, tiles, hazards)
//! occupies an axis-aligned box. Overlap and ray queries over these boxes stand
//! in for trigger volumes and raycasts.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Stable identifier shared by every kind of simulated body
pub type EntityId = u32;

/// Collision category carried by solid bodies.
///
/// Blocks list the categories they collide with; anything else is passed
/// through by move-start probes and mid-flight contact checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    /// Movable puzzle block
    #[default]
    Cube,
    /// Static barrier
    Wall,
    /// Scenery with a collider that never stops blocks
    Decor,
}

/// Colour label used by tile and sensor filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tint {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

/// Filter that passes everything when unset
pub fn tint_matches(filter: Option<Tint>, tint: Option<Tint>) -> bool {
    match filter {
        None => true,
        Some(wanted) => tint == Some(wanted),
    }
}

/// Touching faces of neighbouring grid cells do not count as overlap
pub const CONTACT_SKIN: f32 = 1e-4;

/// An axis-aligned box given by center and half extents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vec3,
    pub half: Vec3,
}

impl Aabb {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self {
            center,
            half: size * 0.5,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half
    }

    /// Strict overlap (shared faces are not an overlap)
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d = (self.center - other.center).abs();
        let reach = self.half + other.half - Vec3::splat(CONTACT_SKIN);
        d.x < reach.x && d.y < reach.y && d.z < reach.z
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        let d = (p - self.center).abs();
        d.x < self.half.x && d.y < self.half.y && d.z < self.half.z
    }

    /// Whether a sphere touches this box
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min(), self.max());
        closest.distance_squared(center) <= radius * radius
    }

    /// Distance along a ray to this box, `None` on a miss.
    ///
    /// A ray starting inside the box never hits it.
    pub fn ray_distance(&self, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<f32> {
        if self.contains_point(origin) {
            return None;
        }
        let min = self.min();
        let max = self.max();
        let mut t_near = 0.0_f32;
        let mut t_far = max_dist;
        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            if d.abs() < 1e-6 {
                if o <= min[axis] || o >= max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (min[axis] - o) * inv;
            let mut t1 = (max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_near = t_near.max(t0);
            t_far = t_far.min(t1);
            if t_near > t_far {
                return None;
            }
        }
        Some(t_near)
    }
}

/// A static solid body (wall, pillar, scenery)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: EntityId,
    pub category: Category,
    pub volume: Aabb,
}

/// A "possible position" landing marker at a grid point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandingMarker {
    pub id: EntityId,
    pub volume: Aabb,
}
