//! Grid index: nearest legal grid point lookup
//!
//! Every committed segment ends with a snap onto one of these points, so
//! floating error never accumulates across repeated moves.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Regular lattice description used to generate grid points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridLayout {
    pub origin: Vec3,
    pub cell_size: f32,
    pub columns: u32,
    pub rows: u32,
    #[serde(default = "one")]
    pub layers: u32,
}

fn one() -> u32 {
    1
}

impl GridLayout {
    /// Points laid out along +X (columns), +Z (rows) and +Y (layers)
    pub fn points(&self) -> Vec<Vec3> {
        let mut points =
            Vec::with_capacity((self.columns * self.rows * self.layers.max(1)) as usize);
        for layer in 0..self.layers.max(1) {
            for row in 0..self.rows {
                for col in 0..self.columns {
                    points.push(
                        self.origin
                            + Vec3::new(col as f32, layer as f32, row as f32) * self.cell_size,
                    );
                }
            }
        }
        points
    }
}

/// Precomputed set of legal grid coordinates
#[derive(Debug, Clone, Default)]
pub struct GridIndex {
    points: Vec<Vec3>,
}

impl GridIndex {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points }
    }

    pub fn from_layout(layout: &GridLayout) -> Self {
        Self::new(layout.points())
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Nearest legal point to `pos`.
    ///
    /// Ties resolve to the earliest point in the index. With no points
    /// configured the position is returned unchanged.
    pub fn snap(&self, pos: Vec3) -> Vec3 {
        let mut best: Option<(Vec3, f32)> = None;
        for &p in &self.points {
            let d = p.distance_squared(pos);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((p, d)),
            }
        }
        match best {
            Some((p, _)) => p,
            None => {
                log::warn!("Grid index has no points; leaving {pos} unsnapped");
                pos
            }
        }
    }
}
