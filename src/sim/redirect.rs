//! Redirect tiles: turn a block passing over them toward a fixed exit
//!
//! The tile only keeps per-visit bookkeeping; the level drives the
//! enter/stay/exit protocol and applies the resulting rotation.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::body::{Aabb, EntityId, Tint, tint_matches};
use super::direction::ExitDirection;
use crate::consts::{REDIRECT_ALIGN_THRESHOLD, REDIRECT_PATH_CHECK};
use crate::{normalize_degrees_signed, planar_angle_degrees};

/// Authoring parameters of a redirect tile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Only blocks with this tint are redirected
    pub filter: Option<Tint>,
    /// Local axis the block is rotated about
    pub axis: Vec3,
    pub exit: ExitDirection,
    /// After the first redirect the tile stops working for everyone
    pub single_use: bool,
    /// Horizontal distance from the tile center that counts as aligned
    pub align_threshold: f32,
    /// How far ahead the exit is checked for obstacles
    pub path_check_distance: f32,
    pub size: Vec3,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            filter: None,
            axis: Vec3::Y,
            exit: ExitDirection::Left,
            single_use: false,
            align_threshold: REDIRECT_ALIGN_THRESHOLD,
            path_check_distance: REDIRECT_PATH_CHECK,
            size: Vec3::ONE,
        }
    }
}

/// A redirect tile and its per-block bookkeeping
#[derive(Debug, Clone)]
pub struct RedirectTile {
    pub id: EntityId,
    pub center: Vec3,
    pub config: TileConfig,
    entry_directions: BTreeMap<EntityId, Vec3>,
    redirected: BTreeSet<EntityId>,
    consumed: bool,
    /// Blocks overlapping at the end of the previous tick
    pub(crate) overlapping: Vec<EntityId>,
}

impl RedirectTile {
    pub fn new(id: EntityId, center: Vec3, config: TileConfig) -> Self {
        Self {
            id,
            center,
            config,
            entry_directions: BTreeMap::new(),
            redirected: BTreeSet::new(),
            consumed: false,
            overlapping: Vec::new(),
        }
    }

    pub fn volume(&self) -> Aabb {
        Aabb::new(self.center, self.config.size)
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    pub fn accepts(&self, tint: Option<Tint>) -> bool {
        tint_matches(self.config.filter, tint)
    }

    pub fn entry_direction(&self, block: EntityId) -> Option<Vec3> {
        self.entry_directions.get(&block).copied()
    }

    pub fn record_entry(&mut self, block: EntityId, heading: Vec3) {
        self.entry_directions.insert(block, heading);
    }

    pub fn was_redirected(&self, block: EntityId) -> bool {
        self.redirected.contains(&block)
    }

    pub fn mark_redirected(&mut self, block: EntityId) {
        self.redirected.insert(block);
        if self.config.single_use {
            self.consumed = true;
        }
    }

    /// Forget a block that left the tile (its movement is left alone)
    pub fn forget(&mut self, block: EntityId) {
        self.redirected.remove(&block);
        self.entry_directions.remove(&block);
    }

    /// Block center is over the tile center on the horizontal plane
    pub fn is_aligned(&self, block_center: Vec3) -> bool {
        let mut diff = block_center - self.center;
        diff.y = 0.0;
        diff.length() <= self.config.align_threshold
    }

    pub fn required_rotation(&self, entry: Vec3) -> f32 {
        required_rotation(entry, self.config.exit)
    }
}

/// Signed rotation (degrees) that turns `entry` onto `exit`.
///
/// Crossing axis classes (horizontal entry to vertical exit or back) negates
/// the raw delta; same-class turns use it unchanged.
pub fn required_rotation(entry: Vec3, exit: ExitDirection) -> f32 {
    let entry = entry.normalize_or_zero();
    let entry_angle = planar_angle_degrees(entry);
    let mut delta = normalize_degrees_signed(exit.angle_degrees() - entry_angle);

    let entry_vertical = entry.z.abs() > entry.x.abs();
    if entry_vertical != exit.is_vertical() {
        delta = -delta;
    }
    delta
}
