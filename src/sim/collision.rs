//! Collision queries for moving blocks
//!
//! Ray probes ahead of a block decide whether a move clears the board, which
//! block a bounce shoves next, and whether a redirect tile's exit is open.
//! Landing markers are validated here before a block remembers them.

use glam::Vec3;

use super::block::BlockEntity;
use super::body::{Aabb, Category, EntityId, LandingMarker, Obstacle};

/// First solid body hit by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub id: EntityId,
    pub category: Category,
    pub distance: f32,
    /// The hit body is a block (not a static obstacle)
    pub is_block: bool,
}

/// What lies ahead of a block that is about to move
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    /// Nothing that stops this block
    ClearBoard,
    Obstacle(RayHit),
    Block(RayHit),
}

/// Read-only view of the solid bodies in a level
#[derive(Debug, Clone, Copy)]
pub struct Solids<'a> {
    pub blocks: &'a [BlockEntity],
    pub obstacles: &'a [Obstacle],
}

impl<'a> Solids<'a> {
    /// Nearest solid hit along `dir`, ignoring `exclude` and cleared blocks
    pub fn raycast(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_dist: f32,
        exclude: EntityId,
        include: impl Fn(Category) -> bool,
    ) -> Option<RayHit> {
        let dir = dir.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }
        let blocks = self
            .blocks
            .iter()
            .filter(|b| b.id != exclude && !b.is_cleared())
            .map(|b| (b.id, b.config.category, b.volume(), true));
        let obstacles = self
            .obstacles
            .iter()
            .filter(|o| o.id != exclude)
            .map(|o| (o.id, o.category, o.volume, false));

        let mut best: Option<RayHit> = None;
        for (id, category, volume, is_block) in blocks.chain(obstacles) {
            if !include(category) {
                continue;
            }
            let Some(distance) = volume.ray_distance(origin, dir, max_dist) else {
                continue;
            };
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(RayHit {
                    id,
                    category,
                    distance,
                    is_block,
                });
            }
        }
        best
    }

    /// Probe ahead of a block that is starting to move
    pub fn probe_ahead(&self, block: &BlockEntity, heading: Vec3, distance: f32) -> ProbeOutcome {
        match self.raycast(block.position, heading, distance, block.id, |_| true) {
            None => ProbeOutcome::ClearBoard,
            Some(hit) if !block.collides_with(hit.category) => ProbeOutcome::ClearBoard,
            Some(hit) if hit.is_block => ProbeOutcome::Block(hit),
            Some(hit) => ProbeOutcome::Obstacle(hit),
        }
    }

    /// The next block a bounce along `direction` should shove, if any
    pub fn bounce_chain_target(&self, block: &BlockEntity, direction: Vec3) -> Option<EntityId> {
        let probe = block.config.motion.next_block_probe;
        self.raycast(block.position, direction, probe, block.id, |_| true)
            .filter(|hit| hit.is_block && block.collides_with(hit.category))
            .map(|hit| hit.id)
    }

    /// Whether a true obstacle sits within `distance` along `dir`.
    ///
    /// Markers and tiles are not solids, and decor never blocks.
    pub fn path_blocked(&self, block: &BlockEntity, dir: Vec3, distance: f32) -> bool {
        self.raycast(block.position, dir, distance, block.id, |c| {
            c != Category::Decor
        })
        .is_some()
    }

    /// A landing marker is usable unless a non-moving block other than
    /// `mover` sits on it.
    pub fn landing_spot_usable(&self, marker: &LandingMarker, mover: &BlockEntity) -> bool {
        // Probe box is half the mover's size, centred on the marker
        let probe = Aabb::new(marker.volume.center, mover.config.size * 0.5);
        !self.blocks.iter().any(|b| {
            b.id != mover.id && !b.is_cleared() && !b.is_moving() && b.volume().overlaps(&probe)
        })
    }
}

/// Two headings are head-on when their dot product is below `threshold`
pub fn are_opposite(a: Vec3, b: Vec3, threshold: f32) -> bool {
    a.normalize_or_zero().dot(b.normalize_or_zero()) < threshold
}
