//! Data-driven level descriptions
//!
//! A level pack is a JSON document holding shared tuning and an ordered list
//! of levels. Each level lists its grid, blocks and static geometry; building
//! it produces a ready-to-tick [`Level`].

use std::path::{Path, PathBuf};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::{MotionTuning, Tuning};
use crate::sim::{BlockConfig, Category, EntityId, GridIndex, GridLayout, Level, TileConfig, Tint};

/// Errors raised while loading or validating level data
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed level data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("level {index} out of range (pack has {count})")]
    OutOfRange { index: usize, count: usize },
    #[error("level '{level}': {reason}")]
    Invalid { level: String, reason: String },
}

fn unit_size() -> Vec3 {
    Vec3::ONE
}

fn yes() -> bool {
    true
}

fn wall() -> Category {
    Category::Wall
}

/// Legal grid points, either a regular lattice or an explicit list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSpec {
    Layout(GridLayout),
    Points(Vec<Vec3>),
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec::Points(Vec::new())
    }
}

impl GridSpec {
    pub fn points(&self) -> Vec<Vec3> {
        match self {
            GridSpec::Layout(layout) => layout.points(),
            GridSpec::Points(points) => points.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockDef {
    pub remaining: u32,
    #[serde(default)]
    pub bomb_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDef {
    pub position: Vec3,
    /// Rotation about the vertical axis
    #[serde(default)]
    pub yaw_degrees: f32,
    #[serde(default)]
    pub lock: Option<LockDef>,
    /// Overrides the pack's default motion tuning
    #[serde(default)]
    pub motion: Option<MotionTuning>,
    #[serde(flatten)]
    pub config: BlockConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleDef {
    pub center: Vec3,
    #[serde(default = "unit_size")]
    pub size: Vec3,
    #[serde(default = "wall")]
    pub category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileDef {
    pub center: Vec3,
    #[serde(flatten)]
    pub config: TileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BladeDef {
    pub center: Vec3,
    #[serde(default = "unit_size")]
    pub size: Vec3,
    #[serde(default = "yes")]
    pub counts_toward_goal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitDef {
    pub center: Vec3,
    pub size: Vec3,
    #[serde(default)]
    pub filter: Option<Tint>,
}

/// One level of a pack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelDef {
    pub name: String,
    pub seed: u64,
    /// Move budget; unlimited when absent
    pub moves: Option<u32>,
    pub warn_at: u32,
    /// Collection goal; defaults to the number of movable blocks
    pub needed: Option<u32>,
    pub grid: GridSpec,
    /// Size of the landing markers placed on every grid point
    pub marker_size: Option<Vec3>,
    pub blocks: Vec<BlockDef>,
    pub obstacles: Vec<ObstacleDef>,
    pub tiles: Vec<TileDef>,
    pub blades: Vec<BladeDef>,
    pub exits: Vec<ExitDef>,
}

fn positive(size: Vec3) -> bool {
    size.is_finite() && size.cmpgt(Vec3::ZERO).all()
}

impl LevelDef {
    pub fn collection_goal(&self) -> u32 {
        self.needed.unwrap_or_else(|| {
            self.blocks.iter().filter(|b| b.config.can_move).count() as u32
        })
    }

    /// Structural checks that would otherwise leave the level unplayable
    pub fn validate(&self) -> Result<(), LevelError> {
        let invalid = |reason: String| LevelError::Invalid {
            level: self.name.clone(),
            reason,
        };
        if self.blocks.is_empty() {
            return Err(invalid("no blocks".into()));
        }
        for (i, block) in self.blocks.iter().enumerate() {
            if !block.position.is_finite() {
                return Err(invalid(format!("block {i} has a non-finite position")));
            }
            if !positive(block.config.size) {
                return Err(invalid(format!("block {i} has a non-positive size")));
            }
            if block.config.bomb.is_some_and(|b| b.radius <= 0.0) {
                return Err(invalid(format!("block {i} has a bomb without radius")));
            }
        }
        let mut volumes = self
            .obstacles
            .iter()
            .map(|o| o.size)
            .chain(self.blades.iter().map(|b| b.size))
            .chain(self.exits.iter().map(|e| e.size))
            .chain(self.tiles.iter().map(|t| t.config.size));
        if volumes.any(|size| !positive(size)) {
            return Err(invalid("a static volume has a non-positive size".into()));
        }
        if let Some(moves) = self.moves {
            if self.warn_at > moves {
                log::warn!(
                    "Level '{}': warn_at {} exceeds the {moves} available moves",
                    self.name,
                    self.warn_at
                );
            }
        }
        Ok(())
    }

    /// Instantiate the level. Blocks get ids `1..=n` in file order.
    pub fn build(&self, tuning: &Tuning) -> Level {
        let grid = GridIndex::new(self.grid.points());
        if grid.is_empty() {
            log::warn!("Level '{}' has no grid points", self.name);
        }
        let mut level = Level::new(grid, tuning.clone(), self.seed);

        for def in &self.blocks {
            let mut config = def.config.clone();
            config.motion = def.motion.clone().unwrap_or_else(|| tuning.block.clone());
            let orientation = Quat::from_rotation_y(def.yaw_degrees.to_radians());
            let id = level.add_block(config, def.position, orientation);
            if let Some(lock) = &def.lock {
                level.set_lock(id, lock.remaining, lock.bomb_only);
            }
        }
        for obstacle in &self.obstacles {
            level.add_obstacle(obstacle.category, obstacle.center, obstacle.size);
        }
        for tile in &self.tiles {
            level.add_redirect_tile(tile.center, tile.config.clone());
        }
        for blade in &self.blades {
            level.add_blade(blade.center, blade.size, blade.counts_toward_goal);
        }
        for exit in &self.exits {
            level.add_exit_sensor(exit.center, exit.size, exit.filter);
        }
        if let Some(size) = self.marker_size {
            level.add_markers_at_grid_points(size);
        }

        if let Some(moves) = self.moves {
            level.set_moves(moves, self.warn_at);
        }
        level.set_collection_goal(self.collection_goal());

        log::info!(
            "Built level '{}': {} blocks, goal {}, moves {:?}",
            self.name,
            self.blocks.len(),
            self.collection_goal(),
            self.moves
        );
        level
    }
}

/// Per-level queries the simulation asks of its host
pub trait LevelCatalog {
    fn level_count(&self) -> usize;
    fn collection_goal(&self, index: usize) -> Option<u32>;
    fn grid_points(&self, index: usize) -> Option<Vec<Vec3>>;
}

/// An ordered set of levels sharing one tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelPack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tuning: Tuning,
    pub levels: Vec<LevelDef>,
}

impl LevelPack {
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let pack: LevelPack = serde_json::from_str(json)?;
        if pack.levels.is_empty() {
            return Err(LevelError::Invalid {
                level: pack.name,
                reason: "pack contains no levels".into(),
            });
        }
        for level in &pack.levels {
            level.validate()?;
        }
        Ok(pack)
    }

    pub fn load(path: &Path) -> Result<Self, LevelError> {
        let json = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let pack = Self::from_json(&json)?;
        log::info!(
            "Loaded pack '{}' ({} levels) from {}",
            pack.name,
            pack.levels.len(),
            path.display()
        );
        Ok(pack)
    }

    pub fn level(&self, index: usize) -> Result<&LevelDef, LevelError> {
        self.levels.get(index).ok_or(LevelError::OutOfRange {
            index,
            count: self.levels.len(),
        })
    }

    pub fn build(&self, index: usize) -> Result<Level, LevelError> {
        Ok(self.level(index)?.build(&self.tuning))
    }

    /// Block ids of a built level, in file order
    pub fn block_ids(&self, index: usize) -> Result<Vec<EntityId>, LevelError> {
        let count = self.level(index)?.blocks.len() as EntityId;
        Ok((1..=count).collect())
    }
}

impl LevelCatalog for LevelPack {
    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn collection_goal(&self, index: usize) -> Option<u32> {
        self.levels.get(index).map(LevelDef::collection_goal)
    }

    fn grid_points(&self, index: usize) -> Option<Vec<Vec3>> {
        self.levels.get(index).map(|l| l.grid.points())
    }
}
