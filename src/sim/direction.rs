//! Movement directions
//!
//! A block's configured direction is relative to its own orientation and is
//! resolved to a world vector on demand, so rotations always take effect.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Direction a block moves in, relative to its orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoveDirection {
    #[default]
    Forward,
    Back,
    Up,
    Down,
    Right,
    Left,
}

impl MoveDirection {
    /// Local-space unit vector (forward = +Z, up = +Y, right = +X)
    pub fn local_vector(self) -> Vec3 {
        match self {
            MoveDirection::Forward => Vec3::Z,
            MoveDirection::Back => Vec3::NEG_Z,
            MoveDirection::Up => Vec3::Y,
            MoveDirection::Down => Vec3::NEG_Y,
            MoveDirection::Right => Vec3::X,
            MoveDirection::Left => Vec3::NEG_X,
        }
    }

    /// World-space unit vector under the given orientation
    pub fn resolve(self, orientation: Quat) -> Vec3 {
        (orientation * self.local_vector()).normalize_or_zero()
    }
}

/// Exit direction of a redirect tile, on the horizontal plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExitDirection {
    #[default]
    Left,
    Right,
    Up,
    Down,
}

impl ExitDirection {
    /// Heading angle in degrees, measured from +X toward +Z
    pub fn angle_degrees(self) -> f32 {
        match self {
            ExitDirection::Left => 180.0,
            ExitDirection::Right => 0.0,
            ExitDirection::Up => 90.0,
            ExitDirection::Down => 270.0,
        }
    }

    /// World-space unit vector (Up = +Z, Down = -Z)
    pub fn world_vector(self) -> Vec3 {
        match self {
            ExitDirection::Left => Vec3::NEG_X,
            ExitDirection::Right => Vec3::X,
            ExitDirection::Up => Vec3::Z,
            ExitDirection::Down => Vec3::NEG_Z,
        }
    }

    /// Up/Down are the vertical axis class on the tile plane
    pub fn is_vertical(self) -> bool {
        matches!(self, ExitDirection::Up | ExitDirection::Down)
    }
}
