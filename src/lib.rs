//! Slide Blocks - a grid-based sliding-block puzzle core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (block motion, collisions, redirects, locks, outcome)
//! - `level`: Data-driven level descriptions
//! - `settings`: Gameplay tuning
//! - `persistence`: Level progress storage

pub mod level;
pub mod persistence;
pub mod settings;
pub mod sim;

pub use level::{LevelDef, LevelError, LevelPack};
pub use settings::Tuning;

use glam::Vec3;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Distance below which a segment counts as arrived
    pub const ARRIVE_EPSILON: f32 = 0.01;

    /// Block motion defaults
    pub const MOVE_DISTANCE: f32 = 1.0;
    pub const MOVE_SPEED: f32 = 1.25;
    pub const MOVE_SPEED_FASTEST: f32 = 2.5;
    pub const REACH_FASTEST_SECS: f32 = 1.0;
    pub const BOUNCE_SPEED: f32 = 1.25;
    pub const BOUNCE_AMOUNT: f32 = 0.1;
    pub const NEXT_BLOCK_PROBE: f32 = 1.0;

    /// How far ahead a starting block looks for a clear exit
    pub const CLEAR_PATH_PROBE: f32 = 10.0;

    /// Headings with a dot product below this are head-on
    pub const OPPOSITE_DOT_THRESHOLD: f32 = -0.9;

    /// Tolerance for float accumulation in the simulation clock (seconds)
    pub const TIME_EPSILON: f64 = 1e-6;

    /// Global lock-counter debounce window (seconds)
    pub const DECREASE_COOLDOWN_SECS: f64 = 0.1;
    /// Delay before judging the level once moves run out (seconds)
    pub const OUT_OF_MOVES_GRACE_SECS: f64 = 0.1;

    /// Redirect tile defaults
    pub const REDIRECT_ALIGN_THRESHOLD: f32 = 0.05;
    pub const REDIRECT_PATH_CHECK: f32 = 1.0;

    /// Bomb defaults
    pub const BOMB_RADIUS: f32 = 2.0;
    pub const BOMB_DELAY_SECS: f64 = 0.1;
}

/// Normalize an angle in degrees to [-180, 180]
#[inline]
pub fn normalize_degrees_signed(mut degrees: f32) -> f32 {
    while degrees > 180.0 {
        degrees -= 360.0;
    }
    while degrees < -180.0 {
        degrees += 360.0;
    }
    degrees
}

/// Normalize an angle in degrees to [0, 360)
#[inline]
pub fn normalize_degrees_positive(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Heading angle of a direction on the horizontal (x, z) plane, in [0, 360)
#[inline]
pub fn planar_angle_degrees(dir: Vec3) -> f32 {
    normalize_degrees_positive(dir.z.atan2(dir.x).to_degrees())
}

/// Move `current` toward `target` by at most `max_delta` without overshooting
#[inline]
pub fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let to_target = target - current;
    let dist = to_target.length();
    if dist <= max_delta || dist == 0.0 {
        target
    } else {
        current + to_target / dist * max_delta
    }
}
