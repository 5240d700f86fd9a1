//! Gameplay tuning
//!
//! Loaded from a JSON file next to the level pack. Every field has a default,
//! so partial files are fine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Per-block motion parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionTuning {
    /// Length of one forward segment
    pub move_distance: f32,
    /// Speed at the start of a forward segment (also the grid-settle speed)
    pub move_speed: f32,
    /// Cruise speed reached after `reach_fastest_secs`
    pub move_speed_fastest: f32,
    pub reach_fastest_secs: f32,
    pub bounce_speed: f32,
    /// Recoil distance; backing off after a hit uses twice this
    pub bounce_amount: f32,
    /// How far a bouncing block looks for the next block to shove
    pub next_block_probe: f32,
}

impl Default for MotionTuning {
    fn default() -> Self {
        Self {
            move_distance: MOVE_DISTANCE,
            move_speed: MOVE_SPEED,
            move_speed_fastest: MOVE_SPEED_FASTEST,
            reach_fastest_secs: REACH_FASTEST_SECS,
            bounce_speed: BOUNCE_SPEED,
            bounce_amount: BOUNCE_AMOUNT,
            next_block_probe: NEXT_BLOCK_PROBE,
        }
    }
}

impl MotionTuning {
    /// Forward speed after `elapsed` seconds of a segment
    pub fn forward_speed(&self, elapsed: f32) -> f32 {
        let t = if self.reach_fastest_secs > 0.0 {
            (elapsed / self.reach_fastest_secs).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.move_speed + (self.move_speed_fastest - self.move_speed) * t
    }

    /// Seconds a bounce takes to reach its recoil point
    pub fn bounce_travel_secs(&self) -> f64 {
        if self.bounce_speed <= 0.0 {
            return 0.0;
        }
        (self.bounce_amount / self.bounce_speed) as f64
    }
}

/// Level-wide tuning values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub decrease_cooldown_secs: f64,
    pub out_of_moves_grace_secs: f64,
    pub arrive_epsilon: f32,
    pub opposite_dot_threshold: f32,
    pub clear_path_probe: f32,
    /// Defaults for blocks that don't override them
    pub block: MotionTuning,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            decrease_cooldown_secs: DECREASE_COOLDOWN_SECS,
            out_of_moves_grace_secs: OUT_OF_MOVES_GRACE_SECS,
            arrive_epsilon: ARRIVE_EPSILON,
            opposite_dot_threshold: OPPOSITE_DOT_THRESHOLD,
            clear_path_probe: CLEAR_PATH_PROBE,
            block: MotionTuning::default(),
        }
    }
}

impl Tuning {
    /// Parse tuning from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load tuning from a file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(tuning) => {
                    log::info!("Loaded tuning from {}", path.display());
                    tuning
                }
                Err(e) => {
                    log::warn!("Bad tuning file {}: {e}; using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Using default tuning");
                Self::default()
            }
        }
    }

    /// Save tuning as pretty JSON
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        log::info!("Tuning saved to {}", path.display());
        Ok(())
    }
}
