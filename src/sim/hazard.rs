//! Hazards and sensors that clear blocks

use serde::{Deserialize, Serialize};

use super::body::{Aabb, EntityId, Tint, tint_matches};
use crate::consts::{BOMB_DELAY_SECS, BOMB_RADIUS};

/// Spinning blade: destroys any block that enters it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blade {
    pub id: EntityId,
    pub volume: Aabb,
    /// Destroyed blocks count toward the collection goal
    pub counts_toward_goal: bool,
}

/// Volume that collects blocks leaving it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitSensor {
    pub id: EntityId,
    pub volume: Aabb,
    pub filter: Option<Tint>,
    #[serde(skip)]
    pub(crate) inside: Vec<EntityId>,
}

impl ExitSensor {
    pub fn new(id: EntityId, volume: Aabb, filter: Option<Tint>) -> Self {
        Self {
            id,
            volume,
            filter,
            inside: Vec::new(),
        }
    }

    pub fn accepts(&self, tint: Option<Tint>) -> bool {
        tint_matches(self.filter, tint)
    }

    /// Replace the inside set, returning the ids that left
    pub(crate) fn update_inside(&mut self, now_inside: Vec<EntityId>) -> Vec<EntityId> {
        let left = self
            .inside
            .iter()
            .copied()
            .filter(|id| !now_inside.contains(id))
            .collect();
        self.inside = now_inside;
        left
    }
}

/// Makes a block explode when another block touches it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BombConfig {
    pub radius: f32,
    pub delay_secs: f64,
}

impl Default for BombConfig {
    fn default() -> Self {
        Self {
            radius: BOMB_RADIUS,
            delay_secs: BOMB_DELAY_SECS,
        }
    }
}
