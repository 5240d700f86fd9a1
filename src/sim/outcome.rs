//! Move budget, collection goal, and win/loss arbitration

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::body::EntityId;

/// Final result of a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Won,
    Lost(LossReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossReason {
    /// Moves ran out before the goal was met
    OutOfMoves,
    /// Movable blocks remain but every one of them is locked
    AllBlocksLocked,
    /// Two head-on blocks met where that is forbidden
    OppositeCollision,
}

/// Result of spending one move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSpend {
    pub remaining: u32,
    pub reached_zero: bool,
    /// Crossed the low-moves warning threshold on this spend
    pub warn: bool,
}

/// Remaining moves for the level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovesBudget {
    remaining: u32,
    /// Emit a warning once `remaining` drops to this value
    pub warn_at: u32,
}

impl MovesBudget {
    pub fn new(moves: u32, warn_at: u32) -> Self {
        Self {
            remaining: moves,
            warn_at,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Spend exactly one move; never goes below zero
    pub fn spend_one(&mut self) -> MoveSpend {
        let before = self.remaining;
        self.remaining = self.remaining.saturating_sub(1);
        MoveSpend {
            remaining: self.remaining,
            reached_zero: self.remaining == 0,
            warn: before > self.warn_at && self.remaining <= self.warn_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collect {
    /// This entity was already counted
    Duplicate,
    Counted { collected: u32 },
    /// This one met the goal
    Completed { collected: u32 },
}

/// Progress toward the level's collection goal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionCounter {
    pub needed: u32,
    collected: u32,
    counted: BTreeSet<EntityId>,
}

impl CollectionCounter {
    pub fn new(needed: u32) -> Self {
        Self {
            needed,
            collected: 0,
            counted: BTreeSet::new(),
        }
    }

    pub fn collected(&self) -> u32 {
        self.collected
    }

    pub fn is_goal_met(&self) -> bool {
        self.collected >= self.needed
    }

    /// Count `id` toward the goal, at most once per entity
    pub fn collect(&mut self, id: EntityId) -> Collect {
        if !self.counted.insert(id) {
            return Collect::Duplicate;
        }
        let was_met = self.is_goal_met();
        self.collected += 1;
        if !was_met && self.is_goal_met() {
            Collect::Completed {
                collected: self.collected,
            }
        } else {
            Collect::Counted {
                collected: self.collected,
            }
        }
    }
}

/// Live scan of movable blocks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCensus {
    /// Active, not cleared, allowed to move
    pub movable: u32,
    /// Of those, how many are not locked
    pub unlocked: u32,
}

impl BlockCensus {
    pub fn all_movable_locked(&self) -> bool {
        self.movable > 0 && self.unlocked == 0
    }
}

/// Decision once moves have run out and the grace delay has passed
pub fn decide_out_of_moves(collection: &CollectionCounter, census: BlockCensus) -> Outcome {
    if collection.is_goal_met() {
        return Outcome::Won;
    }
    if census.all_movable_locked() {
        return Outcome::Lost(LossReason::AllBlocksLocked);
    }
    Outcome::Lost(LossReason::OutOfMoves)
}

/// Immediate loss when every remaining movable block is locked.
/// A met goal suppresses the check.
pub fn blocked_blocks_loss(collection: &CollectionCounter, census: BlockCensus) -> Option<Outcome> {
    if collection.is_goal_met() {
        return None;
    }
    census
        .all_movable_locked()
        .then_some(Outcome::Lost(LossReason::AllBlocksLocked))
}

/// Latches the first outcome reported for a level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WinLossEvaluator {
    outcome: Option<Outcome>,
}

impl WinLossEvaluator {
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    /// Record `outcome` unless one is already latched; returns whether it was recorded
    pub fn resolve(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }
}
