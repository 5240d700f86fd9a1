//! Level state and the operations external collaborators call
//!
//! A `Level` owns every entity of one puzzle plus the level-wide shared
//! state: the debounce gate, the move budget, the collection counter, the
//! outcome latch and the continuation queue. Blocks are kept sorted by id so
//! every scan is deterministic.

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::block::{BlockConfig, BlockEntity, MovementState};
use super::body::{Aabb, Category, EntityId, LandingMarker, Obstacle, Tint};
use super::collision::{ProbeOutcome, Solids, are_opposite};
use super::grid::GridIndex;
use super::hazard::{Blade, ExitSensor};
use super::lock::{CounterChange, DebounceGate, DecreaseSource, LockCounter};
use super::outcome::{
    BlockCensus, Collect, CollectionCounter, LossReason, MovesBudget, Outcome, WinLossEvaluator,
    blocked_blocks_loss, decide_out_of_moves,
};
use super::redirect::{RedirectTile, TileConfig};
use super::schedule::{Continuation, Scheduler};
use crate::settings::Tuning;

/// Rotation choices for blocks reacting to another block's move
const OTHER_MOVE_ROTATIONS: [f32; 3] = [90.0, -90.0, 180.0];

/// Signals emitted for collaborators (audio, UI, effects)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    MoveStarted { block: EntityId },
    MovesChanged { remaining: u32 },
    LowMoves { remaining: u32 },
    /// Block reached a scoring condition
    Clearable { block: EntityId },
    Collected {
        block: EntityId,
        collected: u32,
        needed: u32,
    },
    CollectedAll,
    HitObstacle { block: EntityId, other: EntityId },
    Bounced { block: EntityId },
    Redirected { block: EntityId, degrees: f32 },
    Settled { block: EntityId, position: Vec3 },
    /// A cleared block finished sliding off the board
    LeftBoard { block: EntityId },
    CounterChanged { block: EntityId, remaining: u32 },
    Unlocked { block: EntityId },
    BlockDestroyed {
        block: EntityId,
        source: DecreaseSource,
    },
    BlockExited { block: EntityId },
    BombPrimed { bomb: EntityId },
    BombExploded { bomb: EntityId },
    RotatedByOtherMove { block: EntityId, degrees: f32 },
    Won,
    Lost { reason: LossReason },
}

/// One puzzle level
#[derive(Debug, Clone)]
pub struct Level {
    pub tuning: Tuning,
    pub grid: GridIndex,
    /// Active blocks (sorted by id for determinism)
    pub(crate) blocks: Vec<BlockEntity>,
    pub(crate) obstacles: Vec<Obstacle>,
    pub(crate) markers: Vec<LandingMarker>,
    pub(crate) tiles: Vec<RedirectTile>,
    pub(crate) blades: Vec<Blade>,
    pub(crate) exits: Vec<ExitSensor>,
    pub(crate) gate: DebounceGate,
    /// `None` means unlimited moves
    pub(crate) budget: Option<MovesBudget>,
    pub(crate) collection: CollectionCounter,
    pub(crate) evaluator: WinLossEvaluator,
    pub(crate) scheduler: Scheduler,
    /// Blocks that react when another block starts a move
    move_observers: Vec<EntityId>,
    rng: Pcg32,
    pub(crate) events: Vec<SimEvent>,
    /// Simulated seconds since the level started
    pub(crate) time: f64,
    pub time_ticks: u64,
    next_id: EntityId,
}

impl Level {
    pub fn new(grid: GridIndex, tuning: Tuning, seed: u64) -> Self {
        if grid.is_empty() {
            log::warn!("Level created without grid points; positions will not snap");
        }
        let gate = DebounceGate::new(tuning.decrease_cooldown_secs);
        Self {
            tuning,
            grid,
            blocks: Vec::new(),
            obstacles: Vec::new(),
            markers: Vec::new(),
            tiles: Vec::new(),
            blades: Vec::new(),
            exits: Vec::new(),
            gate,
            budget: None,
            collection: CollectionCounter::new(0),
            evaluator: WinLossEvaluator::default(),
            scheduler: Scheduler::default(),
            move_observers: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
            events: Vec::new(),
            time: 0.0,
            time_ticks: 0,
            next_id: 1,
        }
    }

    /// Allocate a new entity ID (shared by every kind of body)
    fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- Construction ---

    /// Add a block, snapped onto the grid
    pub fn add_block(
        &mut self,
        config: BlockConfig,
        position: Vec3,
        orientation: Quat,
    ) -> EntityId {
        let id = self.next_entity_id();
        if config.rotate_on_other_move {
            self.move_observers.push(id);
        }
        let position = self.grid.snap(position);
        self.blocks
            .push(BlockEntity::new(id, position, orientation.normalize(), config));
        id
    }

    pub fn add_obstacle(&mut self, category: Category, center: Vec3, size: Vec3) -> EntityId {
        let id = self.next_entity_id();
        self.obstacles.push(Obstacle {
            id,
            category,
            volume: Aabb::new(center, size),
        });
        id
    }

    pub fn add_marker(&mut self, center: Vec3, size: Vec3) -> EntityId {
        let id = self.next_entity_id();
        self.markers.push(LandingMarker {
            id,
            volume: Aabb::new(center, size),
        });
        id
    }

    /// One landing marker on every grid point
    pub fn add_markers_at_grid_points(&mut self, size: Vec3) {
        let points = self.grid.points().to_vec();
        for point in points {
            self.add_marker(point, size);
        }
    }

    pub fn add_redirect_tile(&mut self, center: Vec3, config: TileConfig) -> EntityId {
        let id = self.next_entity_id();
        self.tiles.push(RedirectTile::new(id, center, config));
        id
    }

    pub fn add_blade(&mut self, center: Vec3, size: Vec3, counts_toward_goal: bool) -> EntityId {
        let id = self.next_entity_id();
        self.blades.push(Blade {
            id,
            volume: Aabb::new(center, size),
            counts_toward_goal,
        });
        id
    }

    pub fn add_exit_sensor(&mut self, center: Vec3, size: Vec3, filter: Option<Tint>) -> EntityId {
        let id = self.next_entity_id();
        self.exits
            .push(ExitSensor::new(id, Aabb::new(center, size), filter));
        id
    }

    pub fn set_moves(&mut self, moves: u32, warn_at: u32) {
        self.budget = Some(MovesBudget::new(moves, warn_at));
    }

    pub fn set_collection_goal(&mut self, needed: u32) {
        self.collection = CollectionCounter::new(needed);
    }

    /// Attach a lock at build time (no loss re-check)
    pub fn set_lock(&mut self, id: EntityId, remaining_to_clear: u32, bomb_only: bool) -> bool {
        let Some(idx) = self.index_of(id) else {
            log::warn!("set_lock: unknown block {id}");
            return false;
        };
        self.blocks[idx].lock = Some(LockCounter::new(remaining_to_clear, bomb_only));
        true
    }

    // --- Queries ---

    pub(crate) fn index_of(&self, id: EntityId) -> Option<usize> {
        self.blocks.binary_search_by_key(&id, |b| b.id).ok()
    }

    pub fn block(&self, id: EntityId) -> Option<&BlockEntity> {
        self.index_of(id).map(|idx| &self.blocks[idx])
    }

    pub fn blocks(&self) -> &[BlockEntity] {
        &self.blocks
    }

    pub fn tile(&self, id: EntityId) -> Option<&RedirectTile> {
        self.tiles.iter().find(|t| t.id == id)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.evaluator.outcome()
    }

    pub fn is_resolved(&self) -> bool {
        self.evaluator.is_resolved()
    }

    pub fn moves_remaining(&self) -> Option<u32> {
        self.budget.as_ref().map(MovesBudget::remaining)
    }

    pub fn collected(&self) -> u32 {
        self.collection.collected()
    }

    pub fn collection_needed(&self) -> u32 {
        self.collection.needed
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Continuations still waiting to fire
    pub fn pending_continuations(&self) -> usize {
        self.scheduler.len()
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn solids(&self) -> Solids<'_> {
        Solids {
            blocks: &self.blocks,
            obstacles: &self.obstacles,
        }
    }

    /// Movable, not-yet-cleared blocks and how many are unlocked
    pub fn census(&self) -> BlockCensus {
        let mut census = BlockCensus::default();
        for block in self
            .blocks
            .iter()
            .filter(|b| b.config.can_move && !b.is_cleared())
        {
            census.movable += 1;
            if !block.is_locked() {
                census.unlocked += 1;
            }
        }
        census
    }

    // --- Movement ---

    /// External activation (player input or another trigger)
    pub fn activate(&mut self, id: EntityId) -> bool {
        if self.budget.as_ref().is_some_and(MovesBudget::is_exhausted) {
            log::debug!("Activation of {id} rejected: no moves left");
            return false;
        }
        self.start_move(id, true)
    }

    /// Non-interactive move start; returns whether a move actually began
    pub fn try_start_move(&mut self, id: EntityId) -> bool {
        self.start_move(id, false)
    }

    fn start_move(&mut self, id: EntityId, probe_clear: bool) -> bool {
        if self.evaluator.is_resolved() {
            return false;
        }
        let Some(idx) = self.index_of(id) else {
            log::warn!("Move requested for unknown block {id}");
            return false;
        };
        if !self.blocks[idx].can_start_move() {
            log::debug!("Block {id} cannot start a move");
            return false;
        }

        self.spend_move();

        if probe_clear {
            let block = &self.blocks[idx];
            let probe = self.solids().probe_ahead(
                block,
                block.current_heading(),
                self.tuning.clear_path_probe,
            );
            if probe == ProbeOutcome::ClearBoard {
                log::debug!("Block {id} has a clear path off the board");
                self.events.push(SimEvent::Clearable { block: id });
                self.collect(id);
                self.blocks[idx].mark_cleared();
            }
        }

        self.request_lock_decrease(DecreaseSource::Move);
        self.notify_move_started(id);

        let block = &mut self.blocks[idx];
        block.begin_forward();
        log::debug!(
            "Block {id} moving along {} from {}",
            block.segment_heading(),
            block.position
        );
        self.events.push(SimEvent::MoveStarted { block: id });
        true
    }

    fn spend_move(&mut self) {
        let Some(budget) = self.budget.as_mut() else {
            return;
        };
        if budget.is_exhausted() {
            return;
        }
        let spend = budget.spend_one();
        self.events.push(SimEvent::MovesChanged {
            remaining: spend.remaining,
        });
        if spend.warn {
            self.events.push(SimEvent::LowMoves {
                remaining: spend.remaining,
            });
        }
        if spend.reached_zero {
            log::info!("Out of moves; judging the level after the grace delay");
            let due = self.time + self.tuning.out_of_moves_grace_secs;
            self.scheduler
                .schedule(due, None, Continuation::EvaluateOutOfMoves);
        }
    }

    fn notify_move_started(&mut self, mover: EntityId) {
        for i in 0..self.move_observers.len() {
            let observer = self.move_observers[i];
            if observer == mover {
                continue;
            }
            let Some(idx) = self.index_of(observer) else {
                continue;
            };
            if self.blocks[idx].is_cleared() {
                continue;
            }
            let choice = self.rng.random_range(0..OTHER_MOVE_ROTATIONS.len());
            let degrees = OTHER_MOVE_ROTATIONS[choice];
            self.blocks[idx].rotate_local(Vec3::Y, degrees);
            self.events.push(SimEvent::RotatedByOtherMove {
                block: observer,
                degrees,
            });
        }
    }

    /// Short recoil-and-return along `direction`; shoves the next block in
    /// line once this one reaches its recoil point.
    pub fn bounce(&mut self, id: EntityId, direction: Vec3) -> bool {
        let Some(idx) = self.index_of(id) else {
            log::warn!("Bounce requested for unknown block {id}");
            return false;
        };
        let direction = direction.normalize_or_zero();
        let block = &self.blocks[idx];
        if block.is_busy() || block.is_cleared() || direction == Vec3::ZERO {
            return false;
        }

        if let Some(next) = self.solids().bounce_chain_target(block, direction) {
            let next_idle = self.block(next).is_some_and(|b| !b.is_moving());
            if next_idle {
                let due = self.time + block.config.motion.bounce_travel_secs();
                log::debug!("Block {id} shoves {next} at t={due:.3}");
                self.scheduler.schedule(
                    due,
                    Some(next),
                    Continuation::Bounce {
                        block: next,
                        direction,
                    },
                );
            }
        }

        self.blocks[idx].begin_bounce(direction);
        self.events.push(SimEvent::Bounced { block: id });
        true
    }

    /// Turn a block mid-flight and continue one segment along the new heading.
    /// Never spends a move.
    pub fn redirect_during_move(&mut self, id: EntityId, axis: Vec3, degrees: f32) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if self.blocks[idx].state() != MovementState::MovingForward {
            return false;
        }
        self.scheduler.cancel_owned_by(id);
        let block = &mut self.blocks[idx];
        block.cancel_motion();
        block.rotate_local(axis, degrees);
        block.set_state(MovementState::Idle);
        block.begin_forward();
        log::debug!(
            "Block {id} redirected by {degrees:.1} deg, now heading {}",
            block.segment_heading()
        );
        self.events.push(SimEvent::Redirected { block: id, degrees });
        true
    }

    /// Force the moving flag without starting a segment
    pub fn set_moving_flag(&mut self, id: EntityId, moving: bool) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        self.blocks[idx].set_moving_flag(moving);
        true
    }

    /// Stop a forward-moving block that ran into `other`
    pub(crate) fn handle_hit(&mut self, id: EntityId, other: EntityId, other_is_block: bool) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        log::debug!("Block {id} hit {other}");
        self.events.push(SimEvent::HitObstacle { block: id, other });

        let forbidden_head_on = other_is_block
            && self.block(other).is_some_and(|struck| {
                !struck.config.allow_opposite_collision
                    && are_opposite(
                        self.blocks[idx].current_heading(),
                        struck.current_heading(),
                        self.tuning.opposite_dot_threshold,
                    )
            });
        if forbidden_head_on {
            log::info!("Head-on collision between {id} and {other}");
            self.resolve(Outcome::Lost(LossReason::OppositeCollision));
        }

        // Cancel everything in flight before the recovery stage replaces it
        self.scheduler.cancel_owned_by(id);
        let block = &mut self.blocks[idx];
        let heading = block.segment_heading();
        block.cancel_motion();
        block.begin_recovery();
        block.set_state(MovementState::Idle);

        if other_is_block {
            self.bounce(other, heading);
        }
    }

    // --- Locks ---

    /// One debounced decrement of every lock counter in the level
    pub fn request_lock_decrease(&mut self, source: DecreaseSource) -> bool {
        if !self.gate.try_accept(source, self.time) {
            return false;
        }
        let mut changed = false;
        for block in &mut self.blocks {
            let Some(lock) = block.lock.as_mut() else {
                continue;
            };
            match lock.decrease() {
                CounterChange::Ignored => {}
                CounterChange::Decreased { remaining } => {
                    changed = true;
                    self.events.push(SimEvent::CounterChanged {
                        block: block.id,
                        remaining,
                    });
                }
                CounterChange::Unlocked => {
                    changed = true;
                    log::debug!("Block {} unlocked", block.id);
                    self.events.push(SimEvent::CounterChanged {
                        block: block.id,
                        remaining: 0,
                    });
                    self.events.push(SimEvent::Unlocked { block: block.id });
                }
            }
        }
        if changed {
            self.check_blocked_blocks_loss();
        }
        true
    }

    /// Zero a block's lock immediately, bypassing the debounce gate
    pub fn force_unlock(&mut self, id: EntityId) -> bool {
        let Some(idx) = self.index_of(id) else {
            log::warn!("force_unlock: unknown block {id}");
            return false;
        };
        let unlocked = self.blocks[idx]
            .lock
            .as_mut()
            .is_some_and(LockCounter::force_unlock);
        if unlocked {
            log::debug!("Block {id} force-unlocked");
            self.events.push(SimEvent::CounterChanged {
                block: id,
                remaining: 0,
            });
            self.events.push(SimEvent::Unlocked { block: id });
            self.check_blocked_blocks_loss();
        }
        unlocked
    }

    /// Attach or re-arm a lock on a block at runtime
    pub fn lock_block(&mut self, id: EntityId, remaining_to_clear: u32, bomb_only: bool) -> bool {
        if !self.set_lock(id, remaining_to_clear, bomb_only) {
            return false;
        }
        log::debug!("Block {id} locked ({remaining_to_clear} to clear, bomb only: {bomb_only})");
        self.check_blocked_blocks_loss();
        true
    }

    // --- Clearing ---

    /// Count a block toward the collection goal, at most once
    pub(crate) fn collect(&mut self, id: EntityId) {
        if let Some(idx) = self.index_of(id) {
            if !self.blocks[idx].claim_collection() {
                return;
            }
        }
        let needed = self.collection.needed;
        match self.collection.collect(id) {
            Collect::Duplicate => {}
            Collect::Counted { collected } => {
                self.events.push(SimEvent::Collected {
                    block: id,
                    collected,
                    needed,
                });
            }
            Collect::Completed { collected } => {
                self.events.push(SimEvent::Collected {
                    block: id,
                    collected,
                    needed,
                });
                self.events.push(SimEvent::CollectedAll);
                log::info!("Collection goal met ({collected}/{needed})");
                self.resolve(Outcome::Won);
            }
        }
    }

    /// Clear a block by a blade or bomb
    pub fn destroy_block(&mut self, id: EntityId, source: DecreaseSource) -> bool {
        self.destroy(id, source, true)
    }

    pub(crate) fn destroy(&mut self, id: EntityId, source: DecreaseSource, counts: bool) -> bool {
        if self.index_of(id).is_none() {
            log::warn!("destroy: unknown block {id}");
            return false;
        }
        self.events.push(SimEvent::Clearable { block: id });
        if counts {
            self.collect(id);
        }
        self.remove_block(id);
        log::debug!("Block {id} destroyed by {source:?}");
        self.events.push(SimEvent::BlockDestroyed { block: id, source });
        self.request_lock_decrease(source);
        self.check_blocked_blocks_loss();
        true
    }

    /// Drop a block and everything that refers to it
    pub(crate) fn remove_block(&mut self, id: EntityId) -> Option<BlockEntity> {
        let idx = self.index_of(id)?;
        self.scheduler.cancel_owned_by(id);
        self.move_observers.retain(|&o| o != id);
        Some(self.blocks.remove(idx))
    }

    /// Disable a bomb's collider and light its fuse
    pub(crate) fn prime_bomb(&mut self, id: EntityId) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        let bomb = &mut self.blocks[idx];
        let Some(config) = bomb.config.bomb else {
            return;
        };
        if bomb.bomb_primed {
            return;
        }
        bomb.bomb_primed = true;
        bomb.mark_cleared();
        let due = self.time + config.delay_secs;
        self.scheduler
            .schedule(due, Some(id), Continuation::Explode { bomb: id });
        log::debug!("Bomb {id} primed");
        self.events.push(SimEvent::BombPrimed { bomb: id });
    }

    /// Unlock locked blocks in range, destroy the rest, then remove the bomb
    pub(crate) fn explode(&mut self, id: EntityId) {
        let Some(bomb) = self.block(id) else {
            return;
        };
        let config = bomb.config.bomb.unwrap_or_default();
        let center = bomb.position;
        let targets: Vec<(EntityId, bool)> = self
            .blocks
            .iter()
            .filter(|b| b.id != id && !b.is_cleared())
            .filter(|b| b.volume().intersects_sphere(center, config.radius))
            .map(|b| (b.id, b.is_locked()))
            .collect();

        log::debug!("Bomb {id} exploded, {} blocks in range", targets.len());
        self.events.push(SimEvent::BombExploded { bomb: id });
        for (target, locked) in targets {
            if locked {
                self.force_unlock(target);
            } else {
                self.destroy(target, DecreaseSource::Bomb, true);
            }
        }
        self.collect(id);
        self.remove_block(id);
        self.events.push(SimEvent::BlockDestroyed {
            block: id,
            source: DecreaseSource::Bomb,
        });
        self.check_blocked_blocks_loss();
    }

    /// A block passed out of an exit sensor
    pub(crate) fn exit_block(&mut self, id: EntityId) {
        if self.index_of(id).is_none() {
            return;
        }
        log::debug!("Block {id} exited");
        self.events.push(SimEvent::BlockExited { block: id });
        self.collect(id);
        self.remove_block(id);
        self.check_blocked_blocks_loss();
    }

    // --- Outcome ---

    /// Latch an outcome; later reports are ignored
    pub(crate) fn resolve(&mut self, outcome: Outcome) {
        if !self.evaluator.resolve(outcome) {
            return;
        }
        log::info!("Level resolved: {outcome:?}");
        self.events.push(match outcome {
            Outcome::Won => SimEvent::Won,
            Outcome::Lost(reason) => SimEvent::Lost { reason },
        });
    }

    /// Immediate loss when every movable block is locked
    pub fn check_blocked_blocks_loss(&mut self) -> bool {
        if self.evaluator.is_resolved() {
            return false;
        }
        match blocked_blocks_loss(&self.collection, self.census()) {
            Some(outcome) => {
                self.resolve(outcome);
                true
            }
            None => false,
        }
    }

    /// Judge the level once the out-of-moves grace delay has passed
    pub(crate) fn evaluate_out_of_moves(&mut self) {
        if self.evaluator.is_resolved() {
            return;
        }
        let outcome = decide_out_of_moves(&self.collection, self.census());
        self.resolve(outcome);
    }
}
