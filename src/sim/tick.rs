//! Fixed timestep simulation tick
//!
//! Advances a level deterministically. Each tick runs, in order: due
//! continuations, external input, motion stages, block contacts, exit
//! sensors, redirect tiles and finally the periodic blocked-blocks check.

use super::block::{MotionStep, MovementState};
use super::body::{Category, EntityId};
use super::lock::DecreaseSource;
use super::schedule::Continuation;
use super::state::{Level, SimEvent};

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Blocks activated this tick (player taps or external triggers)
    pub activations: Vec<EntityId>,
    /// Locks opened from outside, bypassing the debounce gate
    pub force_unlocks: Vec<EntityId>,
    /// Blocks cleared by an external hazard
    pub destroys: Vec<EntityId>,
}

/// What a block newly overlaps this tick
#[derive(Debug, Clone, Copy, PartialEq)]
enum Touch {
    Block(Category),
    Obstacle(Category),
    Marker,
    Blade,
}

/// Advance the level by one fixed timestep
pub fn tick(level: &mut Level, input: &TickInput, dt: f32) {
    // A resolved level is frozen
    if level.is_resolved() {
        return;
    }

    level.time_ticks += 1;
    level.time += dt as f64;

    run_due_continuations(level);

    for &id in &input.force_unlocks {
        level.force_unlock(id);
    }
    for &id in &input.destroys {
        level.destroy_block(id, DecreaseSource::Blade);
    }
    for &id in &input.activations {
        level.activate(id);
    }

    advance_motion(level, dt);
    resolve_contacts(level);
    update_exit_sensors(level);
    update_redirect_tiles(level);

    // Periodic re-check surfaces stalls as a loss
    level.check_blocked_blocks_loss();
}

fn run_due_continuations(level: &mut Level) {
    for action in level.scheduler.take_due(level.time) {
        match action {
            Continuation::Bounce { block, direction } => {
                level.bounce(block, direction);
            }
            Continuation::Explode { bomb } => level.explode(bomb),
            Continuation::EvaluateOutOfMoves => level.evaluate_out_of_moves(),
        }
    }
}

fn advance_motion(level: &mut Level, dt: f32) {
    let epsilon = level.tuning.arrive_epsilon;
    let mut left_board = Vec::new();
    for block in &mut level.blocks {
        match block.advance(dt, &level.grid, epsilon) {
            MotionStep::Settled(position) => level.events.push(SimEvent::Settled {
                block: block.id,
                position,
            }),
            MotionStep::LeftBoard => left_board.push(block.id),
            MotionStep::Still | MotionStep::Moving | MotionStep::BounceFinished => {}
        }
    }
    for id in left_board {
        log::debug!("Block {id} left the board");
        level.remove_block(id);
        level.events.push(SimEvent::LeftBoard { block: id });
    }
}

/// Bodies overlapping the block at `idx`
fn touching(level: &Level, idx: usize) -> Vec<(EntityId, Touch)> {
    let block = &level.blocks[idx];
    let volume = block.volume();
    let mut touching = Vec::new();
    for other in &level.blocks {
        if other.id != block.id && !other.is_cleared() && other.volume().overlaps(&volume) {
            touching.push((other.id, Touch::Block(other.config.category)));
        }
    }
    for obstacle in &level.obstacles {
        if obstacle.volume.overlaps(&volume) {
            touching.push((obstacle.id, Touch::Obstacle(obstacle.category)));
        }
    }
    for marker in &level.markers {
        if marker.volume.overlaps(&volume) {
            touching.push((marker.id, Touch::Marker));
        }
    }
    for blade in &level.blades {
        if blade.volume.overlaps(&volume) {
            touching.push((blade.id, Touch::Blade));
        }
    }
    touching
}

/// Fire enter reactions for every body a block newly overlaps
fn resolve_contacts(level: &mut Level) {
    let ids: Vec<EntityId> = level.blocks.iter().map(|b| b.id).collect();
    for id in ids {
        let Some(idx) = level.index_of(id) else {
            continue;
        };
        if level.blocks[idx].is_cleared() {
            level.blocks[idx].contacts.clear();
            continue;
        }
        let now = touching(level, idx);
        let block = &mut level.blocks[idx];
        let entered: Vec<(EntityId, Touch)> = now
            .iter()
            .copied()
            .filter(|(other, _)| !block.contacts.contains(other))
            .collect();
        block.contacts = now.into_iter().map(|(other, _)| other).collect();

        for (other, touch) in entered {
            if !on_enter(level, id, other, touch) {
                break;
            }
        }
    }
}

/// React to one new contact; false once the block stops interacting
fn on_enter(level: &mut Level, id: EntityId, other: EntityId, touch: Touch) -> bool {
    let Some(idx) = level.index_of(id) else {
        return false;
    };
    let block = &level.blocks[idx];
    if block.is_cleared() {
        return false;
    }
    let moving_forward = block.state() == MovementState::MovingForward;

    match touch {
        Touch::Marker => {
            if !moving_forward {
                return true;
            }
            let Some(marker) = level.markers.iter().find(|m| m.id == other) else {
                return true;
            };
            if level.solids().landing_spot_usable(marker, block) {
                let spot = marker.volume.center;
                level.blocks[idx].fallback_spot = Some(spot);
            }
            true
        }
        Touch::Blade => {
            let counts = level
                .blades
                .iter()
                .find(|b| b.id == other)
                .is_some_and(|b| b.counts_toward_goal);
            level.destroy(id, DecreaseSource::Blade, counts);
            false
        }
        Touch::Obstacle(category) => {
            if moving_forward && block.collides_with(category) {
                level.handle_hit(id, other, false);
            }
            true
        }
        Touch::Block(category) => {
            if moving_forward && block.collides_with(category) {
                level.handle_hit(id, other, true);
            }
            level.prime_bomb(id);
            true
        }
    }
}

fn update_exit_sensors(level: &mut Level) {
    let mut leavers = Vec::new();
    for sensor in &mut level.exits {
        let inside = level
            .blocks
            .iter()
            .filter(|b| !b.is_cleared() && b.volume().overlaps(&sensor.volume))
            .map(|b| b.id)
            .collect();
        for id in sensor.update_inside(inside) {
            let Ok(idx) = level.blocks.binary_search_by_key(&id, |b| b.id) else {
                continue;
            };
            let block = &level.blocks[idx];
            if !block.is_cleared() && sensor.accepts(block.config.tint) {
                leavers.push(id);
            }
        }
    }
    leavers.sort_unstable();
    leavers.dedup();
    for id in leavers {
        level.exit_block(id);
    }
}

fn update_redirect_tiles(level: &mut Level) {
    for t in 0..level.tiles.len() {
        let volume = level.tiles[t].volume();
        let now: Vec<EntityId> = level
            .blocks
            .iter()
            .filter(|b| !b.is_cleared() && b.volume().overlaps(&volume))
            .map(|b| b.id)
            .collect();
        let before = std::mem::replace(&mut level.tiles[t].overlapping, now.clone());

        for id in before.iter().filter(|id| !now.contains(id)) {
            level.tiles[t].forget(*id);
        }
        for &id in &now {
            if !before.contains(&id) {
                tile_enter(level, t, id);
            }
            tile_stay(level, t, id);
        }
    }
}

fn tile_enter(level: &mut Level, t: usize, id: EntityId) {
    let tile = &level.tiles[t];
    if tile.is_consumed() || tile.was_redirected(id) {
        return;
    }
    let Some(block) = level.block(id) else {
        return;
    };
    if !tile.accepts(block.config.tint) || !block.is_moving() {
        return;
    }
    let heading = block.current_heading();
    level.tiles[t].record_entry(id, heading);
}

fn tile_stay(level: &mut Level, t: usize, id: EntityId) {
    let tile = &level.tiles[t];
    if tile.is_consumed() {
        return;
    }
    let Some(block) = level.block(id) else {
        return;
    };
    if !tile.accepts(block.config.tint) {
        return;
    }

    // Already turned: keep it going unless the exit is walled off
    if tile.was_redirected(id) {
        let exit = tile.config.exit.world_vector();
        if !level
            .solids()
            .path_blocked(block, exit, tile.config.path_check_distance)
        {
            level.activate(id);
        }
        return;
    }

    if !block.is_moving() {
        if level.try_start_move(id) {
            if let Some(heading) = level.block(id).map(|b| b.current_heading()) {
                level.tiles[t].record_entry(id, heading);
            }
        } else {
            level.set_moving_flag(id, true);
        }
    }

    let tile = &level.tiles[t];
    let (Some(entry), Some(block)) = (tile.entry_direction(id), level.block(id)) else {
        return;
    };
    if !tile.is_aligned(block.position) {
        return;
    }
    let degrees = tile.required_rotation(entry);
    let axis = tile.config.axis;
    level.redirect_during_move(id, axis, degrees);
    level.tiles[t].mark_redirected(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::settings::Tuning;
    use crate::sim::block::BlockConfig;
    use crate::sim::body::Tint;
    use crate::sim::direction::{ExitDirection, MoveDirection};
    use crate::sim::grid::{GridIndex, GridLayout};
    use crate::sim::hazard::BombConfig;
    use crate::sim::outcome::{LossReason, Outcome};
    use crate::sim::redirect::TileConfig;
    use glam::{Quat, Vec3};

    fn level() -> Level {
        let grid = GridIndex::from_layout(&GridLayout {
            origin: Vec3::new(-4.0, 0.0, -4.0),
            cell_size: 1.0,
            columns: 16,
            rows: 16,
            layers: 1,
        });
        Level::new(grid, Tuning::default(), 12345)
    }

    fn heading(direction: MoveDirection) -> BlockConfig {
        BlockConfig {
            direction,
            ..Default::default()
        }
    }

    fn far(direction: MoveDirection, distance: f32) -> BlockConfig {
        let mut config = heading(direction);
        config.motion.move_distance = distance;
        config
    }

    /// Tick for `secs` of simulated time, returning every event emitted
    fn run(level: &mut Level, secs: f32) -> Vec<SimEvent> {
        let mut events = level.drain_events();
        let ticks = (secs / SIM_DT).round() as u32;
        for _ in 0..ticks {
            tick(level, &TickInput::default(), SIM_DT);
            events.extend(level.drain_events());
        }
        events
    }

    fn activate(level: &mut Level, id: EntityId) -> Vec<SimEvent> {
        let input = TickInput {
            activations: vec![id],
            ..Default::default()
        };
        tick(level, &input, SIM_DT);
        level.drain_events()
    }

    #[test]
    fn test_move_settles_exactly_on_grid() {
        let mut level = level();
        level.add_obstacle(Category::Wall, Vec3::new(3.0, 0.0, 0.0), Vec3::ONE);
        let id = level.add_block(heading(MoveDirection::Right), Vec3::ZERO, Quat::IDENTITY);

        let mut events = activate(&mut level, id);
        events.extend(run(&mut level, 2.0));

        let block = level.block(id).unwrap();
        assert_eq!(block.position, Vec3::X);
        assert_eq!(block.state(), MovementState::Idle);
        assert!(events.contains(&SimEvent::Settled {
            block: id,
            position: Vec3::X
        }));
    }

    #[test]
    fn test_wall_hit_recovers_onto_grid() {
        let mut level = level();
        let wall = level.add_obstacle(Category::Wall, Vec3::new(2.0, 0.0, 0.0), Vec3::ONE);
        let id = level.add_block(far(MoveDirection::Right, 5.0), Vec3::ZERO, Quat::IDENTITY);

        let mut events = activate(&mut level, id);
        events.extend(run(&mut level, 3.0));

        assert!(events.contains(&SimEvent::HitObstacle {
            block: id,
            other: wall
        }));
        let block = level.block(id).unwrap();
        assert_eq!(block.position, Vec3::X);
        assert!(!block.is_busy());
        assert!(level.outcome().is_none());
    }

    #[test]
    fn test_hit_lands_on_remembered_marker() {
        let mut level = level();
        level.add_markers_at_grid_points(Vec3::splat(0.5));
        level.add_obstacle(Category::Wall, Vec3::new(4.0, 0.0, 0.0), Vec3::ONE);
        let id = level.add_block(far(MoveDirection::Right, 8.0), Vec3::ZERO, Quat::IDENTITY);

        activate(&mut level, id);
        run(&mut level, 4.0);

        assert_eq!(level.block(id).unwrap().position, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_struck_block_bounces_and_returns() {
        let mut level = level();
        let a = level.add_block(far(MoveDirection::Right, 5.0), Vec3::ZERO, Quat::IDENTITY);
        let b = level.add_block(
            heading(MoveDirection::Back),
            Vec3::new(2.0, 0.0, 0.0),
            Quat::IDENTITY,
        );

        let mut events = activate(&mut level, a);
        events.extend(run(&mut level, 3.0));

        assert!(events.contains(&SimEvent::HitObstacle { block: a, other: b }));
        assert!(events.contains(&SimEvent::Bounced { block: b }));
        assert_eq!(level.block(a).unwrap().position, Vec3::X);
        assert_eq!(level.block(b).unwrap().position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(level.block(b).unwrap().state(), MovementState::Idle);
    }

    #[test]
    fn test_bounce_chain_waits_for_travel_time() {
        let mut level = level();
        let mut config = heading(MoveDirection::Right);
        config.motion.bounce_amount = 1.0;
        config.motion.bounce_speed = 2.0;
        let a = level.add_block(config, Vec3::ZERO, Quat::IDENTITY);
        let b = level.add_block(heading(MoveDirection::Right), Vec3::X, Quat::IDENTITY);

        let started = level.time();
        assert!(level.bounce(a, Vec3::X));
        assert_eq!(level.pending_continuations(), 1);

        let mut b_started = None;
        for _ in 0..240 {
            tick(&mut level, &TickInput::default(), SIM_DT);
            if level.drain_events().contains(&SimEvent::Bounced { block: b }) {
                b_started = Some(level.time());
                break;
            }
        }
        let b_started = b_started.expect("B never bounced");
        assert!(b_started - started >= 0.5 - 1e-6, "B bounced at {b_started}");
        assert!(b_started - started < 0.5 + 2.0 * SIM_DT as f64);
    }

    #[test]
    fn test_bounce_rejected_while_moving() {
        let mut level = level();
        level.add_obstacle(Category::Wall, Vec3::new(5.0, 0.0, 0.0), Vec3::ONE);
        let id = level.add_block(heading(MoveDirection::Right), Vec3::ZERO, Quat::IDENTITY);
        activate(&mut level, id);
        assert!(!level.bounce(id, Vec3::NEG_X));
    }

    #[test]
    fn test_redirect_turns_without_spending_a_move() {
        let mut level = level();
        level.set_moves(5, 0);
        level.add_obstacle(Category::Wall, Vec3::new(7.0, 0.0, 0.0), Vec3::ONE);
        let tile = level.add_redirect_tile(
            Vec3::new(2.0, 0.0, 0.0),
            TileConfig {
                exit: ExitDirection::Up,
                ..Default::default()
            },
        );
        let id = level.add_block(far(MoveDirection::Right, 2.0), Vec3::ZERO, Quat::IDENTITY);

        let mut events = activate(&mut level, id);
        assert_eq!(level.moves_remaining(), Some(4));
        events.extend(run(&mut level, 4.0));

        let turn = events
            .iter()
            .find_map(|e| match e {
                SimEvent::Redirected { block, degrees } if *block == id => Some(*degrees),
                _ => None,
            })
            .expect("block was not redirected");
        assert!((turn + 90.0).abs() < 1e-3);
        assert_eq!(level.moves_remaining(), Some(4));

        let block = level.block(id).unwrap();
        assert!((block.current_heading() - Vec3::Z).length() < 1e-4);
        assert_eq!(block.position, Vec3::new(2.0, 0.0, 2.0));
        assert!(!level.tile(tile).unwrap().was_redirected(id));
    }

    /// Tile on (2, 0, 0) turning blocks toward +Z, with a five-move budget
    fn level_with_up_tile() -> (Level, EntityId) {
        let mut level = level();
        level.set_moves(5, 0);
        let tile = level.add_redirect_tile(
            Vec3::new(2.0, 0.0, 0.0),
            TileConfig {
                exit: ExitDirection::Up,
                ..Default::default()
            },
        );
        (level, tile)
    }

    /// Mark `block` as already turned by `tile`, as if it stopped there mid-visit
    fn mark_turned(level: &mut Level, tile_id: EntityId, block: EntityId) {
        let tile = level.tiles.iter_mut().find(|t| t.id == tile_id).unwrap();
        tile.overlapping.push(block);
        tile.mark_redirected(block);
    }

    #[test]
    fn test_idle_block_on_tile_is_started_and_turned() {
        let (mut level, tile) = level_with_up_tile();
        let origin = Vec3::new(2.0, 0.0, 0.0);
        let id = level.add_block(heading(MoveDirection::Right), origin, Quat::IDENTITY);

        tick(&mut level, &TickInput::default(), SIM_DT);
        let events = level.drain_events();

        assert!(events.contains(&SimEvent::MoveStarted { block: id }));
        let turn = events.iter().find_map(|e| match e {
            SimEvent::Redirected { block, degrees } if *block == id => Some(*degrees),
            _ => None,
        });
        assert!(turn.is_some_and(|degrees| (degrees + 90.0).abs() < 1e-3));
        assert_eq!(level.moves_remaining(), Some(4));
        let tile_state = level.tile(tile).unwrap();
        assert_eq!(tile_state.entry_direction(id), Some(Vec3::X));
        assert!(tile_state.was_redirected(id));

        run(&mut level, 3.0);
        let block = level.block(id).unwrap();
        assert_eq!(block.position, Vec3::new(2.0, 0.0, 1.0));
        assert_eq!(block.state(), MovementState::Idle);
        assert_eq!(level.moves_remaining(), Some(4));
    }

    #[test]
    fn test_refused_start_on_tile_forces_moving_flag() {
        let (mut level, tile) = level_with_up_tile();
        let origin = Vec3::new(2.0, 0.0, 0.0);
        let config = BlockConfig {
            can_move: false,
            ..heading(MoveDirection::Right)
        };
        let id = level.add_block(config, origin, Quat::IDENTITY);

        let events = run(&mut level, 0.5);

        assert!(!events.iter().any(|e| matches!(e, SimEvent::MoveStarted { .. })));
        let block = level.block(id).unwrap();
        assert_eq!(block.state(), MovementState::MovingForward);
        assert_eq!(block.position, origin);
        assert_eq!(level.moves_remaining(), Some(5));
        assert!(level.tile(tile).unwrap().entry_direction(id).is_none());
    }

    #[test]
    fn test_turned_block_with_clear_exit_is_reactivated() {
        let (mut level, tile) = level_with_up_tile();
        // Keeps the start-of-move probe from clearing the block off the board
        level.add_obstacle(Category::Wall, Vec3::new(6.0, 0.0, 0.0), Vec3::ONE);
        let origin = Vec3::new(2.0, 0.0, 0.0);
        let id = level.add_block(heading(MoveDirection::Right), origin, Quat::IDENTITY);
        mark_turned(&mut level, tile, id);

        tick(&mut level, &TickInput::default(), SIM_DT);
        let mut events = level.drain_events();
        assert!(events.contains(&SimEvent::MoveStarted { block: id }));
        assert_eq!(level.moves_remaining(), Some(4));

        events.extend(run(&mut level, 3.0));
        assert!(!events.iter().any(|e| matches!(e, SimEvent::Redirected { .. })));
        assert_eq!(level.block(id).unwrap().position, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(level.moves_remaining(), Some(4));
        assert!(!level.tile(tile).unwrap().was_redirected(id));
    }

    #[test]
    fn test_turned_block_with_walled_exit_stays_put() {
        let (mut level, tile) = level_with_up_tile();
        level.add_obstacle(Category::Wall, Vec3::new(6.0, 0.0, 0.0), Vec3::ONE);
        level.add_obstacle(Category::Wall, Vec3::new(2.0, 0.0, 1.0), Vec3::ONE);
        let origin = Vec3::new(2.0, 0.0, 0.0);
        let id = level.add_block(heading(MoveDirection::Right), origin, Quat::IDENTITY);
        mark_turned(&mut level, tile, id);

        let events = run(&mut level, 0.5);

        assert!(!events.iter().any(|e| matches!(e, SimEvent::MoveStarted { .. })));
        let block = level.block(id).unwrap();
        assert_eq!(block.position, origin);
        assert_eq!(block.state(), MovementState::Idle);
        assert_eq!(level.moves_remaining(), Some(5));
        assert!(level.tile(tile).unwrap().was_redirected(id));
    }

    #[test]
    fn test_redirect_filter_ignores_other_tints() {
        let mut level = level();
        level.add_obstacle(Category::Wall, Vec3::new(7.0, 0.0, 0.0), Vec3::ONE);
        level.add_redirect_tile(
            Vec3::new(2.0, 0.0, 0.0),
            TileConfig {
                exit: ExitDirection::Up,
                filter: Some(Tint::Red),
                ..Default::default()
            },
        );
        let mut config = far(MoveDirection::Right, 4.0);
        config.tint = Some(Tint::Blue);
        let id = level.add_block(config, Vec3::ZERO, Quat::IDENTITY);

        let mut events = activate(&mut level, id);
        events.extend(run(&mut level, 4.0));

        assert!(!events.iter().any(|e| matches!(e, SimEvent::Redirected { .. })));
        assert_eq!(level.block(id).unwrap().position, Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_single_use_tile_is_consumed() {
        let mut level = level();
        level.add_obstacle(Category::Wall, Vec3::new(7.0, 0.0, 0.0), Vec3::ONE);
        let tile = level.add_redirect_tile(
            Vec3::new(2.0, 0.0, 0.0),
            TileConfig {
                exit: ExitDirection::Up,
                single_use: true,
                ..Default::default()
            },
        );
        let id = level.add_block(far(MoveDirection::Right, 2.0), Vec3::ZERO, Quat::IDENTITY);
        activate(&mut level, id);
        run(&mut level, 4.0);
        assert!(level.tile(tile).unwrap().is_consumed());
    }

    #[test]
    fn test_opposite_collision_loses_immediately() {
        let mut level = level();
        level.set_moves(10, 0);
        level.set_collection_goal(3);
        let a = level.add_block(far(MoveDirection::Right, 5.0), Vec3::ZERO, Quat::IDENTITY);
        let mut facing = heading(MoveDirection::Left);
        facing.allow_opposite_collision = false;
        level.add_block(facing, Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY);

        activate(&mut level, a);
        let events = run(&mut level, 2.0);

        assert_eq!(
            level.outcome(),
            Some(Outcome::Lost(LossReason::OppositeCollision))
        );
        assert!(events.contains(&SimEvent::Lost {
            reason: LossReason::OppositeCollision
        }));
        assert_eq!(level.moves_remaining(), Some(9));
    }

    #[test]
    fn test_perpendicular_collision_is_allowed() {
        let mut level = level();
        let a = level.add_block(far(MoveDirection::Right, 5.0), Vec3::ZERO, Quat::IDENTITY);
        let mut side = heading(MoveDirection::Forward);
        side.allow_opposite_collision = false;
        level.add_block(side, Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY);

        activate(&mut level, a);
        run(&mut level, 2.0);
        assert!(level.outcome().is_none());
    }

    #[test]
    fn test_out_of_moves_waits_for_grace_delay() {
        let mut level = level();
        level.set_moves(1, 0);
        level.set_collection_goal(2);
        level.add_obstacle(Category::Wall, Vec3::new(3.0, 0.0, 0.0), Vec3::ONE);
        let id = level.add_block(heading(MoveDirection::Right), Vec3::ZERO, Quat::IDENTITY);

        activate(&mut level, id);
        assert_eq!(level.moves_remaining(), Some(0));
        run(&mut level, 0.05);
        assert!(level.outcome().is_none());
        run(&mut level, 0.1);
        assert_eq!(level.outcome(), Some(Outcome::Lost(LossReason::OutOfMoves)));
        assert!(!level.activate(id));
    }

    #[test]
    fn test_last_move_collecting_goal_wins() {
        let mut level = level();
        level.set_moves(1, 0);
        level.set_collection_goal(1);
        level.add_obstacle(Category::Wall, Vec3::new(4.0, 0.0, 0.0), Vec3::ONE);
        level.add_blade(Vec3::X, Vec3::ONE, true);
        let id = level.add_block(heading(MoveDirection::Right), Vec3::ZERO, Quat::IDENTITY);
        level.add_block(heading(MoveDirection::Left), Vec3::new(0.0, 0.0, 3.0), Quat::IDENTITY);

        let mut events = activate(&mut level, id);
        assert_eq!(level.moves_remaining(), Some(0));
        events.extend(run(&mut level, 0.5));

        assert_eq!(level.outcome(), Some(Outcome::Won));
        assert!(events.contains(&SimEvent::Won));
        assert!(!events.iter().any(|e| matches!(e, SimEvent::Lost { .. })));
        assert!(level.block(id).is_none());
    }

    #[test]
    fn test_all_blocks_locked_loses_before_moves_run_out() {
        let mut level = level();
        level.set_moves(10, 0);
        level.set_collection_goal(4);
        let ids: Vec<EntityId> = (0..3)
            .map(|i| {
                level.add_block(
                    heading(MoveDirection::Right),
                    Vec3::new(0.0, 0.0, i as f32 * 2.0),
                    Quat::IDENTITY,
                )
            })
            .collect();

        level.lock_block(ids[0], 2, false);
        level.lock_block(ids[1], 2, false);
        assert!(level.outcome().is_none());
        level.lock_block(ids[2], 1, true);

        assert_eq!(
            level.outcome(),
            Some(Outcome::Lost(LossReason::AllBlocksLocked))
        );
        assert_eq!(level.moves_remaining(), Some(10));
    }

    #[test]
    fn test_debounce_spans_sources() {
        let mut level = level();
        level.set_collection_goal(5);
        level.add_obstacle(Category::Wall, Vec3::new(4.0, 0.0, 0.0), Vec3::ONE);
        level.add_blade(Vec3::X, Vec3::ONE, true);
        let mover = level.add_block(heading(MoveDirection::Right), Vec3::ZERO, Quat::IDENTITY);
        let locked = level.add_block(
            heading(MoveDirection::Left),
            Vec3::new(0.0, 0.0, 3.0),
            Quat::IDENTITY,
        );
        level.add_block(heading(MoveDirection::Left), Vec3::new(0.0, 0.0, 5.0), Quat::IDENTITY);
        level.set_lock(locked, 3, false);

        // Move and blade kill land in the same tick: only one decrement
        let events = activate(&mut level, mover);
        assert!(events.contains(&SimEvent::BlockDestroyed {
            block: mover,
            source: DecreaseSource::Blade
        }));
        assert_eq!(level.block(locked).unwrap().lock.as_ref().unwrap().remaining_to_clear, 2);

        assert!(!level.request_lock_decrease(DecreaseSource::Exit));
        run(&mut level, 0.1);
        assert!(level.request_lock_decrease(DecreaseSource::Exit));
        assert_eq!(level.block(locked).unwrap().lock.as_ref().unwrap().remaining_to_clear, 1);
    }

    #[test]
    fn test_debounce_accepts_one_cooldown_of_ticks_later() {
        let mut level = level();
        level.add_block(heading(MoveDirection::Right), Vec3::ZERO, Quat::IDENTITY);
        let locked = level.add_block(heading(MoveDirection::Left), Vec3::Z * 2.0, Quat::IDENTITY);
        level.set_lock(locked, 3, false);

        assert!(level.request_lock_decrease(DecreaseSource::Blade));
        // 0.01 in f32 is slightly short, so ten ticks land just under 0.1 s
        for _ in 0..10 {
            tick(&mut level, &TickInput::default(), 0.01);
        }
        assert!(level.request_lock_decrease(DecreaseSource::Blade));
        let lock = level.block(locked).unwrap().lock.as_ref().unwrap();
        assert_eq!(lock.remaining_to_clear, 1);
    }

    #[test]
    fn test_bomb_unlocks_and_destroys_neighbours() {
        let mut level = level();
        level.set_collection_goal(5);
        let mover = level.add_block(far(MoveDirection::Right, 5.0), Vec3::ZERO, Quat::IDENTITY);
        let bomb = level.add_block(
            BlockConfig {
                bomb: Some(BombConfig {
                    radius: 0.6,
                    delay_secs: 0.1,
                }),
                ..heading(MoveDirection::Right)
            },
            Vec3::new(2.0, 0.0, 0.0),
            Quat::IDENTITY,
        );
        let locked = level.add_block(
            heading(MoveDirection::Left),
            Vec3::new(2.0, 0.0, 1.0),
            Quat::IDENTITY,
        );
        let loose = level.add_block(
            heading(MoveDirection::Left),
            Vec3::new(2.0, 0.0, -1.0),
            Quat::IDENTITY,
        );
        level.set_lock(locked, 4, false);

        let mut events = activate(&mut level, mover);
        events.extend(run(&mut level, 2.0));

        assert!(events.contains(&SimEvent::BombPrimed { bomb }));
        assert!(events.contains(&SimEvent::BombExploded { bomb }));
        assert!(events.contains(&SimEvent::Unlocked { block: locked }));
        assert!(events.contains(&SimEvent::BlockDestroyed {
            block: loose,
            source: DecreaseSource::Bomb
        }));
        assert!(level.block(bomb).is_none());
        assert!(level.block(loose).is_none());
        assert!(!level.block(locked).unwrap().is_locked());
        assert!(level.block(mover).is_some());
        assert_eq!(level.collected(), 2);
    }

    #[test]
    fn test_exit_sensor_collects_matching_leaver() {
        let mut level = level();
        level.set_collection_goal(3);
        level.add_obstacle(Category::Wall, Vec3::new(6.0, 0.0, 0.0), Vec3::ONE);
        level.add_exit_sensor(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(3.0, 1.0, 1.0),
            Some(Tint::Green),
        );
        let mut config = far(MoveDirection::Right, 3.0);
        config.tint = Some(Tint::Green);
        let id = level.add_block(config, Vec3::ZERO, Quat::IDENTITY);

        let mut events = activate(&mut level, id);
        events.extend(run(&mut level, 4.0));

        assert!(events.contains(&SimEvent::BlockExited { block: id }));
        assert!(level.block(id).is_none());
        assert_eq!(level.collected(), 1);
    }

    #[test]
    fn test_cleared_block_slides_off_and_is_removed() {
        let mut level = level();
        level.set_collection_goal(2);
        let id = level.add_block(far(MoveDirection::Right, 3.0), Vec3::ZERO, Quat::IDENTITY);
        level.add_block(heading(MoveDirection::Left), Vec3::new(0.0, 0.0, 2.0), Quat::IDENTITY);

        let mut events = activate(&mut level, id);
        assert!(events.contains(&SimEvent::Clearable { block: id }));
        events.extend(run(&mut level, 4.0));

        assert!(events.contains(&SimEvent::LeftBoard { block: id }));
        assert!(level.block(id).is_none());
        assert_eq!(level.collected(), 1);
    }

    #[test]
    fn test_resolved_level_is_frozen() {
        let mut level = level();
        level.set_collection_goal(1);
        let id = level.add_block(heading(MoveDirection::Right), Vec3::ZERO, Quat::IDENTITY);
        activate(&mut level, id);
        assert_eq!(level.outcome(), Some(Outcome::Won));
        let ticks = level.time_ticks;
        run(&mut level, 1.0);
        assert_eq!(level.time_ticks, ticks);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let play = || {
            let mut level = level();
            level.set_moves(6, 2);
            level.set_collection_goal(3);
            level.add_markers_at_grid_points(Vec3::splat(0.5));
            level.add_obstacle(Category::Wall, Vec3::new(5.0, 0.0, 0.0), Vec3::ONE);
            let a = level.add_block(far(MoveDirection::Right, 6.0), Vec3::ZERO, Quat::IDENTITY);
            let b = level.add_block(
                far(MoveDirection::Back, 6.0),
                Vec3::new(3.0, 0.0, 2.0),
                Quat::IDENTITY,
            );
            level.add_block(
                BlockConfig {
                    rotate_on_other_move: true,
                    ..far(MoveDirection::Right, 6.0)
                },
                Vec3::new(-2.0, 0.0, 4.0),
                Quat::IDENTITY,
            );
            let mut log = activate(&mut level, a);
            log.extend(run(&mut level, 1.5));
            log.extend(activate(&mut level, b));
            log.extend(run(&mut level, 3.0));
            (log, level.outcome())
        };
        assert_eq!(play(), play());
    }
}
