//! Block entity and its staged motion
//!
//! A block's motion is an explicit stage machine advanced once per tick.
//! Replacing the stage cancels whatever was in flight, so a block never has
//! two segments running at once.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::body::{Aabb, Category, EntityId, Tint};
use super::direction::MoveDirection;
use super::grid::GridIndex;
use super::hazard::BombConfig;
use super::lock::LockCounter;
use crate::move_towards;
use crate::settings::MotionTuning;

/// Externally visible movement state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovementState {
    #[default]
    Idle,
    MovingForward,
    Bouncing,
}

/// Static configuration of a block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    pub direction: MoveDirection,
    pub can_move: bool,
    /// Head-on hits against this block are allowed (otherwise the level is lost)
    pub allow_opposite_collision: bool,
    pub category: Category,
    /// Categories that stop this block
    pub collides_with: Vec<Category>,
    pub tint: Option<Tint>,
    pub size: Vec3,
    /// Turn when some other block starts a move
    pub rotate_on_other_move: bool,
    /// Level files set this per block or inherit the pack default
    #[serde(skip)]
    pub motion: MotionTuning,
    pub bomb: Option<BombConfig>,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            direction: MoveDirection::Forward,
            can_move: true,
            allow_opposite_collision: true,
            category: Category::Cube,
            collides_with: vec![Category::Cube, Category::Wall],
            tint: None,
            size: Vec3::ONE,
            rotate_on_other_move: false,
            motion: MotionTuning::default(),
            bomb: None,
        }
    }
}

/// Current motion stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Motion {
    Still,
    /// Ramping move toward the segment target
    Forward { target: Vec3, elapsed: f32 },
    /// Slide onto a grid point, then hard-snap
    Settle {
        target: Vec3,
        speed: f32,
        ends_move: bool,
    },
    /// Slide onto a remembered landing marker after a hit
    Land { target: Vec3 },
    /// Back off after a hit with no landing marker
    Recoil { target: Vec3 },
    BounceOut { target: Vec3, home: Vec3 },
    BounceHome { home: Vec3 },
}

/// What a motion step produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionStep {
    Still,
    Moving,
    /// Snapped exactly onto a grid point
    Settled(Vec3),
    /// A cleared block finished its last segment
    LeftBoard,
    BounceFinished,
}

/// A movable block
#[derive(Debug, Clone)]
pub struct BlockEntity {
    pub id: EntityId,
    pub position: Vec3,
    pub orientation: Quat,
    pub config: BlockConfig,
    pub lock: Option<LockCounter>,
    state: MovementState,
    pub(crate) motion: Motion,
    /// Heading of the current segment
    heading: Vec3,
    cleared: bool,
    collected_once: bool,
    pub(crate) fallback_spot: Option<Vec3>,
    pub(crate) bomb_primed: bool,
    /// Bodies overlapped at the end of the previous tick
    pub(crate) contacts: Vec<EntityId>,
}

impl BlockEntity {
    pub fn new(id: EntityId, position: Vec3, orientation: Quat, config: BlockConfig) -> Self {
        Self {
            id,
            position,
            orientation,
            config,
            lock: None,
            state: MovementState::Idle,
            motion: Motion::Still,
            heading: Vec3::ZERO,
            cleared: false,
            collected_once: false,
            fallback_spot: None,
            bomb_primed: false,
            contacts: Vec::new(),
        }
    }

    pub fn state(&self) -> MovementState {
        self.state
    }

    /// Any non-idle state (a forced moving flag included)
    pub fn is_moving(&self) -> bool {
        self.state != MovementState::Idle
    }

    /// Moving, or still running a post-hit recovery slide
    pub fn is_busy(&self) -> bool {
        self.is_moving() || self.motion != Motion::Still
    }

    pub fn is_locked(&self) -> bool {
        self.lock.as_ref().is_some_and(LockCounter::is_locked)
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    pub fn collected_once(&self) -> bool {
        self.collected_once
    }

    /// Claim the single collection slot; false if already claimed
    pub(crate) fn claim_collection(&mut self) -> bool {
        !std::mem::replace(&mut self.collected_once, true)
    }

    /// Disable the collider permanently
    pub(crate) fn mark_cleared(&mut self) {
        self.cleared = true;
    }

    /// Heading resolved from the configured direction under the current orientation
    pub fn current_heading(&self) -> Vec3 {
        self.config.direction.resolve(self.orientation)
    }

    /// Heading of the segment in flight (or the last one)
    pub fn segment_heading(&self) -> Vec3 {
        self.heading
    }

    pub fn volume(&self) -> Aabb {
        Aabb::new(self.position, self.config.size)
    }

    pub fn collides_with(&self, category: Category) -> bool {
        self.config.collides_with.contains(&category)
    }

    /// Whether a new move may begin right now
    pub fn can_start_move(&self) -> bool {
        self.config.can_move && !self.is_locked() && !self.cleared && !self.is_busy()
    }

    /// Begin a forward segment along the freshly resolved heading
    pub(crate) fn begin_forward(&mut self) {
        self.heading = self.current_heading();
        self.state = MovementState::MovingForward;
        self.fallback_spot = None;
        self.motion = Motion::Forward {
            target: self.position + self.heading * self.config.motion.move_distance,
            elapsed: 0.0,
        };
    }

    /// Drop the in-flight stage
    pub(crate) fn cancel_motion(&mut self) {
        self.motion = Motion::Still;
    }

    pub(crate) fn set_state(&mut self, state: MovementState) {
        self.state = state;
    }

    /// Force the moving flag without starting a segment
    pub(crate) fn set_moving_flag(&mut self, moving: bool) {
        self.state = if moving {
            MovementState::MovingForward
        } else {
            MovementState::Idle
        };
    }

    /// Rotate about a local axis (zero axis means local Z)
    pub(crate) fn rotate_local(&mut self, axis: Vec3, degrees: f32) {
        let axis = if axis.length_squared() < f32::EPSILON {
            Vec3::Z
        } else {
            axis.normalize()
        };
        self.orientation =
            (self.orientation * Quat::from_axis_angle(axis, degrees.to_radians())).normalize();
    }

    /// Recover from a hit: land on the remembered marker or back off
    pub(crate) fn begin_recovery(&mut self) {
        self.motion = match self.fallback_spot.take() {
            Some(target) => Motion::Land { target },
            None => Motion::Recoil {
                target: self.position - self.heading * self.config.motion.bounce_amount * 2.0,
            },
        };
    }

    /// Start a bounce toward `direction` and back, relative to where it stands
    pub(crate) fn begin_bounce(&mut self, direction: Vec3) {
        let home = self.position;
        self.state = MovementState::Bouncing;
        self.motion = Motion::BounceOut {
            target: home + direction * self.config.motion.bounce_amount,
            home,
        };
    }

    /// Advance the current stage by `dt`
    pub fn advance(&mut self, dt: f32, grid: &GridIndex, epsilon: f32) -> MotionStep {
        let tuning = &self.config.motion;
        match self.motion {
            Motion::Still => MotionStep::Still,
            Motion::Forward { target, elapsed } => {
                let speed = tuning.forward_speed(elapsed);
                self.position = move_towards(self.position, target, speed * dt);
                if self.position.distance(target) > epsilon {
                    self.motion = Motion::Forward {
                        target,
                        elapsed: elapsed + dt,
                    };
                    return MotionStep::Moving;
                }
                if self.cleared {
                    self.motion = Motion::Still;
                    self.state = MovementState::Idle;
                    return MotionStep::LeftBoard;
                }
                self.motion = Motion::Settle {
                    target: grid.snap(self.position),
                    speed: tuning.move_speed,
                    ends_move: true,
                };
                MotionStep::Moving
            }
            Motion::Settle {
                target,
                speed,
                ends_move,
            } => {
                self.position = move_towards(self.position, target, speed * dt);
                if self.position.distance(target) > epsilon {
                    return MotionStep::Moving;
                }
                self.position = grid.snap(target);
                self.motion = Motion::Still;
                if ends_move {
                    self.state = MovementState::Idle;
                }
                MotionStep::Settled(self.position)
            }
            Motion::Land { target } => {
                self.position = move_towards(self.position, target, tuning.bounce_speed * dt);
                if self.position.distance(target) > epsilon {
                    return MotionStep::Moving;
                }
                self.position = grid.snap(target);
                self.motion = Motion::Still;
                MotionStep::Settled(self.position)
            }
            Motion::Recoil { target } => {
                self.position = move_towards(self.position, target, tuning.bounce_speed * dt);
                if self.position.distance(target) <= epsilon {
                    self.motion = Motion::Settle {
                        target: grid.snap(self.position),
                        speed: tuning.bounce_speed,
                        ends_move: false,
                    };
                }
                MotionStep::Moving
            }
            Motion::BounceOut { target, home } => {
                self.position = move_towards(self.position, target, tuning.bounce_speed * dt);
                if self.position.distance(target) <= epsilon {
                    self.motion = Motion::BounceHome { home };
                }
                MotionStep::Moving
            }
            Motion::BounceHome { home } => {
                self.position = move_towards(self.position, home, tuning.bounce_speed * dt);
                if self.position.distance(home) > epsilon {
                    return MotionStep::Moving;
                }
                // Local-position relative: no grid snap mid-bounce
                self.position = home;
                self.motion = Motion::Still;
                self.state = MovementState::Idle;
                MotionStep::BounceFinished
            }
        }
    }
}
