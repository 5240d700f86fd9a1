//! Deterministic simulation module
//!
//! All puzzle logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - Delayed reactions run on simulated time, never wall-clock time

pub mod block;
pub mod body;
pub mod collision;
pub mod direction;
pub mod grid;
pub mod hazard;
pub mod lock;
pub mod outcome;
pub mod redirect;
pub mod schedule;
pub mod state;
pub mod tick;

pub use block::{BlockConfig, BlockEntity, MotionStep, MovementState};
pub use body::{Aabb, Category, EntityId, LandingMarker, Obstacle, Tint};
pub use collision::{ProbeOutcome, RayHit, Solids, are_opposite};
pub use direction::{ExitDirection, MoveDirection};
pub use grid::{GridIndex, GridLayout};
pub use hazard::{Blade, BombConfig, ExitSensor};
pub use lock::{CounterChange, DebounceGate, DecreaseSource, LockCounter};
pub use outcome::{
    BlockCensus, CollectionCounter, LossReason, MovesBudget, Outcome, WinLossEvaluator,
};
pub use redirect::{RedirectTile, TileConfig, required_rotation};
pub use schedule::{Continuation, Scheduler};
pub use state::{Level, SimEvent};
pub use tick::{TickInput, tick};
