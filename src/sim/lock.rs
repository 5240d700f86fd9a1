//! Lock counters and the shared decrement debounce gate

use serde::{Deserialize, Serialize};

use crate::consts::{DECREASE_COOLDOWN_SECS, TIME_EPSILON};

/// What asked for a lock counter decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecreaseSource {
    /// A block started a move
    Move,
    /// Reported by the host when a block leaves through an exit; the exit
    /// sensors built into a level never request a decrement
    Exit,
    /// A blade destroyed a block
    Blade,
    /// A bomb explosion destroyed a block
    Bomb,
}

/// Timestamp that is always outside the cooldown window
const NEVER_ACCEPTED: f64 = -1.0e9;

/// Level-wide rate limiter: at most one decrement per cooldown window,
/// across every lock counter and every source combined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceGate {
    pub cooldown: f64,
    last_accepted: f64,
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DECREASE_COOLDOWN_SECS)
    }
}

impl DebounceGate {
    pub fn new(cooldown: f64) -> Self {
        Self {
            cooldown,
            last_accepted: NEVER_ACCEPTED,
        }
    }

    /// Try to claim the gate at simulated time `now`.
    ///
    /// Requests exactly one cooldown apart are accepted even when the clock
    /// has drifted by accumulated rounding.
    pub fn try_accept(&mut self, source: DecreaseSource, now: f64) -> bool {
        if now - self.last_accepted + TIME_EPSILON < self.cooldown {
            log::debug!("Lock decrement from {source:?} rejected inside cooldown");
            return false;
        }
        self.last_accepted = now;
        true
    }
}

/// What a decrement did to a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterChange {
    /// Already unlocked or bomb-only
    Ignored,
    /// Counted down, still locked
    Decreased { remaining: u32 },
    /// Reached zero and unlocked
    Unlocked,
}

/// Hidden counter gating whether its owning block may move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockCounter {
    pub remaining_to_clear: u32,
    /// Only a force-unlock can open this lock
    pub bomb_only: bool,
    locked: bool,
}

impl LockCounter {
    pub fn new(remaining_to_clear: u32, bomb_only: bool) -> Self {
        Self {
            remaining_to_clear,
            bomb_only,
            locked: bomb_only || remaining_to_clear > 0,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Ordinary decrement (already gated by the debounce)
    pub fn decrease(&mut self) -> CounterChange {
        if !self.locked || self.bomb_only {
            return CounterChange::Ignored;
        }
        self.remaining_to_clear = self.remaining_to_clear.saturating_sub(1);
        if self.remaining_to_clear == 0 {
            self.locked = false;
            CounterChange::Unlocked
        } else {
            CounterChange::Decreased {
                remaining: self.remaining_to_clear,
            }
        }
    }

    /// Bomb unlock: zero the counter regardless of its value.
    /// Returns false when it was already open.
    pub fn force_unlock(&mut self) -> bool {
        if !self.locked {
            return false;
        }
        self.remaining_to_clear = 0;
        self.locked = false;
        true
    }
}
