//! Delayed continuations keyed by simulated time
//!
//! Deferred reactions (chained bounces, bomb fuses, the out-of-moves grace
//! delay) are queued here instead of sleeping, so they replay identically
//! under the same tick sequence.

use glam::Vec3;

use super::body::EntityId;
use crate::consts::TIME_EPSILON;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Continuation {
    /// Start a bounce on `block` along `direction`
    Bounce { block: EntityId, direction: Vec3 },
    /// Detonate a primed bomb block
    Explode { bomb: EntityId },
    /// Judge the level after moves ran out
    EvaluateOutOfMoves,
}

#[derive(Debug, Clone)]
struct Pending {
    due: f64,
    seq: u64,
    /// Entity whose cancellation also drops this continuation
    owner: Option<EntityId>,
    action: Continuation,
}

/// Queue of continuations ordered by due time, then by scheduling order
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    pending: Vec<Pending>,
    next_seq: u64,
}

impl Scheduler {
    pub fn schedule(&mut self, due: f64, owner: Option<EntityId>, action: Continuation) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending {
            due,
            seq,
            owner,
            action,
        });
    }

    /// Drop every continuation owned by `owner`
    pub fn cancel_owned_by(&mut self, owner: EntityId) {
        self.pending.retain(|p| p.owner != Some(owner));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return everything due at `now`, earliest first
    pub fn take_due(&mut self, now: f64) -> Vec<Continuation> {
        let mut due: Vec<Pending> = Vec::new();
        self.pending.retain(|p| {
            if p.due <= now + TIME_EPSILON {
                due.push(p.clone());
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|p| p.action).collect()
    }
}
