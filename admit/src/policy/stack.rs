//! LIFO admission with eviction of the oldest waiter.
//!
//! Under sustained overload the most recent caller is served first and the
//! caller that has waited longest is the one turned away when the stack is
//! full. A caller either gets in quickly or is told no quickly.

use std::collections::VecDeque;
use std::sync::Arc;

use super::gate::{Discipline, Gate};
use super::{Admission, AdmissionPolicy, PolicySnapshot};
use crate::error::Result;
use crate::latch::Latch;
use crate::options::{PolicyKind, PolicyOptions};

/// Front of the deque is the bottom of the stack (oldest waiter).
pub(crate) struct Lifo;

impl Discipline for Lifo {
    const KIND: PolicyKind = PolicyKind::Stack;

    fn has_room(_queued: usize, max_queued: usize) -> bool {
        // A full stack still takes the newcomer by evicting; only a zero-size one refuses.
        max_queued > 0
    }

    fn park(
        waiters: &mut VecDeque<Arc<Latch>>,
        max_queued: usize,
        latch: Arc<Latch>,
    ) -> Option<Arc<Latch>> {
        let evicted = if waiters.len() >= max_queued {
            waiters.pop_front()
        } else {
            None
        };
        waiters.push_back(latch);
        evicted
    }

    fn next(waiters: &mut VecDeque<Arc<Latch>>) -> Option<Arc<Latch>> {
        waiters.pop_back()
    }
}

/// Latency-first admission policy.
pub struct StackPolicy {
    gate: Arc<Gate<Lifo>>,
}

impl StackPolicy {
    pub fn new(options: &PolicyOptions) -> Result<Self> {
        Ok(Self {
            gate: Arc::new(Gate::new(options)?),
        })
    }
}

impl AdmissionPolicy for StackPolicy {
    fn try_enter(&self) -> Admission {
        self.gate.try_enter()
    }

    fn on_exit(&self) -> Result<()> {
        self.gate.on_exit()
    }

    fn snapshot(&self) -> PolicySnapshot {
        self.gate.snapshot()
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Stack
    }
}
