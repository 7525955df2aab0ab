//! FIFO admission: waiters are served strictly in arrival order.

use std::collections::VecDeque;
use std::sync::Arc;

use super::gate::{Discipline, Gate};
use super::{Admission, AdmissionPolicy, PolicySnapshot};
use crate::error::Result;
use crate::latch::Latch;
use crate::options::{PolicyKind, PolicyOptions};

pub(crate) struct Fifo;

impl Discipline for Fifo {
    const KIND: PolicyKind = PolicyKind::Queue;

    fn has_room(queued: usize, max_queued: usize) -> bool {
        queued < max_queued
    }

    fn park(
        waiters: &mut VecDeque<Arc<Latch>>,
        _max_queued: usize,
        latch: Arc<Latch>,
    ) -> Option<Arc<Latch>> {
        waiters.push_back(latch);
        None
    }

    fn next(waiters: &mut VecDeque<Arc<Latch>>) -> Option<Arc<Latch>> {
        waiters.pop_front()
    }
}

/// Fair admission policy. A full queue turns new callers away.
pub struct QueuePolicy {
    gate: Arc<Gate<Fifo>>,
}

impl QueuePolicy {
    pub fn new(options: &PolicyOptions) -> Result<Self> {
        Ok(Self {
            gate: Arc::new(Gate::new(options)?),
        })
    }
}

impl AdmissionPolicy for QueuePolicy {
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
        PolicyKind::Queue
    }
}
