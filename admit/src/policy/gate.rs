//! Capacity accounting shared by both policies.
//!
//! The gate owns the concurrency counter and the waiter collection behind a
//! single mutex. The waiting discipline only decides where a new waiter goes,
//! which one is released next, and whether a full collection evicts.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};

use super::admission::{Admission, Waitlist};
use super::PolicySnapshot;
use crate::error::{AdmissionError, Result};
use crate::latch::Latch;
use crate::options::{PolicyKind, PolicyOptions};

/// Upper bound on latches kept around for reuse.
const MAX_SPARE_LATCHES: usize = 64;

/// Ordering rules of a waiter collection.
pub(crate) trait Discipline: Send + Sync + 'static {
    const KIND: PolicyKind;

    /// Whether a new waiter can be parked given the current collection size.
    fn has_room(queued: usize, max_queued: usize) -> bool;

    /// Park `latch`, returning the waiter evicted to make room, if any.
    fn park(waiters: &mut VecDeque<Arc<Latch>>, max_queued: usize, latch: Arc<Latch>)
    -> Option<Arc<Latch>>;

    /// Remove the waiter that gets the next free turn.
    fn next(waiters: &mut VecDeque<Arc<Latch>>) -> Option<Arc<Latch>>;
}

#[derive(Debug, Default)]
struct GateState {
    concurrent: usize,
    waiters: VecDeque<Arc<Latch>>,
    spare: Vec<Arc<Latch>>,
    evicted: u64,
    abandoned: u64,
}

pub(crate) struct Gate<D> {
    max_concurrent: usize,
    max_queued: usize,
    state: Mutex<GateState>,
    _discipline: PhantomData<fn() -> D>,
}

impl<D: Discipline> Gate<D> {
    pub(crate) fn new(options: &PolicyOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            max_concurrent: options.max_concurrent_requests,
            max_queued: options.request_queue_limit,
            state: Mutex::new(GateState {
                waiters: VecDeque::with_capacity(options.request_queue_limit.min(1024)),
                ..GateState::default()
            }),
            _discipline: PhantomData,
        })
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::error!(policy = %D::KIND, "Policy state mutex poisoned - continuing");
            poisoned.into_inner()
        })
    }

    pub(crate) fn try_enter(self: &Arc<Self>) -> Admission {
        let mut state = self.lock();

        if state.concurrent < self.max_concurrent {
            state.concurrent += 1;
            return Admission::decided(true);
        }

        if !D::has_room(state.waiters.len(), self.max_queued) {
            drop(state);
            tracing::debug!(
                policy = %D::KIND,
                max_queued = self.max_queued,
                "Request queue full - rejecting"
            );
            return Admission::decided(false);
        }

        let latch = state
            .spare
            .pop()
            .unwrap_or_else(|| Arc::new(Latch::new()));
        let ticket = latch.ticket();

        if let Some(evicted) = D::park(&mut state.waiters, self.max_queued, Arc::clone(&latch)) {
            state.evicted += 1;
            complete(&evicted, false);
            tracing::debug!(policy = %D::KIND, "Evicted oldest waiter to make room");
        }
        let queued = state.waiters.len();
        drop(state);

        tracing::trace!(policy = %D::KIND, queued, "Request queued");
        let waitlist: Arc<dyn Waitlist> = Arc::clone(self) as Arc<dyn Waitlist>;
        Admission::waiting(waitlist, latch, ticket)
    }

    pub(crate) fn on_exit(&self) -> Result<()> {
        let mut state = self.lock();
        release::<D>(&mut state)
    }

    pub(crate) fn snapshot(&self) -> PolicySnapshot {
        let state = self.lock();
        PolicySnapshot {
            kind: D::KIND,
            max_concurrent: self.max_concurrent,
            max_queued: self.max_queued,
            concurrent: state.concurrent,
            queued: state.waiters.len(),
            evicted: state.evicted,
            abandoned: state.abandoned,
        }
    }
}

/// Hand the turn to the next waiter, or free it when nobody is waiting.
fn release<D: Discipline>(state: &mut GateState) -> Result<()> {
    if state.concurrent == 0 {
        tracing::error!(policy = %D::KIND, "on_exit without a matching admission");
        return Err(AdmissionError::UnbalancedExit);
    }

    // The turn moves straight to the waiter; the counter stays put.
    if let Some(next) = D::next(&mut state.waiters) {
        complete(&next, true);
        return Ok(());
    }

    state.concurrent -= 1;
    Ok(())
}

fn complete(latch: &Latch, value: bool) {
    // Waiters are removed from the collection before completion, under the
    // lock, so a second completion means the bookkeeping is broken.
    if let Err(e) = latch.complete(value) {
        debug_assert!(false, "waiter completed twice");
        tracing::error!(error = %e, "Bug: waiter latch completed twice");
    }
}

impl<D: Discipline> Waitlist for Gate<D> {
    fn abandon(&self, latch: &Arc<Latch>) {
        let mut state = self.lock();

        if let Some(pos) = state.waiters.iter().position(|w| Arc::ptr_eq(w, latch)) {
            state.waiters.remove(pos);
            state.abandoned += 1;
            tracing::debug!(policy = %D::KIND, "Waiter abandoned before being resolved");
            return;
        }

        // Already resolved. A granted turn that nobody will observe has to be given back.
        if latch.peek() == Some(true)
            && let Err(e) = release::<D>(&mut state)
        {
            tracing::error!(error = %e, "Failed to return turn of abandoned waiter");
        }
    }

    fn recycle(&self, latch: Arc<Latch>) {
        if Arc::strong_count(&latch) != 1 || latch.is_completed() {
            return;
        }
        let mut state = self.lock();
        if state.spare.len() < self.max_queued.min(MAX_SPARE_LATCHES) {
            state.spare.push(latch);
        }
    }
}
