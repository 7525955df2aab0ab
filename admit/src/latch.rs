//! Resumable boolean latch.
//!
//! A `Latch` is a single result slot that one side completes with a boolean and
//! the other side awaits. Once the waiter consumes the result the slot goes
//! back to pending and the generation advances, so the same instance serves
//! the next wait cycle without a fresh allocation.
//!
//! Each cycle is named by a [`Ticket`]. Awaiting with a ticket whose cycle was
//! already consumed fails with [`AdmissionError::LatchConsumed`].
//!
//! Completion and consumption are single atomic transitions; the latch never
//! takes a lock. The completer may run on any thread.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::task::AtomicWaker;

use crate::error::{AdmissionError, Result};

const PENDING: u8 = 0;
const COMPLETED_FALSE: u8 = 1;
const COMPLETED_TRUE: u8 = 2;

/// Token naming one wait cycle of a [`Latch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

#[derive(Debug)]
pub struct Latch {
    state: AtomicU8,
    generation: AtomicU64,
    waker: AtomicWaker,
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

impl Latch {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            generation: AtomicU64::new(0),
            waker: AtomicWaker::new(),
        }
    }

    /// Ticket for the cycle currently in progress.
    pub fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation.load(Ordering::Acquire),
        }
    }

    /// Store the outcome for the current cycle and wake the waiter.
    pub fn complete(&self, value: bool) -> Result<()> {
        let next = if value { COMPLETED_TRUE } else { COMPLETED_FALSE };
        self.state
            .compare_exchange(PENDING, next, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AdmissionError::LatchAlreadyCompleted)?;
        self.waker.wake();
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) != PENDING
    }

    /// Outcome stored for the current cycle, without consuming it.
    pub fn peek(&self) -> Option<bool> {
        decode(self.state.load(Ordering::Acquire))
    }

    /// Wait for the outcome of the cycle named by `ticket`.
    pub fn wait(&self, ticket: Ticket) -> LatchWait<'_> {
        LatchWait {
            latch: self,
            ticket,
        }
    }

    /// Consume the outcome if the cycle is still `ticket`'s.
    fn try_take(&self, ticket: Ticket) -> Poll<Result<bool>> {
        if self.generation.load(Ordering::Acquire) != ticket.generation {
            return Poll::Ready(Err(AdmissionError::LatchConsumed));
        }

        let current = self.state.load(Ordering::Acquire);
        let Some(value) = decode(current) else {
            return Poll::Pending;
        };

        // Only one consumer wins the swap back to PENDING.
        if self
            .state
            .compare_exchange(current, PENDING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Poll::Ready(Err(AdmissionError::LatchConsumed));
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        Poll::Ready(Ok(value))
    }
}

fn decode(state: u8) -> Option<bool> {
    match state {
        COMPLETED_TRUE => Some(true),
        COMPLETED_FALSE => Some(false),
        _ => None,
    }
}

/// Future returned by [`Latch::wait`].
#[must_use = "futures do nothing unless polled"]
#[derive(Debug)]
pub struct LatchWait<'a> {
    latch: &'a Latch,
    ticket: Ticket,
}

impl Future for LatchWait<'_> {
    type Output = Result<bool>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Poll::Ready(result) = self.latch.try_take(self.ticket) {
            return Poll::Ready(result);
        }
        // Register before the re-check so a concurrent complete() can't slip between.
        self.latch.waker.register(cx.waker());
        self.latch.try_take(self.ticket)
    }
}
