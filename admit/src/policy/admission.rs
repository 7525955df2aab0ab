//! The future handed out by `try_enter`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::latch::{Latch, Ticket};
use crate::stats::saturating_millis;

/// Policy side of a pending wait.
pub(crate) trait Waitlist: Send + Sync {
    /// The waiter holding `latch` gave up.
    fn abandon(&self, latch: &Arc<Latch>);

    /// Offer a consumed latch back for reuse.
    fn recycle(&self, latch: Arc<Latch>);
}

enum State {
    Decided(bool),
    Waiting {
        waitlist: Arc<dyn Waitlist>,
        latch: Arc<Latch>,
        ticket: Ticket,
        since: Instant,
    },
    Done {
        waited: Option<Duration>,
    },
}

/// Outcome of [`crate::AdmissionPolicy::try_enter`].
///
/// Resolves to `true` when admitted and `false` when rejected or evicted.
/// Dropping it while still waiting gives up the place in line; if the turn
/// had already been granted it is passed on.
#[must_use = "an admission must be awaited or it gives up its place"]
pub struct Admission {
    state: State,
}

impl Admission {
    pub(crate) fn decided(admitted: bool) -> Self {
        Self {
            state: State::Decided(admitted),
        }
    }

    pub(crate) fn waiting(waitlist: Arc<dyn Waitlist>, latch: Arc<Latch>, ticket: Ticket) -> Self {
        Self {
            state: State::Waiting {
                waitlist,
                latch,
                ticket,
                since: Instant::now(),
            },
        }
    }

    /// True when the outcome was known without waiting.
    pub fn is_decided(&self) -> bool {
        matches!(self.state, State::Decided(_))
    }

    /// Time spent in line, once a waiting admission has resolved.
    pub fn waited(&self) -> Option<Duration> {
        match self.state {
            State::Done { waited } => waited,
            _ => None,
        }
    }

    /// Give up the place in line. Same as dropping.
    pub fn abandon(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Decided(admitted) => format!("Decided({admitted})"),
            State::Waiting { .. } => "Waiting".to_string(),
            State::Done { .. } => "Done".to_string(),
        };
        f.debug_struct("Admission").field("state", &state).finish()
    }
}

impl Future for Admission {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        let result = match &this.state {
            State::Decided(admitted) => {
                let admitted = *admitted;
                this.state = State::Done { waited: None };
                return Poll::Ready(admitted);
            }
            State::Waiting { latch, ticket, .. } => {
                match Pin::new(&mut latch.wait(*ticket)).poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(result) => result,
                }
            }
            State::Done { .. } => panic!("Admission polled after completion"),
        };

        let State::Waiting {
            waitlist,
            latch,
            since,
            ..
        } = std::mem::replace(&mut this.state, State::Done { waited: None })
        else {
            unreachable!("state checked above");
        };

        let waited = since.elapsed();
        this.state = State::Done {
            waited: Some(waited),
        };

        let admitted = match result {
            Ok(admitted) => admitted,
            Err(e) => {
                tracing::error!(error = %e, "Bug: waiter latch consumed elsewhere");
                false
            }
        };
        tracing::debug!(admitted, wait_ms = saturating_millis(waited), "Waiter resolved");

        waitlist.recycle(latch);
        Poll::Ready(admitted)
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if let State::Waiting {
            waitlist, latch, ..
        } = &self.state
        {
            waitlist.abandon(latch);
        }
    }
}
