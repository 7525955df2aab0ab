//! admit: admission-controlled concurrency limiting.
//!
//! A policy lets up to `max_concurrent` callers in at once and parks up to
//! `max_queued` more until a turn frees up. [`QueuePolicy`] serves waiters in
//! arrival order; [`StackPolicy`] serves the newest first and evicts the
//! oldest when full. [`ConcurrencyLimiter`] fronts a policy for transports,
//! and [`transport::http`] puts it in front of an axum router.

pub mod error;
pub mod latch;
mod lease;
mod limiter;
pub mod options;
pub mod policy;
mod stats;
pub mod transport;

pub use error::{AdmissionError, Result};
pub use latch::{Latch, LatchWait, Ticket};
pub use lease::{Lease, acquire};
pub use limiter::{ConcurrencyLimiter, DEFAULT_REJECTION_STATUS, LimiterSnapshot};
pub use options::{LimiterConfig, PolicyKind, PolicyOptions};
pub use policy::{
    Admission, AdmissionPolicy, PolicySnapshot, QueuePolicy, StackPolicy, build_policy,
};
pub use stats::{LimiterStats, StatsSnapshot};
