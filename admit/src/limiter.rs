//! ConcurrencyLimiter: transport-agnostic front of an admission policy.
//!
//! Owns the policy, the rejection status handed to turned-away callers, and
//! the admission counters. Transports (the axum middleware today) call
//! [`ConcurrencyLimiter::enter`] once per unit of work and hold the returned
//! [`Lease`] until the work is done.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::lease::Lease;
use crate::options::LimiterConfig;
use crate::policy::{AdmissionPolicy, PolicySnapshot, build_policy};
use crate::stats::{LimiterStats, StatsSnapshot, saturating_micros};

/// Default status for rejected callers.
pub const DEFAULT_REJECTION_STATUS: u16 = 503;

/// Combined view of the policy and the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterSnapshot {
    pub policy: PolicySnapshot,
    pub stats: StatsSnapshot,
}

impl LimiterSnapshot {
    /// All turns taken.
    pub fn is_busy(&self) -> bool {
        self.policy.is_saturated()
    }
}

pub struct ConcurrencyLimiter {
    policy: Arc<dyn AdmissionPolicy>,
    stats: LimiterStats,
    rejection_status: u16,
}

impl ConcurrencyLimiter {
    pub fn new(config: &LimiterConfig) -> Result<Self> {
        config.validate()?;
        let policy = build_policy(config.kind, &config.policy)?;
        tracing::info!(
            policy = %config.kind,
            max_concurrent = config.policy.max_concurrent_requests,
            max_queued = config.policy.request_queue_limit,
            "Concurrency limiter configured"
        );
        Ok(Self::with_policy(policy).with_rejection_status(config.rejection_status))
    }

    /// Front an existing policy.
    pub fn with_policy(policy: Arc<dyn AdmissionPolicy>) -> Self {
        Self {
            policy,
            stats: LimiterStats::new(),
            rejection_status: DEFAULT_REJECTION_STATUS,
        }
    }

    pub fn with_rejection_status(mut self, status: u16) -> Self {
        self.rejection_status = status;
        self
    }

    pub fn policy(&self) -> &Arc<dyn AdmissionPolicy> {
        &self.policy
    }

    pub fn rejection_status(&self) -> u16 {
        self.rejection_status
    }

    /// Wait for a turn. `None` means the caller must be turned away.
    ///
    /// Dropping the returned future while it waits gives up the place in line.
    pub async fn enter(&self) -> Option<Lease> {
        let mut admission = self.policy.try_enter();
        let admitted = (&mut admission).await;
        let waited = admission.waited();

        if admitted {
            if let Some(waited) = waited {
                tracing::debug!(
                    policy = %self.policy.kind(),
                    waited_us = saturating_micros(waited),
                    "Request admitted after waiting"
                );
            }
            self.stats.record_admitted(waited);
            Some(Lease::granted(Arc::clone(&self.policy)))
        } else {
            self.stats.record_rejected();
            tracing::debug!(
                policy = %self.policy.kind(),
                evicted = waited.is_some(),
                "Request rejected by concurrency limiter"
            );
            None
        }
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        LimiterSnapshot {
            policy: self.policy.snapshot(),
            stats: self.stats.snapshot(),
        }
    }
}
