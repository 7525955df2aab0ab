//! Admission policies.
//!
//! A policy gates entry to a limited resource. Up to `max_concurrent` callers
//! are admitted immediately; the next `max_queued` wait for a turn; anyone
//! beyond that is turned away (or, for [`StackPolicy`], the longest waiter is).
//!
//! Every caller admitted with `true` must call [`AdmissionPolicy::on_exit`]
//! exactly once. [`crate::Lease`] does this on drop.

mod admission;
mod gate;
mod queue;
mod stack;

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::options::{PolicyKind, PolicyOptions};

pub use admission::Admission;
pub use queue::QueuePolicy;
pub use stack::StackPolicy;

/// Shared contract of the queue and stack policies.
pub trait AdmissionPolicy: Send + Sync {
    /// Ask for a turn. Resolves to `true` once admitted, `false` if rejected.
    ///
    /// The returned future is already resolved when no waiting is needed.
    fn try_enter(&self) -> Admission;

    /// Give back the turn taken by a successful admission.
    ///
    /// Fails with [`crate::AdmissionError::UnbalancedExit`] when no admission
    /// is outstanding.
    fn on_exit(&self) -> Result<()>;

    fn snapshot(&self) -> PolicySnapshot;

    fn kind(&self) -> PolicyKind;
}

/// Point-in-time view of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicySnapshot {
    pub kind: PolicyKind,
    pub max_concurrent: usize,
    pub max_queued: usize,
    pub concurrent: usize,
    pub queued: usize,
    /// Waiters turned away to make room for newer ones.
    pub evicted: u64,
    /// Waiters that gave up before being resolved.
    pub abandoned: u64,
}

impl PolicySnapshot {
    pub fn is_saturated(&self) -> bool {
        self.concurrent == self.max_concurrent
    }
}

/// Build the policy named by `kind`.
pub fn build_policy(kind: PolicyKind, options: &PolicyOptions) -> Result<Arc<dyn AdmissionPolicy>> {
    Ok(match kind {
        PolicyKind::Queue => Arc::new(QueuePolicy::new(options)?),
        PolicyKind::Stack => Arc::new(StackPolicy::new(options)?),
    })
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;
    use crate::error::AdmissionError;

    #[test]
    fn build_policy_honours_kind() {
        let options = PolicyOptions::new(2, 3);

        let queue = build_policy(PolicyKind::Queue, &options).unwrap();
        assert_eq!(queue.kind(), PolicyKind::Queue);

        let stack = build_policy(PolicyKind::Stack, &options).unwrap();
        assert_eq!(stack.kind(), PolicyKind::Stack);
        assert_eq!(stack.snapshot().max_concurrent, 2);
        assert_eq!(stack.snapshot().max_queued, 3);
    }

    #[test]
    fn build_policy_validates_options() {
        let err = build_policy(PolicyKind::Stack, &PolicyOptions::new(0, 3))
            .err()
            .unwrap();
        assert!(matches!(err, AdmissionError::InvalidOptions { .. }));
    }

    #[test]
    fn independent_instances_do_not_interact() {
        for kind in [PolicyKind::Queue, PolicyKind::Stack] {
            let options = PolicyOptions::new(1, 1);
            let a = build_policy(kind, &options).unwrap();
            let b = build_policy(kind, &options).unwrap();

            assert_eq!(a.try_enter().now_or_never(), Some(true));
            let waiting_a = a.try_enter();
            assert!(!waiting_a.is_decided());

            // b is untouched by a being saturated.
            assert_eq!(b.try_enter().now_or_never(), Some(true));
            assert_eq!(b.snapshot().queued, 0);

            b.on_exit().unwrap();
            assert_eq!(a.snapshot().concurrent, 1);
            assert_eq!(a.snapshot().queued, 1);
            assert_eq!(b.on_exit(), Err(AdmissionError::UnbalancedExit));

            a.on_exit().unwrap();
            assert_eq!(waiting_a.now_or_never(), Some(true));
            a.on_exit().unwrap();
            assert_eq!(a.snapshot().concurrent, 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn instances_stay_independent_under_concurrent_use() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        const MAX: usize = 2;
        let options = PolicyOptions::new(MAX, 8);
        let policies = [
            build_policy(PolicyKind::Queue, &options).unwrap(),
            build_policy(PolicyKind::Stack, &options).unwrap(),
        ];
        let inside: [Arc<AtomicUsize>; 2] = Default::default();
        let peak: [Arc<AtomicUsize>; 2] = Default::default();

        let mut handles = Vec::new();
        for i in 0..200u64 {
            for which in 0..2 {
                let policy = Arc::clone(&policies[which]);
                let inside = Arc::clone(&inside[which]);
                let peak = Arc::clone(&peak[which]);
                handles.push(tokio::spawn(async move {
                    // Some callers give up while waiting.
                    let patience = Duration::from_millis(1 + i % 4);
                    let Ok(true) = tokio::time::timeout(patience, policy.try_enter()).await else {
                        return;
                    };
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    policy.on_exit().unwrap();
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for (policy, peak) in policies.iter().zip(&peak) {
            assert!(peak.load(Ordering::SeqCst) <= MAX);
            let snapshot = policy.snapshot();
            assert_eq!(snapshot.concurrent, 0, "{:?} left turns taken", snapshot.kind);
            assert_eq!(snapshot.queued, 0, "{:?} left waiters behind", snapshot.kind);
        }
    }

    #[test]
    fn snapshot_serializes() {
        let policy = build_policy(PolicyKind::Queue, &PolicyOptions::new(2, 4)).unwrap();
        let _admitted = policy.try_enter().now_or_never();
        insta::assert_json_snapshot!(policy.snapshot(), @r#"
        {
          "kind": "queue",
          "max_concurrent": 2,
          "max_queued": 4,
          "concurrent": 1,
          "queued": 0,
          "evicted": 0,
          "abandoned": 0
        }
        "#);
    }
}
