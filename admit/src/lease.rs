//! Scoped exit for admitted callers.

use std::sync::Arc;

use crate::error::Result;
use crate::policy::AdmissionPolicy;

/// Proof of admission. The turn is given back exactly once, on drop or on
/// [`Lease::release`].
#[must_use = "dropping a lease immediately gives the turn back"]
pub struct Lease {
    policy: Option<Arc<dyn AdmissionPolicy>>,
}

impl Lease {
    /// Wrap a turn already granted by `policy`.
    pub(crate) fn granted(policy: Arc<dyn AdmissionPolicy>) -> Self {
        Self {
            policy: Some(policy),
        }
    }

    /// Give the turn back now, surfacing a contract violation if there is one.
    pub fn release(mut self) -> Result<()> {
        match self.policy.take() {
            Some(policy) => policy.on_exit(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("kind", &self.policy.as_ref().map(|p| p.kind()))
            .finish()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(policy) = self.policy.take()
            && let Err(e) = policy.on_exit()
        {
            tracing::error!(error = %e, policy = %policy.kind(), "Failed to release admission");
        }
    }
}

/// Wait for a turn on `policy`. `None` means the caller was rejected.
pub async fn acquire(policy: &Arc<dyn AdmissionPolicy>) -> Option<Lease> {
    if policy.try_enter().await {
        Some(Lease::granted(Arc::clone(policy)))
    } else {
        None
    }
}
