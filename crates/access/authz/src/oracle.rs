//! Oracle trait and the shared approval check

use crate::error::Result;
use crate::review::{AccessReview, AccessReviewStatus};
use access_types::ObjectKey;
use async_trait::async_trait;
use std::sync::Arc;

/// External authority-check service
#[async_trait]
pub trait AuthorizationOracle: Send + Sync + std::fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Answer one access review. One round trip, no side effects.
    async fn review(&self, review: &AccessReview) -> Result<AccessReviewStatus>;
}

/// Issues the fixed `approve` check on behalf of admission and the reconciler
#[derive(Debug, Clone)]
pub struct ApprovalChecker {
    oracle: Arc<dyn AuthorizationOracle>,
}

impl ApprovalChecker {
    pub fn new(oracle: Arc<dyn AuthorizationOracle>) -> Self {
        Self { oracle }
    }

    /// May `actor` approve the request at `key`?
    ///
    /// Transport failures surface as errors and must never be read as deny.
    pub async fn check_approval(&self, actor: &str, key: &ObjectKey) -> Result<AccessReviewStatus> {
        let review = AccessReview::approve(actor, key);
        let status = self.oracle.review(&review).await?;

        tracing::debug!(
            oracle = self.oracle.name(),
            actor = actor,
            request = %key,
            allowed = status.allowed,
            denied = status.denied,
            reason = %status.reason,
            "Approval check answered"
        );

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::static_oracle::StaticOracle;

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl AuthorizationOracle for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn review(&self, _review: &AccessReview) -> Result<AccessReviewStatus> {
            Err(OracleError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unavailable_propagates() {
        let checker = ApprovalChecker::new(Arc::new(Unreachable));
        let result = checker
            .check_approval("bob", &ObjectKey::new("team-a", "req"))
            .await;
        assert!(matches!(result, Err(OracleError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_checker_uses_actor_and_key() {
        let oracle = StaticOracle::new().with_approver("bob", ["team-a"]);
        let checker = ApprovalChecker::new(Arc::new(oracle));

        let allowed = checker
            .check_approval("bob", &ObjectKey::new("team-a", "req"))
            .await
            .unwrap();
        assert!(allowed.is_authorized());

        let other_ns = checker
            .check_approval("bob", &ObjectKey::new("team-b", "req"))
            .await
            .unwrap();
        assert!(!other_ns.is_authorized());
    }
}
