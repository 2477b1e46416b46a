//! Allow-list oracle for development and tests

use crate::error::Result;
use crate::oracle::AuthorizationOracle;
use crate::review::{AccessReview, AccessReviewStatus};
use access_types::{ACCESS_REQUEST_RESOURCE, APPROVE_VERB, GROUP};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Grants `approve` on access requests to `user` within `namespaces`.
/// A namespace entry of `*` matches every namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverRule {
    pub user: String,
    #[serde(default = "all_namespaces")]
    pub namespaces: Vec<String>,
}

fn all_namespaces() -> Vec<String> {
    vec!["*".to_string()]
}

impl ApproverRule {
    fn matches(&self, user: &str, namespace: &str) -> bool {
        self.user == user
            && self
                .namespaces
                .iter()
                .any(|ns| ns == "*" || ns == namespace)
    }
}

/// In-process oracle answering from a mutable rule table
#[derive(Debug, Default)]
pub struct StaticOracle {
    rules: RwLock<Vec<ApproverRule>>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<ApproverRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    pub fn with_approver<I, S>(self, user: impl Into<String>, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grant(user, namespaces);
        self
    }

    pub fn grant<I, S>(&self, user: impl Into<String>, namespaces: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rule = ApproverRule {
            user: user.into(),
            namespaces: namespaces.into_iter().map(Into::into).collect(),
        };
        self.write().push(rule);
    }

    /// Drop every rule for `user`
    pub fn revoke(&self, user: &str) {
        self.write().retain(|r| r.user != user);
    }

    // every mutation is a single push or retain, so a poisoned table is still whole
    fn read(&self) -> RwLockReadGuard<'_, Vec<ApproverRule>> {
        self.rules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ApproverRule>> {
        self.rules.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AuthorizationOracle for StaticOracle {
    fn name(&self) -> &str {
        "static"
    }

    async fn review(&self, review: &AccessReview) -> Result<AccessReviewStatus> {
        let attrs = review.attributes();
        if attrs.verb != APPROVE_VERB
            || attrs.group != GROUP
            || attrs.resource != ACCESS_REQUEST_RESOURCE
        {
            return Ok(AccessReviewStatus::default());
        }

        let allowed = self
            .read()
            .iter()
            .any(|r| r.matches(review.user(), &attrs.namespace));

        if allowed {
            Ok(AccessReviewStatus::allow(format!(
                "{} may approve access requests in {}",
                review.user(),
                attrs.namespace
            )))
        } else {
            Ok(AccessReviewStatus {
                allowed: false,
                denied: false,
                reason: format!("no approver rule for {}", review.user()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_types::ObjectKey;

    #[tokio::test]
    async fn test_wildcard_namespace() {
        let oracle = StaticOracle::new().with_approver("root", ["*"]);
        let status = oracle
            .review(&AccessReview::approve("root", &ObjectKey::new("anything", "r")))
            .await
            .unwrap();
        assert!(status.is_authorized());
    }

    #[tokio::test]
    async fn test_revoke_removes_authority() {
        let oracle = StaticOracle::new().with_approver("bob", ["team-a"]);
        let review = AccessReview::approve("bob", &ObjectKey::new("team-a", "r"));
        assert!(oracle.review(&review).await.unwrap().is_authorized());

        oracle.revoke("bob");
        let status = oracle.review(&review).await.unwrap();
        assert!(!status.is_authorized());
        assert!(status.reason.contains("bob"));
    }

    #[tokio::test]
    async fn test_other_verbs_are_not_allowed() {
        let oracle = StaticOracle::new().with_approver("bob", ["*"]);
        let mut review = AccessReview::approve("bob", &ObjectKey::new("team-a", "r"));
        review.spec.resource_attributes.verb = "delete".to_string();
        assert!(!oracle.review(&review).await.unwrap().is_authorized());
    }

    #[tokio::test]
    async fn test_poisoned_table_keeps_answering() {
        let oracle = StaticOracle::new().with_approver("bob", ["team-a"]);
        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _rules = oracle.rules.write().unwrap();
            panic!("writer died holding the table");
        }));
        assert!(poisoned.is_err());
        assert!(oracle.rules.is_poisoned());

        let review = AccessReview::approve("bob", &ObjectKey::new("team-a", "r"));
        assert!(oracle.review(&review).await.unwrap().is_authorized());

        oracle.revoke("bob");
        assert!(!oracle.review(&review).await.unwrap().is_authorized());

        oracle.grant("bob", ["team-a"]);
        assert!(oracle.review(&review).await.unwrap().is_authorized());
    }

    #[test]
    fn test_rule_defaults_to_all_namespaces() {
        let rule: ApproverRule = serde_json::from_str(r#"{"user":"bob"}"#).unwrap();
        assert!(rule.matches("bob", "team-z"));
    }
}
